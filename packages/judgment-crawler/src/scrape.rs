use std::collections::HashSet;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::artifacts::Materializer;
use crate::errors::CrawlError;
use crate::extract::extract_judgment;
use crate::pool::SessionPool;
use crate::traits::{ChunkSink, ExtractionStore, FrontierStore, PageSession, SessionFactory};
use crate::types::{ExtractionRecord, FrontierEntry, FrontierId, FrontierStatus, ScrapeReport};

/// Scrape pass over the frontier: fetch NEW entries in batches, scrape each
/// chunk concurrently, and commit each chunk in one transaction.
///
/// A failed entry is logged and left NEW so the next run retries it; a
/// failed chunk commit leaves the whole chunk NEW. Within one run an entry
/// is attempted at most once.
pub struct ScrapeEffect<St, F: SessionFactory, M> {
    store: Arc<St>,
    pool: Arc<SessionPool<F>>,
    artifacts: Arc<M>,
    domain: String,
    crawler: String,
    batch_size: i64,
    chunk_size: usize,
}

impl<St, F, M> ScrapeEffect<St, F, M>
where
    St: FrontierStore + ExtractionStore + ChunkSink + 'static,
    F: SessionFactory,
    M: Materializer + 'static,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<St>,
        pool: Arc<SessionPool<F>>,
        artifacts: Arc<M>,
        domain: impl Into<String>,
        crawler: impl Into<String>,
        batch_size: i64,
        chunk_size: usize,
    ) -> Self {
        Self {
            store,
            pool,
            artifacts,
            domain: domain.into(),
            crawler: crawler.into(),
            batch_size,
            chunk_size: chunk_size.max(1),
        }
    }

    pub async fn run(&self, cancel: &CancellationToken) -> Result<ScrapeReport, CrawlError> {
        let run_id = Uuid::new_v4();
        let mut attempted: HashSet<String> = HashSet::new();
        let mut scraped = 0;
        let mut failed = 0;
        let mut batches = 0;

        // Failed entries stay NEW but are already in `attempted`, so they
        // can clog the front of the fetch order. The fetch window widens
        // past them until either fresh entries or the end of the NEW set
        // shows up.
        let mut fetch_limit = self.batch_size;
        loop {
            if cancel.is_cancelled() {
                return Err(CrawlError::Cancelled);
            }

            let batch = self
                .store
                .fetch_batch(&self.crawler, FrontierStatus::New, fetch_limit)
                .await?;
            let exhausted = (batch.len() as i64) < fetch_limit;
            let pending: Vec<FrontierEntry> = batch
                .into_iter()
                .filter(|entry| !attempted.contains(entry.id.as_str()))
                .take(self.batch_size as usize)
                .collect();
            if pending.is_empty() {
                if exhausted {
                    break;
                }
                fetch_limit += self.batch_size;
                continue;
            }

            batches += 1;
            info!(%run_id, batch = batches, entries = pending.len(), "scraping batch");

            for chunk in pending.chunks(self.chunk_size) {
                if cancel.is_cancelled() {
                    return Err(CrawlError::Cancelled);
                }

                let mut workers = Vec::with_capacity(chunk.len());
                for entry in chunk {
                    attempted.insert(entry.id.as_str().to_string());
                    let store = Arc::clone(&self.store);
                    let pool = Arc::clone(&self.pool);
                    let artifacts = Arc::clone(&self.artifacts);
                    let domain = self.domain.clone();
                    let entry = entry.clone();
                    let cancel = cancel.clone();
                    workers.push(tokio::spawn(async move {
                        let id = entry.id.clone();
                        let result =
                            scrape_one(store, pool, artifacts, domain, entry, cancel).await;
                        (id, result)
                    }));
                }

                let mut records = Vec::new();
                let mut crawled = Vec::new();
                for worker in workers {
                    let (id, result) = match worker.await {
                        Ok(pair) => pair,
                        Err(join_err) => {
                            error!(error = %join_err, "scrape worker panicked");
                            failed += 1;
                            continue;
                        }
                    };
                    match result {
                        Ok(record) => {
                            crawled.push(id);
                            records.push(record);
                        }
                        Err(err) if err.is_cancelled() => return Err(CrawlError::Cancelled),
                        Err(err) => {
                            error!(id = %id, error = %err, "entry failed, staying NEW");
                            failed += 1;
                        }
                    }
                }

                if records.is_empty() {
                    continue;
                }
                match self.store.commit_chunk(&records, &crawled).await {
                    Ok(()) => scraped += records.len(),
                    Err(err) => {
                        // Whole chunk rolls back; every entry stays NEW.
                        error!(error = %err, entries = records.len(), "chunk commit failed");
                        failed += records.len();
                    }
                }
            }
        }

        info!(%run_id, scraped, failed, batches, "scrape run complete");
        Ok(ScrapeReport {
            run_id,
            scraped,
            failed,
            batches,
        })
    }
}

async fn scrape_one<St, F, M>(
    store: Arc<St>,
    pool: Arc<SessionPool<F>>,
    artifacts: Arc<M>,
    domain: String,
    entry: FrontierEntry,
    cancel: CancellationToken,
) -> Result<ExtractionRecord, CrawlError>
where
    St: ExtractionStore,
    F: SessionFactory,
    M: Materializer,
{
    if cancel.is_cancelled() {
        return Err(CrawlError::Cancelled);
    }

    let html = {
        let mut session = pool.acquire().await?;
        session.navigate(&entry.url).await?;
        session.wait_stable().await?;
        session.content()?.to_string()
    };

    if cancel.is_cancelled() {
        return Err(CrawlError::Cancelled);
    }

    let mut record = extract_judgment(&html, &entry, &domain)?;

    if let Some(existing) = store.get_extraction(&entry.id).await? {
        if existing.page_hash == record.page_hash {
            debug!(url = %entry.url, "page content unchanged since last scrape");
        }
        record.created_at = existing.created_at;
    }

    if record.metadata.pdf_url.is_empty() {
        // Nothing to download; keep a pointer at the live page.
        warn!(url = %entry.url, "no pdf link on detail page");
        record.raw_page_link = Some(entry.url.clone());
    } else {
        let name = artifact_name(&entry, &record.id);
        let stored = artifacts
            .materialize(&name, &record.metadata.pdf_url, &html)
            .await?;
        record.artifact_link = Some(stored.artifact.url);
        record.raw_page_link = Some(stored.raw_page.url);
    }

    Ok(record)
}

fn artifact_name(entry: &FrontierEntry, id: &FrontierId) -> String {
    if entry.metadata.title.is_empty() {
        id.as_str().to_string()
    } else {
        entry.metadata.title.clone()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::artifacts::MaterializedArtifacts;
    use crate::errors::SessionError;
    use crate::storage::MemoryStore;
    use crate::types::{ListingMetadata, StoredArtifact};

    const DOMAIN: &str = "www.elitigation.sg";

    struct FakeSite {
        pages: HashMap<String, String>,
    }

    struct SiteSession {
        site: Arc<FakeSite>,
        body: Option<String>,
    }

    #[async_trait]
    impl PageSession for SiteSession {
        async fn navigate(&mut self, url: &str) -> Result<(), SessionError> {
            match self.site.pages.get(url) {
                Some(html) => {
                    self.body = Some(html.clone());
                    Ok(())
                }
                None => Err(SessionError::BadStatus {
                    url: url.to_string(),
                    status: 500,
                }),
            }
        }

        async fn wait_stable(&mut self) -> Result<(), SessionError> {
            Ok(())
        }

        fn content(&self) -> Result<&str, SessionError> {
            self.body.as_deref().ok_or(SessionError::NotLoaded)
        }
    }

    struct SiteFactory {
        site: Arc<FakeSite>,
    }

    #[async_trait]
    impl SessionFactory for SiteFactory {
        type Session = SiteSession;

        async fn create(&self) -> Result<SiteSession, SessionError> {
            Ok(SiteSession {
                site: Arc::clone(&self.site),
                body: None,
            })
        }
    }

    #[derive(Default)]
    struct FakeMaterializer {
        calls: Mutex<Vec<String>>,
        panic_on: Mutex<Vec<String>>,
    }

    impl FakeMaterializer {
        fn panic_on(&self, name: &str) {
            self.panic_on.lock().unwrap().push(name.to_string());
        }
    }

    #[async_trait]
    impl Materializer for FakeMaterializer {
        async fn materialize(
            &self,
            name: &str,
            _pdf_url: &str,
            _page_html: &str,
        ) -> Result<MaterializedArtifacts, CrawlError> {
            if self.panic_on.lock().unwrap().iter().any(|n| n == name) {
                panic!("materializer blew up on {name}");
            }
            self.calls.lock().unwrap().push(name.to_string());
            Ok(MaterializedArtifacts {
                artifact: StoredArtifact {
                    name: format!("{name}.pdf"),
                    url: format!("https://storage.example/judgements/{name}.pdf"),
                    size: 4,
                },
                raw_page: StoredArtifact {
                    name: format!("{name}.html"),
                    url: format!("https://storage.example/html/{name}.html"),
                    size: 4,
                },
            })
        }
    }

    fn detail_html(slug: &str) -> String {
        format!(
            r#"<html><body><div id="divJudgement">
                 <table id="info-table">
                   <tr class="info-row"><td class="txt-label">Tribunal/Court</td><td class="txt-body">High Court</td></tr>
                 </table>
                 <div><p class="Judg-1">Verdict for {slug}.</p></div>
                 <a href="/pdf/{slug}.pdf">PDF</a>
               </div></body></html>"#
        )
    }

    fn entry(slug: &str) -> FrontierEntry {
        FrontierEntry::discovered(
            format!("https://www.elitigation.sg/gd/s/{slug}"),
            DOMAIN,
            "sg-supreme-court",
            ListingMetadata {
                citation_number: format!("[2023] SGHC {slug}"),
                decision_date: "2023-01-12T00:00:00+00:00".to_string(),
                title: format!("Public Prosecutor v {slug}"),
                categories: vec![],
                case_numbers: vec![],
            },
        )
    }

    struct Harness {
        store: Arc<MemoryStore>,
        materializer: Arc<FakeMaterializer>,
        effect: ScrapeEffect<MemoryStore, SiteFactory, FakeMaterializer>,
    }

    async fn harness(
        slugs: &[&str],
        broken: &[&str],
        batch_size: i64,
        chunk_size: usize,
    ) -> Harness {
        let store = Arc::new(MemoryStore::new());
        let mut pages = HashMap::new();
        for slug in slugs {
            let entry = entry(slug);
            store.upsert_urls(&[entry.clone()]).await.unwrap();
            if !broken.contains(slug) {
                pages.insert(entry.url.clone(), detail_html(slug));
            }
        }

        let site = Arc::new(FakeSite { pages });
        let pool = SessionPool::new(
            SiteFactory {
                site: Arc::clone(&site),
            },
            4,
        );
        let materializer = Arc::new(FakeMaterializer::default());
        let effect = ScrapeEffect::new(
            Arc::clone(&store),
            pool,
            Arc::clone(&materializer),
            DOMAIN,
            "sg-supreme-court",
            batch_size,
            chunk_size,
        );
        Harness {
            store,
            materializer,
            effect,
        }
    }

    #[tokio::test]
    async fn scrapes_new_entries_and_marks_them_crawled() {
        let harness = harness(&["a", "b"], &[], 100, 10).await;
        let report = harness.effect.run(&CancellationToken::new()).await.unwrap();
        assert_eq!(report.scraped, 2);
        assert_eq!(report.failed, 0);
        assert_eq!(report.batches, 1);

        for slug in ["a", "b"] {
            let id = entry(slug).id;
            assert_eq!(harness.store.status_of(&id), Some(FrontierStatus::Crawled));
            let extraction = harness.store.get_extraction(&id).await.unwrap().unwrap();
            assert_eq!(extraction.url_frontier_id, id);
            assert!(extraction.artifact_link.as_deref().unwrap().ends_with(".pdf"));
            assert!(extraction.raw_page_link.as_deref().unwrap().ends_with(".html"));
            assert!(extraction.page_hash.is_some());
        }
        assert_eq!(harness.materializer.calls.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn failed_entry_stays_new_and_does_not_poison_the_chunk() {
        let harness = harness(&["a", "broken", "c"], &["broken"], 100, 10).await;
        let report = harness.effect.run(&CancellationToken::new()).await.unwrap();
        assert_eq!(report.scraped, 2);
        assert_eq!(report.failed, 1);

        assert_eq!(
            harness.store.status_of(&entry("broken").id),
            Some(FrontierStatus::New)
        );
        assert_eq!(
            harness.store.status_of(&entry("a").id),
            Some(FrontierStatus::Crawled)
        );
        assert_eq!(
            harness.store.status_of(&entry("c").id),
            Some(FrontierStatus::Crawled)
        );
    }

    #[tokio::test]
    async fn chunk_commit_failure_leaves_the_chunk_new() {
        let harness = harness(&["a", "b"], &[], 100, 10).await;
        harness.store.fail_commits_containing(&entry("a").id);

        let report = harness.effect.run(&CancellationToken::new()).await.unwrap();
        assert_eq!(report.scraped, 0);
        assert_eq!(report.failed, 2);
        for slug in ["a", "b"] {
            assert_eq!(
                harness.store.status_of(&entry(slug).id),
                Some(FrontierStatus::New)
            );
            assert!(harness
                .store
                .get_extraction(&entry(slug).id)
                .await
                .unwrap()
                .is_none());
        }
    }

    #[tokio::test]
    async fn a_batch_splits_into_bounded_chunks() {
        let slugs: Vec<String> = (0..23).map(|n| format!("s{n}")).collect();
        let refs: Vec<&str> = slugs.iter().map(String::as_str).collect();
        let harness = harness(&refs, &[], 100, 10).await;
        let report = harness.effect.run(&CancellationToken::new()).await.unwrap();
        assert_eq!(report.scraped, 23);
        assert_eq!(report.batches, 1);
    }

    #[tokio::test]
    async fn an_entry_is_attempted_once_per_run() {
        let harness = harness(&["broken"], &["broken"], 100, 10).await;
        let report = harness.effect.run(&CancellationToken::new()).await.unwrap();
        assert_eq!(report.failed, 1);
        assert_eq!(report.batches, 1);
    }

    #[tokio::test]
    async fn cancellation_halts_the_run() {
        let harness = harness(&["a"], &[], 100, 10).await;
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = harness.effect.run(&cancel).await.unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(harness.store.status_of(&entry("a").id), Some(FrontierStatus::New));
    }

    #[tokio::test]
    async fn a_batch_of_failures_does_not_starve_later_entries() {
        // Two broken entries fill the whole fetch window; the healthy one
        // sits behind them and must still be reached within this run.
        let harness = harness(&["a0", "a1", "z9"], &["a0", "a1"], 2, 10).await;
        let report = harness.effect.run(&CancellationToken::new()).await.unwrap();
        assert_eq!(report.scraped, 1);
        assert_eq!(report.failed, 2);

        assert_eq!(
            harness.store.status_of(&entry("z9").id),
            Some(FrontierStatus::Crawled)
        );
        for slug in ["a0", "a1"] {
            assert_eq!(
                harness.store.status_of(&entry(slug).id),
                Some(FrontierStatus::New)
            );
        }
    }

    #[tokio::test]
    async fn a_panicking_worker_counts_as_one_failure() {
        let harness = harness(&["a", "b"], &[], 100, 10).await;
        harness.materializer.panic_on("Public Prosecutor v a");

        let report = harness.effect.run(&CancellationToken::new()).await.unwrap();
        assert_eq!(report.scraped, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(
            harness.store.status_of(&entry("a").id),
            Some(FrontierStatus::New)
        );
        assert_eq!(
            harness.store.status_of(&entry("b").id),
            Some(FrontierStatus::Crawled)
        );
    }

    #[tokio::test]
    async fn traversal_pdf_href_fails_the_entry_before_download() {
        use std::path::Path;

        use crate::artifacts::ArtifactMaterializer;
        use crate::traits::ObjectStore;

        #[derive(Default)]
        struct RecordingStore {
            uploads: Mutex<Vec<String>>,
        }

        #[async_trait]
        impl ObjectStore for RecordingStore {
            async fn upload(
                &self,
                _folder: &str,
                object_name: &str,
                _local_path: &Path,
            ) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
                self.uploads.lock().unwrap().push(object_name.to_string());
                Ok(format!("https://storage.example/{object_name}"))
            }
        }

        let frontier = entry("evil");
        let html = r#"<html><body><div id="divJudgement">
             <table id="info-table">
               <tr class="info-row"><td class="txt-label">Tribunal/Court</td><td class="txt-body">High Court</td></tr>
             </table>
             <div><p class="Judg-1">Verdict.</p></div>
             <a href="/pdf/../../etc/passwd.pdf">PDF</a>
           </div></body></html>"#;

        let store = Arc::new(MemoryStore::new());
        store.upsert_urls(&[frontier.clone()]).await.unwrap();
        let site = Arc::new(FakeSite {
            pages: HashMap::from([(frontier.url.clone(), html.to_string())]),
        });
        let pool = SessionPool::new(SiteFactory { site }, 2);
        let objects = Arc::new(RecordingStore::default());
        let materializer = Arc::new(ArtifactMaterializer::new(
            reqwest::Client::new(),
            Arc::clone(&objects),
            "sg-supreme-court",
        ));
        let effect = ScrapeEffect::new(
            Arc::clone(&store),
            pool,
            materializer,
            DOMAIN,
            "sg-supreme-court",
            100,
            10,
        );

        let report = effect.run(&CancellationToken::new()).await.unwrap();
        assert_eq!(report.scraped, 0);
        assert_eq!(report.failed, 1);
        assert_eq!(store.status_of(&frontier.id), Some(FrontierStatus::New));
        assert!(objects.uploads.lock().unwrap().is_empty());
    }
}
