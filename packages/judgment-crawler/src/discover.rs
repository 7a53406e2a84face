use std::collections::HashMap;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::errors::CrawlError;
use crate::pagination::discover_pagination;
use crate::parser::parse_listing_cards;
use crate::pool::SessionPool;
use crate::query::ListingQuery;
use crate::traits::{FrontierStore, PageSession, SessionFactory};
use crate::types::{DiscoveryReport, FrontierEntry};

/// Frontier discovery: walk every listing page of a query and upsert the
/// detail URLs found there.
///
/// Pages are crawled in chunks sized to the session pool; pages within a
/// chunk run concurrently, chunks run in sequence. A failed page is
/// recorded and the run continues, so one bad page cannot wipe out the
/// progress of the others.
pub struct DiscoveryEffect<St, F: SessionFactory> {
    store: Arc<St>,
    pool: Arc<SessionPool<F>>,
    domain: String,
    crawler: String,
}

impl<St, F> DiscoveryEffect<St, F>
where
    St: FrontierStore + 'static,
    F: SessionFactory,
{
    pub fn new(
        store: Arc<St>,
        pool: Arc<SessionPool<F>>,
        domain: impl Into<String>,
        crawler: impl Into<String>,
    ) -> Self {
        Self {
            store,
            pool,
            domain: domain.into(),
            crawler: crawler.into(),
        }
    }

    pub async fn run(
        &self,
        query: &ListingQuery,
        cancel: &CancellationToken,
    ) -> Result<DiscoveryReport, CrawlError> {
        let run_id = Uuid::new_v4();

        let pagination = {
            let mut session = self.pool.acquire().await?;
            discover_pagination(&mut *session, query).await?
        };

        let urls = query.page_urls(query.current_page, pagination.last_page);
        let total = urls.len();
        info!(%run_id, listing_pages = total, total_results = pagination.total_results, "starting discovery run");

        let mut discovered = 0;
        let mut failed = 0;

        for chunk in urls.chunks(self.pool.capacity().max(1)) {
            if cancel.is_cancelled() {
                return Err(CrawlError::Cancelled);
            }

            let mut workers = Vec::with_capacity(chunk.len());
            for url in chunk {
                let store = Arc::clone(&self.store);
                let pool = Arc::clone(&self.pool);
                let domain = self.domain.clone();
                let crawler = self.crawler.clone();
                let url = url.to_string();
                let cancel = cancel.clone();
                workers.push(tokio::spawn(async move {
                    crawl_listing_page(store, pool, domain, crawler, url, cancel).await
                }));
            }

            for worker in workers {
                match worker.await {
                    Ok(Ok(count)) => discovered += count,
                    Ok(Err(err)) if err.is_cancelled() => return Err(CrawlError::Cancelled),
                    Ok(Err(err)) => {
                        error!(error = %err, "listing page failed");
                        failed += 1;
                    }
                    Err(join_err) => {
                        error!(error = %join_err, "listing worker panicked");
                        failed += 1;
                    }
                }
            }
        }

        if failed > 0 {
            return Err(CrawlError::DiscoveryRun { failed, total });
        }

        info!(%run_id, discovered, "discovery run complete");
        Ok(DiscoveryReport {
            run_id,
            listing_pages: total,
            discovered,
        })
    }
}

async fn crawl_listing_page<St: FrontierStore, F: SessionFactory>(
    store: Arc<St>,
    pool: Arc<SessionPool<F>>,
    domain: String,
    crawler: String,
    url: String,
    cancel: CancellationToken,
) -> Result<usize, CrawlError> {
    if cancel.is_cancelled() {
        return Err(CrawlError::Cancelled);
    }

    let html = {
        let mut session = pool.acquire().await?;
        session.navigate(&url).await?;
        session.wait_stable().await?;
        session.content()?.to_string()
    };

    if cancel.is_cancelled() {
        return Err(CrawlError::Cancelled);
    }

    let cards = parse_listing_cards(&html, &domain)?;
    info!(url, cards = cards.len(), "crawled listing page");

    // A page can list the same judgment twice; keep the latest card so the
    // upsert sees each id once.
    let mut by_id: HashMap<String, FrontierEntry> = HashMap::new();
    for card in cards {
        let entry = FrontierEntry::discovered(card.url, &domain, &crawler, card.metadata);
        by_id.insert(entry.id.as_str().to_string(), entry);
    }
    let entries: Vec<FrontierEntry> = by_id.into_values().collect();

    let outcomes = store.upsert_urls(&entries).await?;
    let mut stored = 0;
    for (entry, outcome) in entries.iter().zip(&outcomes) {
        match outcome {
            Ok(()) => stored += 1,
            Err(err) => warn!(url = %entry.url, error = %err, "frontier upsert failed"),
        }
    }
    Ok(stored)
}
