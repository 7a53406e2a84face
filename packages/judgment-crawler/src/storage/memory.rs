use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::errors::StoreError;
use crate::traits::{ChunkSink, ExtractionStore, FrontierStore, ItemOutcome};
use crate::types::{ExtractionRecord, FrontierEntry, FrontierId, FrontierStatus};

/// In-memory store with the same upsert semantics as the Postgres store.
/// Backs orchestrator tests and local dry runs.
#[derive(Default)]
pub struct MemoryStore {
    frontiers: Mutex<HashMap<String, FrontierEntry>>,
    extractions: Mutex<HashMap<String, ExtractionRecord>>,
    failing_commits: Mutex<HashSet<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make any chunk commit containing this frontier id fail, leaving the
    /// chunk's entries untouched.
    pub fn fail_commits_containing(&self, id: &FrontierId) {
        if let Ok(mut failing) = self.failing_commits.lock() {
            failing.insert(id.as_str().to_string());
        }
    }

    pub fn frontier_count(&self) -> usize {
        self.frontiers.lock().map(|map| map.len()).unwrap_or(0)
    }

    pub fn status_of(&self, id: &FrontierId) -> Option<FrontierStatus> {
        self.frontiers
            .lock()
            .ok()
            .and_then(|map| map.get(id.as_str()).map(|entry| entry.status))
    }
}

fn lock<'a, T>(mutex: &'a Mutex<T>) -> Result<std::sync::MutexGuard<'a, T>, StoreError> {
    mutex
        .lock()
        .map_err(|_| StoreError::message("store lock poisoned"))
}

#[async_trait]
impl FrontierStore for MemoryStore {
    async fn upsert_urls(&self, entries: &[FrontierEntry]) -> Result<Vec<ItemOutcome>, StoreError> {
        let mut frontiers = lock(&self.frontiers)?;
        let mut outcomes = Vec::with_capacity(entries.len());
        for entry in entries {
            match frontiers.get_mut(entry.id.as_str()) {
                Some(existing) => {
                    // Conflict path: status and created_at are preserved.
                    existing.metadata = entry.metadata.clone();
                    existing.updated_at = entry.updated_at;
                }
                None => {
                    frontiers.insert(entry.id.as_str().to_string(), entry.clone());
                }
            }
            outcomes.push(Ok(()));
        }
        Ok(outcomes)
    }

    async fn update_statuses(
        &self,
        changes: &[(FrontierId, FrontierStatus)],
    ) -> Result<Vec<ItemOutcome>, StoreError> {
        let mut frontiers = lock(&self.frontiers)?;
        let mut outcomes = Vec::with_capacity(changes.len());
        for (id, status) in changes {
            match frontiers.get_mut(id.as_str()) {
                Some(entry) => {
                    entry.status = *status;
                    outcomes.push(Ok(()));
                }
                None => outcomes.push(Err(StoreError::message(format!(
                    "no frontier entry {id}"
                )))),
            }
        }
        Ok(outcomes)
    }

    async fn get_by_id(&self, id: &FrontierId) -> Result<Option<FrontierEntry>, StoreError> {
        Ok(lock(&self.frontiers)?.get(id.as_str()).cloned())
    }

    async fn get_by_url(&self, url: &str) -> Result<Option<FrontierEntry>, StoreError> {
        Ok(lock(&self.frontiers)?
            .values()
            .find(|entry| entry.url == url)
            .cloned())
    }

    async fn fetch_batch(
        &self,
        crawler: &str,
        status: FrontierStatus,
        limit: i64,
    ) -> Result<Vec<FrontierEntry>, StoreError> {
        let frontiers = lock(&self.frontiers)?;
        let mut batch: Vec<FrontierEntry> = frontiers
            .values()
            .filter(|entry| entry.crawler == crawler && entry.status == status)
            .cloned()
            .collect();
        batch.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.url.cmp(&b.url)));
        batch.truncate(limit.max(0) as usize);
        Ok(batch)
    }
}

#[async_trait]
impl ExtractionStore for MemoryStore {
    async fn upsert_extractions(
        &self,
        extractions: &[ExtractionRecord],
    ) -> Result<Vec<ItemOutcome>, StoreError> {
        let mut stored = lock(&self.extractions)?;
        let mut outcomes = Vec::with_capacity(extractions.len());
        for extraction in extractions {
            upsert_extraction(&mut stored, extraction);
            outcomes.push(Ok(()));
        }
        Ok(outcomes)
    }

    async fn get_extraction(
        &self,
        id: &FrontierId,
    ) -> Result<Option<ExtractionRecord>, StoreError> {
        Ok(lock(&self.extractions)?.get(id.as_str()).cloned())
    }
}

#[async_trait]
impl ChunkSink for MemoryStore {
    async fn commit_chunk(
        &self,
        extractions: &[ExtractionRecord],
        crawled: &[FrontierId],
    ) -> Result<(), StoreError> {
        {
            let failing = lock(&self.failing_commits)?;
            if extractions
                .iter()
                .any(|extraction| failing.contains(extraction.id.as_str()))
            {
                return Err(StoreError::message("injected chunk commit failure"));
            }
        }

        let mut stored = lock(&self.extractions)?;
        let mut frontiers = lock(&self.frontiers)?;
        for extraction in extractions {
            upsert_extraction(&mut stored, extraction);
        }
        for id in crawled {
            if let Some(entry) = frontiers.get_mut(id.as_str()) {
                entry.status = FrontierStatus::Crawled;
            }
        }
        Ok(())
    }
}

fn upsert_extraction(stored: &mut HashMap<String, ExtractionRecord>, extraction: &ExtractionRecord) {
    match stored.get_mut(extraction.id.as_str()) {
        Some(existing) => {
            let created_at = existing.created_at;
            *existing = extraction.clone();
            existing.created_at = created_at;
        }
        None => {
            stored.insert(extraction.id.as_str().to_string(), extraction.clone());
        }
    }
}
