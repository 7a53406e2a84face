use std::path::Path;

use async_trait::async_trait;

use crate::errors::{SessionError, StoreError};
use crate::types::{ExtractionRecord, FrontierEntry, FrontierId, FrontierStatus};

/// Per-item outcome of a batched store operation. Batches report each item
/// individually rather than all-or-nothing.
pub type ItemOutcome = Result<(), StoreError>;

/// Persistence of discovered detail-page URLs.
#[async_trait]
pub trait FrontierStore: Send + Sync {
    /// Idempotent upsert keyed by content-addressed id. A conflicting row
    /// refreshes metadata and `updated_at` only; `status` and `created_at`
    /// are never regressed.
    async fn upsert_urls(&self, entries: &[FrontierEntry]) -> Result<Vec<ItemOutcome>, StoreError>;

    async fn update_statuses(
        &self,
        changes: &[(FrontierId, FrontierStatus)],
    ) -> Result<Vec<ItemOutcome>, StoreError>;

    async fn get_by_id(&self, id: &FrontierId) -> Result<Option<FrontierEntry>, StoreError>;

    async fn get_by_url(&self, url: &str) -> Result<Option<FrontierEntry>, StoreError>;

    /// Fetch up to `limit` entries for one crawler in the given status,
    /// oldest first.
    async fn fetch_batch(
        &self,
        crawler: &str,
        status: FrontierStatus,
        limit: i64,
    ) -> Result<Vec<FrontierEntry>, StoreError>;
}

/// Persistence of normalized judgment extractions.
#[async_trait]
pub trait ExtractionStore: Send + Sync {
    async fn upsert_extractions(
        &self,
        extractions: &[ExtractionRecord],
    ) -> Result<Vec<ItemOutcome>, StoreError>;

    async fn get_extraction(&self, id: &FrontierId)
        -> Result<Option<ExtractionRecord>, StoreError>;
}

/// Transactional seam for the scrape orchestrator: one transaction wraps a
/// chunk's extraction upserts and its CRAWLED status promotions. If it
/// fails, neither mutation is observed and the entries stay NEW.
#[async_trait]
pub trait ChunkSink: Send + Sync {
    async fn commit_chunk(
        &self,
        extractions: &[ExtractionRecord],
        crawled: &[FrontierId],
    ) -> Result<(), StoreError>;
}

/// Durable object storage for artifacts.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Upload a local file under `folder/object_name`, returning the stable
    /// public URL.
    async fn upload(
        &self,
        folder: &str,
        object_name: &str,
        local_path: &Path,
    ) -> Result<String, Box<dyn std::error::Error + Send + Sync>>;
}

/// Narrow browser-session capability set the pipeline depends on.
#[async_trait]
pub trait PageSession: Send {
    async fn navigate(&mut self, url: &str) -> Result<(), SessionError>;

    /// Wait until the loaded page has settled.
    async fn wait_stable(&mut self) -> Result<(), SessionError>;

    /// Full HTML of the currently loaded page.
    fn content(&self) -> Result<&str, SessionError>;

    async fn close(&mut self) {}
}

/// Creates fresh sessions for the pool on capacity misses.
#[async_trait]
pub trait SessionFactory: Send + Sync + 'static {
    type Session: PageSession + 'static;

    async fn create(&self) -> Result<Self::Session, SessionError>;
}
