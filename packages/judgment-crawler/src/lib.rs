//! Crawl and scrape pipeline for published court judgments.
//!
//! The pipeline runs in two phases over a URL frontier keyed by
//! content-addressed ids:
//!
//! 1. Discovery walks a listing query page by page and upserts every detail
//!    URL it finds, with the listing card's metadata attached.
//! 2. Scraping fetches NEW frontier entries in batches, extracts the
//!    judgment from either detail-page template, stores the PDF and an HTML
//!    snapshot, and promotes each committed entry to CRAWLED.
//!
//! Both phases share a bounded session pool and stop dispatching work when
//! the cancellation token fires.

pub mod artifacts;
pub mod discover;
pub mod errors;
pub mod extract;
pub mod pagination;
pub mod parser;
pub mod pool;
pub mod query;
pub mod scrape;
pub mod session;
pub mod storage;
pub mod traits;
pub mod types;

pub use artifacts::{ArtifactMaterializer, MaterializedArtifacts, Materializer};
pub use discover::DiscoveryEffect;
pub use errors::{CrawlError, SessionError, StoreError};
pub use pool::{PooledSession, SessionPool};
pub use query::ListingQuery;
pub use scrape::ScrapeEffect;
pub use session::{HttpSession, HttpSessionFactory};
pub use storage::{MemoryStore, PostgresStore};
pub use traits::{
    ChunkSink, ExtractionStore, FrontierStore, ItemOutcome, ObjectStore, PageSession,
    SessionFactory,
};
pub use types::{
    page_hash, DiscoveryReport, ExtractionMetadata, ExtractionRecord, FrontierEntry, FrontierId,
    FrontierStatus, ListingMetadata, Pagination, ScrapeReport, StoredArtifact, TemplateVariant,
};
