use thiserror::Error;

/// Persistence-layer failure (frontier or extraction store).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("{0}")]
    Message(String),
}

impl StoreError {
    pub fn message(msg: impl Into<String>) -> Self {
        StoreError::Message(msg.into())
    }
}

/// Page-session transport failure.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("navigation to {url} failed with status {status}")]
    BadStatus { url: String, status: u16 },
    #[error("no page loaded in session")]
    NotLoaded,
    #[error("session pool unavailable: {0}")]
    Pool(String),
}

/// Pipeline error taxonomy. Per-item variants never abort sibling work;
/// `Discovery` is fatal to a discovery run and `Cancelled` halts dispatch
/// everywhere.
#[derive(Debug, Error)]
pub enum CrawlError {
    /// Listing or pagination structure missing; fatal to a discovery run.
    #[error("discovery failed: {0}")]
    Discovery(String),

    /// A single card or element missing expected structure; skipped.
    #[error("parse error: {0}")]
    Parse(String),

    /// Detail-page structure missing; fatal to that one URL's scrape.
    #[error("extraction failed for {url}: {reason}")]
    Extraction { url: String, reason: String },

    /// Download, upload, or path-validation failure; fatal to that URL.
    #[error("artifact handling failed: {0}")]
    Artifact(String),

    /// Transaction failure; fatal to one chunk, entries stay retryable.
    #[error(transparent)]
    Persistence(#[from] StoreError),

    #[error(transparent)]
    Session(#[from] SessionError),

    /// Cancellation signal observed; no further work is dispatched.
    #[error("operation cancelled")]
    Cancelled,

    /// Run-level signal for a discovery run that persisted partial progress
    /// but had listing pages fail.
    #[error("{failed} of {total} listing pages failed during discovery")]
    DiscoveryRun { failed: usize, total: usize },
}

impl CrawlError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, CrawlError::Cancelled)
    }
}
