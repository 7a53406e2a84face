use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Content-addressed identifier for a frontier entry and its extraction.
///
/// Lowercase hex SHA-256 of the URL's UTF-8 bytes, taken as-is. Two URLs
/// that differ textually (query-parameter order, casing) hash to distinct
/// ids even when they address the same resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FrontierId(String);

impl FrontierId {
    pub fn from_url(url: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(url.as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    /// Wrap an already-derived hex digest (e.g. read back from storage).
    pub fn from_hex(digest: impl Into<String>) -> Self {
        Self(digest.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for FrontierId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Hash of a captured judgment container, used to detect unchanged content
/// on re-scrape.
pub fn page_hash(html: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(html.as_bytes());
    hex::encode(hasher.finalize())
}

/// Lifecycle state of a frontier entry. Transitions are forward-only:
/// NEW -> CRAWLED or NEW -> ERROR; a re-discovery upsert never regresses
/// status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrontierStatus {
    New,
    Crawled,
    Error,
}

impl FrontierStatus {
    pub fn as_i16(self) -> i16 {
        match self {
            FrontierStatus::New => 0,
            FrontierStatus::Crawled => 1,
            FrontierStatus::Error => 2,
        }
    }

    pub fn from_i16(value: i16) -> Self {
        match value {
            1 => FrontierStatus::Crawled,
            2 => FrontierStatus::Error,
            _ => FrontierStatus::New,
        }
    }
}

/// Listing-page summary captured at discovery time. Authoritative for the
/// fields that cannot reliably be re-derived from the detail page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingMetadata {
    pub citation_number: String,
    pub decision_date: String,
    pub title: String,
    pub categories: Vec<String>,
    pub case_numbers: Vec<String>,
}

/// One discovered detail-page URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrontierEntry {
    pub id: FrontierId,
    pub domain: String,
    pub crawler: String,
    pub url: String,
    pub status: FrontierStatus,
    pub metadata: ListingMetadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FrontierEntry {
    /// Build a NEW entry for a freshly discovered detail URL.
    pub fn discovered(
        url: String,
        domain: impl Into<String>,
        crawler: impl Into<String>,
        metadata: ListingMetadata,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: FrontierId::from_url(&url),
            domain: domain.into(),
            crawler: crawler.into(),
            url,
            status: FrontierStatus::New,
            metadata,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Which of the two known detail-page DOM layouts a judgment uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateVariant {
    Old,
    New,
}

/// Rich structured fields of one scraped judgment. Both template variants
/// populate this same shape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionMetadata {
    pub citation_number: String,
    pub case_numbers: Vec<String>,
    pub classifications: Vec<String>,
    pub year: String,
    pub decision_date: String,
    pub title: String,
    pub defendant: String,
    pub judicial_institution: String,
    pub judges: String,
    pub counsel: String,
    pub verdict: String,
    pub verdict_markdown: String,
    pub pdf_url: String,
}

/// Normalized output of scraping one detail page. Shares its identity with
/// the owning frontier entry (`id == url_frontier_id`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionRecord {
    pub id: FrontierId,
    pub url_frontier_id: FrontierId,
    pub site_content: Option<String>,
    pub page_hash: Option<String>,
    pub artifact_link: Option<String>,
    pub raw_page_link: Option<String>,
    pub language: String,
    pub metadata: ExtractionMetadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Result of probing page 1 of a listing query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub last_page: u32,
    pub total_results: u32,
}

/// A durably stored byte payload (PDF or raw HTML snapshot).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredArtifact {
    pub name: String,
    pub url: String,
    pub size: u64,
}

/// Outcome of one frontier discovery run.
#[derive(Debug, Clone)]
pub struct DiscoveryReport {
    pub run_id: Uuid,
    pub listing_pages: usize,
    pub discovered: usize,
}

/// Outcome of one scrape run.
#[derive(Debug, Clone)]
pub struct ScrapeReport {
    pub run_id: Uuid,
    pub scraped: usize,
    pub failed: usize,
    pub batches: usize,
}
