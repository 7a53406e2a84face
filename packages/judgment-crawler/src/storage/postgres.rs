use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use crate::errors::StoreError;
use crate::traits::{ChunkSink, ExtractionStore, FrontierStore, ItemOutcome};
use crate::types::{
    ExtractionRecord, FrontierEntry, FrontierId, FrontierStatus,
};

const UPSERT_FRONTIER: &str = r#"
INSERT INTO url_frontiers (id, domain, crawler, url, status, metadata, created_at, updated_at)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
ON CONFLICT (id) DO UPDATE SET
    metadata = EXCLUDED.metadata,
    updated_at = EXCLUDED.updated_at
"#;

const UPDATE_STATUS: &str = r#"
UPDATE url_frontiers SET status = $2, updated_at = now() WHERE id = $1
"#;

const SELECT_FRONTIER_BY_ID: &str = r#"
SELECT id, domain, crawler, url, status, metadata, created_at, updated_at
FROM url_frontiers WHERE id = $1
"#;

const SELECT_FRONTIER_BY_URL: &str = r#"
SELECT id, domain, crawler, url, status, metadata, created_at, updated_at
FROM url_frontiers WHERE url = $1 LIMIT 1
"#;

const SELECT_FRONTIER_BATCH: &str = r#"
SELECT id, domain, crawler, url, status, metadata, created_at, updated_at
FROM url_frontiers
WHERE crawler = $1 AND status = $2
ORDER BY created_at ASC
LIMIT $3
"#;

const UPSERT_EXTRACTION: &str = r#"
INSERT INTO extractions (id, url_frontier_id, site_content, page_hash, artifact_link,
                         raw_page_link, language, metadata, created_at, updated_at)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
ON CONFLICT (id) DO UPDATE SET
    site_content = EXCLUDED.site_content,
    page_hash = EXCLUDED.page_hash,
    artifact_link = EXCLUDED.artifact_link,
    raw_page_link = EXCLUDED.raw_page_link,
    language = EXCLUDED.language,
    metadata = EXCLUDED.metadata,
    updated_at = EXCLUDED.updated_at
"#;

const SELECT_EXTRACTION: &str = r#"
SELECT id, url_frontier_id, site_content, page_hash, artifact_link,
       raw_page_link, language, metadata, created_at, updated_at
FROM extractions WHERE id = $1
"#;

/// Postgres-backed frontier and extraction storage.
///
/// The frontier upsert refreshes metadata and `updated_at` on conflict but
/// never touches `status` or `created_at`, so re-discovery cannot regress
/// an entry's lifecycle.
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FrontierStore for PostgresStore {
    async fn upsert_urls(&self, entries: &[FrontierEntry]) -> Result<Vec<ItemOutcome>, StoreError> {
        let mut outcomes = Vec::with_capacity(entries.len());
        for entry in entries {
            outcomes.push(upsert_frontier(&self.pool, entry).await);
        }
        Ok(outcomes)
    }

    async fn update_statuses(
        &self,
        changes: &[(FrontierId, FrontierStatus)],
    ) -> Result<Vec<ItemOutcome>, StoreError> {
        let mut outcomes = Vec::with_capacity(changes.len());
        for (id, status) in changes {
            let result = sqlx::query(UPDATE_STATUS)
                .bind(id.as_str())
                .bind(status.as_i16())
                .execute(&self.pool)
                .await;
            outcomes.push(result.map(|_| ()).map_err(StoreError::from));
        }
        Ok(outcomes)
    }

    async fn get_by_id(&self, id: &FrontierId) -> Result<Option<FrontierEntry>, StoreError> {
        let row = sqlx::query(SELECT_FRONTIER_BY_ID)
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.map(|row| frontier_from_row(&row)).transpose()
    }

    async fn get_by_url(&self, url: &str) -> Result<Option<FrontierEntry>, StoreError> {
        let row = sqlx::query(SELECT_FRONTIER_BY_URL)
            .bind(url)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|row| frontier_from_row(&row)).transpose()
    }

    async fn fetch_batch(
        &self,
        crawler: &str,
        status: FrontierStatus,
        limit: i64,
    ) -> Result<Vec<FrontierEntry>, StoreError> {
        let rows = sqlx::query(SELECT_FRONTIER_BATCH)
            .bind(crawler)
            .bind(status.as_i16())
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(frontier_from_row).collect()
    }
}

#[async_trait]
impl ExtractionStore for PostgresStore {
    async fn upsert_extractions(
        &self,
        extractions: &[ExtractionRecord],
    ) -> Result<Vec<ItemOutcome>, StoreError> {
        let mut outcomes = Vec::with_capacity(extractions.len());
        for extraction in extractions {
            let outcome = match extraction_metadata_json(extraction) {
                Ok(metadata) => bind_extraction(UPSERT_EXTRACTION, extraction, metadata)
                    .execute(&self.pool)
                    .await
                    .map(|_| ())
                    .map_err(StoreError::from),
                Err(err) => Err(err),
            };
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    async fn get_extraction(
        &self,
        id: &FrontierId,
    ) -> Result<Option<ExtractionRecord>, StoreError> {
        let row = sqlx::query(SELECT_EXTRACTION)
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.map(|row| extraction_from_row(&row)).transpose()
    }
}

#[async_trait]
impl ChunkSink for PostgresStore {
    async fn commit_chunk(
        &self,
        extractions: &[ExtractionRecord],
        crawled: &[FrontierId],
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        for extraction in extractions {
            let metadata = extraction_metadata_json(extraction)?;
            bind_extraction(UPSERT_EXTRACTION, extraction, metadata)
                .execute(&mut *tx)
                .await?;
        }

        for id in crawled {
            sqlx::query(UPDATE_STATUS)
                .bind(id.as_str())
                .bind(FrontierStatus::Crawled.as_i16())
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

async fn upsert_frontier(pool: &PgPool, entry: &FrontierEntry) -> ItemOutcome {
    let metadata = serde_json::to_value(&entry.metadata)
        .map_err(|err| StoreError::message(format!("serializing frontier metadata: {err}")))?;
    sqlx::query(UPSERT_FRONTIER)
        .bind(entry.id.as_str())
        .bind(&entry.domain)
        .bind(&entry.crawler)
        .bind(&entry.url)
        .bind(entry.status.as_i16())
        .bind(metadata)
        .bind(entry.created_at)
        .bind(entry.updated_at)
        .execute(pool)
        .await
        .map(|_| ())
        .map_err(StoreError::from)
}

fn extraction_metadata_json(
    extraction: &ExtractionRecord,
) -> Result<serde_json::Value, StoreError> {
    serde_json::to_value(&extraction.metadata)
        .map_err(|err| StoreError::message(format!("serializing extraction metadata: {err}")))
}

fn bind_extraction<'q>(
    sql: &'q str,
    extraction: &'q ExtractionRecord,
    metadata: serde_json::Value,
) -> sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments> {
    sqlx::query(sql)
        .bind(extraction.id.as_str())
        .bind(extraction.url_frontier_id.as_str())
        .bind(&extraction.site_content)
        .bind(&extraction.page_hash)
        .bind(&extraction.artifact_link)
        .bind(&extraction.raw_page_link)
        .bind(&extraction.language)
        .bind(metadata)
        .bind(extraction.created_at)
        .bind(extraction.updated_at)
}

fn frontier_from_row(row: &PgRow) -> Result<FrontierEntry, StoreError> {
    let metadata: serde_json::Value = row.try_get("metadata")?;
    let metadata = serde_json::from_value(metadata)
        .map_err(|err| StoreError::message(format!("decoding frontier metadata: {err}")))?;
    Ok(FrontierEntry {
        id: FrontierId::from_hex(row.try_get::<String, _>("id")?),
        domain: row.try_get("domain")?,
        crawler: row.try_get("crawler")?,
        url: row.try_get("url")?,
        status: FrontierStatus::from_i16(row.try_get("status")?),
        metadata,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn extraction_from_row(row: &PgRow) -> Result<ExtractionRecord, StoreError> {
    let metadata: serde_json::Value = row.try_get("metadata")?;
    let metadata = serde_json::from_value(metadata)
        .map_err(|err| StoreError::message(format!("decoding extraction metadata: {err}")))?;
    Ok(ExtractionRecord {
        id: FrontierId::from_hex(row.try_get::<String, _>("id")?),
        url_frontier_id: FrontierId::from_hex(row.try_get::<String, _>("url_frontier_id")?),
        site_content: row.try_get("site_content")?,
        page_hash: row.try_get("page_hash")?,
        artifact_link: row.try_get("artifact_link")?,
        raw_page_link: row.try_get("raw_page_link")?,
        language: row.try_get("language")?,
        metadata,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}
