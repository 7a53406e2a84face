use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;

pub const CRAWLER_NAME: &str = "singapore-supreme-court-crawler";
pub const CRAWLER_DOMAIN: &str = "www.elitigation.sg";

const DEFAULT_START_URL: &str = "https://www.elitigation.sg/gd/Home/Index?filter=SUPCT&yearOfDecision=All&sortBy=DateOfDecision&currentPage=1&sortAscending=false&searchPhrase=CatchWords:Corruption&verbose=false";

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub start_url: String,
    pub gcs_bucket: String,
    pub gcs_token: Option<String>,
    pub pool_size: usize,
    pub batch_size: i64,
    pub chunk_size: usize,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            start_url: env::var("START_URL").unwrap_or_else(|_| DEFAULT_START_URL.to_string()),
            gcs_bucket: env::var("GCS_BUCKET")
                .unwrap_or_else(|_| "lexicon-bo-bucket".to_string()),
            gcs_token: env::var("GCS_TOKEN").ok(),
            pool_size: env::var("SESSION_POOL_SIZE")
                .unwrap_or_else(|_| "7".to_string())
                .parse()
                .context("SESSION_POOL_SIZE must be a valid number")?,
            batch_size: env::var("SCRAPE_BATCH_SIZE")
                .unwrap_or_else(|_| "100".to_string())
                .parse()
                .context("SCRAPE_BATCH_SIZE must be a valid number")?,
            chunk_size: env::var("SCRAPE_CHUNK_SIZE")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .context("SCRAPE_CHUNK_SIZE must be a valid number")?,
        })
    }
}
