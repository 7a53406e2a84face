// Batch entry point: one discovery pass followed by one scrape pass.

mod config;
mod object_store;

use std::sync::Arc;

use anyhow::{Context, Result};
use gcs_client::GcsClient;
use judgment_crawler::{
    ArtifactMaterializer, DiscoveryEffect, HttpSessionFactory, ListingQuery, PostgresStore,
    ScrapeEffect, SessionPool,
};
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use config::{Config, CRAWLER_DOMAIN, CRAWLER_NAME};
use object_store::GcsObjectStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,judgment_crawler=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting judgment crawler");

    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!("Configuration loaded");

    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Database connected");

    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;
    tracing::info!("Migrations complete");

    let store = Arc::new(PostgresStore::new(pool));
    let sessions = SessionPool::new(
        HttpSessionFactory::new().context("Failed to build http session factory")?,
        config.pool_size,
    );
    let gcs = GcsClient::new(config.gcs_bucket.clone(), config.gcs_token.clone());
    let materializer = Arc::new(ArtifactMaterializer::new(
        reqwest::Client::new(),
        Arc::new(GcsObjectStore::new(gcs)),
        CRAWLER_NAME,
    ));

    // Ctrl-C stops dispatching new work; in-flight pages finish first.
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Shutdown signal received, cancelling");
                cancel.cancel();
            }
        });
    }

    let query = ListingQuery::parse(&config.start_url).context("Invalid START_URL")?;

    let discovery = DiscoveryEffect::new(
        Arc::clone(&store),
        Arc::clone(&sessions),
        CRAWLER_DOMAIN,
        CRAWLER_NAME,
    );
    match discovery.run(&query, &cancel).await {
        Ok(report) => tracing::info!(
            run_id = %report.run_id,
            listing_pages = report.listing_pages,
            discovered = report.discovered,
            "Discovery complete"
        ),
        Err(err) if err.is_cancelled() => {
            tracing::warn!("Discovery cancelled");
            sessions.drain().await;
            return Ok(());
        }
        // Partial discovery progress is persisted; scraping still runs.
        Err(err) => tracing::error!(error = %err, "Discovery finished with errors"),
    }

    let scraper = ScrapeEffect::new(
        Arc::clone(&store),
        Arc::clone(&sessions),
        materializer,
        CRAWLER_DOMAIN,
        CRAWLER_NAME,
        config.batch_size,
        config.chunk_size,
    );
    match scraper.run(&cancel).await {
        Ok(report) => tracing::info!(
            run_id = %report.run_id,
            scraped = report.scraped,
            failed = report.failed,
            batches = report.batches,
            "Scrape complete"
        ),
        Err(err) if err.is_cancelled() => tracing::warn!("Scrape cancelled"),
        Err(err) => {
            sessions.drain().await;
            return Err(err).context("Scrape failed");
        }
    }

    sessions.drain().await;
    Ok(())
}
