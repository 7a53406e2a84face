use std::io::Write;
use std::path::{Component, Path};
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;
use tempfile::NamedTempFile;
use tracing::info;

use crate::errors::CrawlError;
use crate::traits::ObjectStore;
use crate::types::StoredArtifact;

static NON_ALPHANUMERIC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[^a-zA-Z0-9 ]+").unwrap_or_else(|_| unreachable!())
});

const MAX_OBJECT_NAME: usize = 100;

/// Durable copies of one judgment: the PDF and the HTML snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterializedArtifacts {
    pub artifact: StoredArtifact,
    pub raw_page: StoredArtifact,
}

/// Seam the scrape orchestrator uses to persist artifacts, mockable in
/// tests.
#[async_trait]
pub trait Materializer: Send + Sync {
    /// Download the judgment PDF and store it together with an HTML
    /// snapshot of the already-fetched detail page.
    async fn materialize(
        &self,
        name: &str,
        pdf_url: &str,
        page_html: &str,
    ) -> Result<MaterializedArtifacts, CrawlError>;
}

/// Materializer backed by HTTP download plus an object store.
pub struct ArtifactMaterializer<O: ObjectStore> {
    client: reqwest::Client,
    store: Arc<O>,
    pdf_folder: String,
    html_folder: String,
}

impl<O: ObjectStore> ArtifactMaterializer<O> {
    pub fn new(client: reqwest::Client, store: Arc<O>, crawler: &str) -> Self {
        Self {
            client,
            store,
            pdf_folder: format!("{crawler}/judgements"),
            html_folder: format!("{crawler}/html"),
        }
    }

    async fn download_pdf(&self, pdf_url: &str) -> Result<(NamedTempFile, u64), CrawlError> {
        let response = self
            .client
            .get(pdf_url)
            .send()
            .await
            .map_err(|err| CrawlError::Artifact(format!("downloading {pdf_url}: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CrawlError::Artifact(format!(
                "downloading {pdf_url}: status {status}"
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|err| CrawlError::Artifact(format!("reading {pdf_url}: {err}")))?;
        let file = write_temp(&bytes)?;
        Ok((file, bytes.len() as u64))
    }

    async fn upload(
        &self,
        folder: &str,
        object_name: String,
        path: &Path,
        size: u64,
    ) -> Result<StoredArtifact, CrawlError> {
        let url = self
            .store
            .upload(folder, &object_name, path)
            .await
            .map_err(|err| CrawlError::Artifact(format!("uploading {object_name}: {err}")))?;
        Ok(StoredArtifact {
            name: object_name,
            url,
            size,
        })
    }
}

#[async_trait]
impl<O: ObjectStore> Materializer for ArtifactMaterializer<O> {
    async fn materialize(
        &self,
        name: &str,
        pdf_url: &str,
        page_html: &str,
    ) -> Result<MaterializedArtifacts, CrawlError> {
        ensure_no_traversal(name)?;
        ensure_no_parent_segments(pdf_url)?;
        let base = sanitize_object_name(name);

        // Temp files delete themselves on every exit path.
        let (pdf_file, pdf_size) = self.download_pdf(pdf_url).await?;
        let artifact = self
            .upload(
                &self.pdf_folder,
                format!("{base}.pdf"),
                pdf_file.path(),
                pdf_size,
            )
            .await?;
        info!(object = %artifact.name, size = pdf_size, "stored judgment pdf");

        let html_file = write_temp(page_html.as_bytes())?;
        let raw_page = self
            .upload(
                &self.html_folder,
                format!("{base}.html"),
                html_file.path(),
                page_html.len() as u64,
            )
            .await?;
        info!(object = %raw_page.name, "stored html snapshot");

        Ok(MaterializedArtifacts { artifact, raw_page })
    }
}

/// Collapse every run of characters outside `[a-zA-Z0-9 ]` to one
/// underscore, cap the length, and replace spaces with underscores.
pub fn sanitize_object_name(name: &str) -> String {
    let replaced = NON_ALPHANUMERIC.replace_all(name, "_");
    let truncated: String = replaced.chars().take(MAX_OBJECT_NAME).collect();
    truncated.replace(' ', "_")
}

/// Reject names whose lexical path escapes the storage folder.
fn ensure_no_traversal(name: &str) -> Result<(), CrawlError> {
    let escapes = Path::new(name)
        .components()
        .any(|component| matches!(component, Component::ParentDir | Component::RootDir));
    if escapes {
        return Err(CrawlError::Artifact(format!(
            "artifact name {name:?} escapes the storage folder"
        )));
    }
    Ok(())
}

/// The PDF link comes straight off the scraped page. Refuse any URL whose
/// path climbs out of its directory before touching the network; URL
/// resolution would fold the dot segments away, so the check is lexical
/// on the raw string.
fn ensure_no_parent_segments(pdf_url: &str) -> Result<(), CrawlError> {
    let climbs = pdf_url
        .split(['/', '\\'])
        .any(|segment| segment == "..");
    if climbs {
        return Err(CrawlError::Artifact(format!(
            "pdf url {pdf_url:?} escapes its directory"
        )));
    }
    Ok(())
}

fn write_temp(bytes: &[u8]) -> Result<NamedTempFile, CrawlError> {
    let mut file = NamedTempFile::new()
        .map_err(|err| CrawlError::Artifact(format!("creating temp file: {err}")))?;
    file.write_all(bytes)
        .and_then(|()| file.flush())
        .map_err(|err| CrawlError::Artifact(format!("writing temp file: {err}")))?;
    Ok(file)
}
