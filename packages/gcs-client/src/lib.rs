//! Pure Google Cloud Storage JSON API client.
//!
//! A minimal client for the GCS upload API. Supports media uploads into a
//! bucket folder and computing the public URL of a stored object.
//!
//! # Example
//!
//! ```rust,ignore
//! use gcs_client::GcsClient;
//!
//! let client = GcsClient::new("lexicon-bo-bucket".into(), Some(token));
//!
//! let object = client
//!     .upload_file("crawler/judgements", "case.pdf", "/tmp/case.pdf")
//!     .await?;
//! println!("{}", client.public_url(&object.name));
//! ```

pub mod error;
pub mod types;

pub use error::{GcsError, Result};
pub use types::ObjectInfo;

use std::path::Path;

const UPLOAD_BASE_URL: &str = "https://storage.googleapis.com/upload/storage/v1/b";
const PUBLIC_BASE_URL: &str = "https://storage.googleapis.com";

pub struct GcsClient {
    client: reqwest::Client,
    bucket: String,
    token: Option<String>,
}

impl GcsClient {
    /// A client for one bucket. Pass `None` as the token for buckets that
    /// accept unauthenticated writes (emulators, test setups).
    pub fn new(bucket: String, token: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            bucket,
            token,
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Upload a local file as `{folder}/{object_name}` using a media
    /// upload. Returns the stored object's metadata.
    pub async fn upload_file(
        &self,
        folder: &str,
        object_name: &str,
        local_path: impl AsRef<Path>,
    ) -> Result<ObjectInfo> {
        let bytes = tokio::fs::read(local_path.as_ref()).await?;
        let object_path = format!("{folder}/{object_name}");
        tracing::info!(
            bucket = %self.bucket,
            object = %object_path,
            size = bytes.len(),
            "Uploading object to GCS"
        );

        let url = format!("{}/{}/o", UPLOAD_BASE_URL, self.bucket);
        let mut request = self
            .client
            .post(&url)
            .query(&[("uploadType", "media"), ("name", object_path.as_str())])
            .header("Content-Type", content_type_for(object_name))
            .body(bytes);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let resp = request.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(GcsError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let object: ObjectInfo = resp.json().await?;
        Ok(object)
    }

    /// Stable public URL of an object, valid for buckets with public read
    /// access.
    pub fn public_url(&self, object_path: &str) -> String {
        format!("{}/{}/{}", PUBLIC_BASE_URL, self.bucket, object_path)
    }
}

fn content_type_for(object_name: &str) -> &'static str {
    match object_name.rsplit('.').next() {
        Some("pdf") => "application/pdf",
        Some("html") => "text/html",
        Some("json") => "application/json",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_url_follows_the_bucket_layout() {
        let client = GcsClient::new("lexicon-bo-bucket".into(), None);
        assert_eq!(
            client.public_url("crawler/judgements/case.pdf"),
            "https://storage.googleapis.com/lexicon-bo-bucket/crawler/judgements/case.pdf"
        );
    }

    #[test]
    fn content_types_follow_the_extension() {
        assert_eq!(content_type_for("case.pdf"), "application/pdf");
        assert_eq!(content_type_for("case.html"), "text/html");
        assert_eq!(content_type_for("case.bin"), "application/octet-stream");
    }
}
