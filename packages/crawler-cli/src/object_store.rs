use std::path::Path;

use async_trait::async_trait;
use gcs_client::GcsClient;
use judgment_crawler::ObjectStore;

/// Adapts the GCS client to the pipeline's object-store seam.
pub struct GcsObjectStore {
    client: GcsClient,
}

impl GcsObjectStore {
    pub fn new(client: GcsClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ObjectStore for GcsObjectStore {
    async fn upload(
        &self,
        folder: &str,
        object_name: &str,
        local_path: &Path,
    ) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
        let object = self
            .client
            .upload_file(folder, object_name, local_path)
            .await?;
        Ok(self.client.public_url(&object.name))
    }
}
