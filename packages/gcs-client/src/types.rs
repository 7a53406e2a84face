use serde::Deserialize;

/// Metadata GCS returns for an uploaded object.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectInfo {
    pub name: String,
    pub bucket: String,
    /// GCS serializes sizes as decimal strings.
    #[serde(default)]
    pub size: String,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub md5_hash: Option<String>,
}

impl ObjectInfo {
    pub fn size_bytes(&self) -> u64 {
        self.size.parse().unwrap_or(0)
    }
}
