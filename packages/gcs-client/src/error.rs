use thiserror::Error;

#[derive(Debug, Error)]
pub enum GcsError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("gcs api error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, GcsError>;
