/// Errors raised by attachment backends.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("attachment not found: {0}")]
    NotFound(String),

    #[error("invalid attachment reference: {0}")]
    InvalidReference(String),

    #[error("storage IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("remote storage request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("remote storage rejected the request: {0}")]
    Remote(String),

    #[error("remote storage is not configured")]
    NotConfigured,
}

impl StorageError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound(_))
    }
}
