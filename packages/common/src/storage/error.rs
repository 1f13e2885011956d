use thiserror::Error;

/// Errors raised by blob storage backends.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("blob not found: {0}")]
    NotFound(String),

    #[error("storage IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed, or would resolve outside the store root.
    #[error("invalid storage key: {0}")]
    InvalidKey(String),

    #[error("blob exceeds size limit ({actual} > {limit} bytes)")]
    SizeLimitExceeded { actual: u64, limit: u64 },

    /// The remote backend rejected the request or was unreachable.
    #[error("storage backend error: {0}")]
    Backend(String),
}
