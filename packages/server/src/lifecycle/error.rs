use common::storage::StorageError;
use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("asset {0} not found")]
    NotFound(i64),

    #[error("asset {0} belongs to another user")]
    Forbidden(i64),

    /// Already UPLOADED, or another confirmation won the race.
    #[error("asset {0} is already confirmed")]
    AlreadyConfirmed(i64),

    /// Retryable until the intent expires.
    #[error("blob for asset {0} has not been uploaded")]
    BlobNotUploaded(i64),

    #[error("upload intent for asset {0} has expired")]
    IntentExpired(i64),

    #[error("asset {0} has not been uploaded")]
    NotUploaded(i64),

    #[error(transparent)]
    Storage(#[from] StoreError),

    #[error("blob storage error: {0}")]
    Blob(#[from] StorageError),
}
