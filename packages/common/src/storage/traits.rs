use std::time::Duration;

use async_trait::async_trait;

use super::error::StorageError;
use super::key::StorageKey;

/// Key-addressed blob storage.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store bytes under `key`, replacing any previous object.
    async fn put(&self, key: &StorageKey, data: &[u8]) -> Result<(), StorageError>;

    /// Check whether a blob exists.
    async fn exists(&self, key: &StorageKey) -> Result<bool, StorageError>;

    /// Delete a blob.
    ///
    /// Returns `true` if the blob was deleted, `false` if it did not exist.
    async fn delete(&self, key: &StorageKey) -> Result<bool, StorageError>;
}

/// Produces time-limited targets a client can use to move bytes directly
/// to and from the blob store.
#[async_trait]
pub trait Presigner: Send + Sync {
    /// URL the client PUTs the object body to.
    async fn upload_target(
        &self,
        key: &StorageKey,
        mime_type: &str,
        ttl: Duration,
    ) -> Result<String, StorageError>;

    /// URL the client GETs the object from, served as an attachment named
    /// `file_name`.
    async fn download_target(
        &self,
        key: &StorageKey,
        file_name: &str,
        ttl: Duration,
    ) -> Result<String, StorageError>;
}
