use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::fs;

use super::error::StorageError;
use super::key::StorageKey;
use super::traits::{BlobStore, Presigner};

/// Filesystem-backed blob store for local development and tests.
///
/// Objects live at `{base_path}/objects/{key}`; writes go through
/// `{base_path}/.tmp` and are renamed into place so readers never observe a
/// partial object.
pub struct FilesystemBlobStore {
    base_path: PathBuf,
    max_size: u64,
}

impl FilesystemBlobStore {
    /// Create a new filesystem blob store.
    pub async fn new(base_path: PathBuf, max_size: u64) -> Result<Self, StorageError> {
        fs::create_dir_all(base_path.join("objects")).await?;
        fs::create_dir_all(base_path.join(".tmp")).await?;
        let base_path = fs::canonicalize(&base_path).await?;
        Ok(Self {
            base_path,
            max_size,
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn object_path(&self, key: &StorageKey) -> PathBuf {
        let mut path = self.base_path.join("objects");
        path.extend(key.segments());
        path
    }

    fn temp_path(&self) -> PathBuf {
        self.base_path
            .join(".tmp")
            .join(uuid::Uuid::new_v4().to_string())
    }

    fn file_url(&self, key: &StorageKey, query: &str) -> String {
        format!("file://{}?{query}", self.object_path(key).display())
    }
}

#[async_trait]
impl BlobStore for FilesystemBlobStore {
    async fn put(&self, key: &StorageKey, data: &[u8]) -> Result<(), StorageError> {
        if data.len() as u64 > self.max_size {
            return Err(StorageError::SizeLimitExceeded {
                actual: data.len() as u64,
                limit: self.max_size,
            });
        }

        let temp_path = self.temp_path();
        if let Err(e) = fs::write(&temp_path, data).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        let object_path = self.object_path(key);
        if let Some(parent) = object_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        if let Err(e) = fs::rename(&temp_path, &object_path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        Ok(())
    }

    async fn exists(&self, key: &StorageKey) -> Result<bool, StorageError> {
        Ok(fs::try_exists(self.object_path(key)).await?)
    }

    async fn delete(&self, key: &StorageKey) -> Result<bool, StorageError> {
        match fs::remove_file(self.object_path(key)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

/// `file://` targets. There is no signature; the expiry is advisory.
#[async_trait]
impl Presigner for FilesystemBlobStore {
    async fn upload_target(
        &self,
        key: &StorageKey,
        mime_type: &str,
        ttl: Duration,
    ) -> Result<String, StorageError> {
        let expires = Utc::now().timestamp() + ttl.as_secs() as i64;
        Ok(self.file_url(key, &format!("content-type={mime_type}&expires={expires}")))
    }

    async fn download_target(
        &self,
        key: &StorageKey,
        _file_name: &str,
        ttl: Duration,
    ) -> Result<String, StorageError> {
        let expires = Utc::now().timestamp() + ttl.as_secs() as i64;
        Ok(self.file_url(key, &format!("expires={expires}")))
    }
}
