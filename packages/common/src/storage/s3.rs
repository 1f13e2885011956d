use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use s3::Bucket;
use s3::creds::Credentials;
use s3::error::S3Error;
use s3::region::Region;
use serde::{Deserialize, Serialize};

use super::error::StorageError;
use super::key::StorageKey;
use super::traits::{BlobStore, Presigner};

/// Connection settings for an S3-compatible bucket.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct S3Settings {
    pub bucket: String,
    pub region: String,
    /// Custom endpoint (MinIO, R2, ...). `None` uses AWS.
    #[serde(default)]
    pub endpoint: Option<String>,
    pub access_key: String,
    pub secret_key: String,
    #[serde(default)]
    pub path_style: bool,
}

pub struct S3BlobStore {
    bucket: Box<Bucket>,
    max_size: u64,
}

impl S3BlobStore {
    pub fn new(settings: &S3Settings, max_size: u64) -> Result<Self, StorageError> {
        let region = match &settings.endpoint {
            Some(endpoint) => Region::Custom {
                region: settings.region.clone(),
                endpoint: endpoint.clone(),
            },
            None => settings
                .region
                .parse()
                .map_err(|e| StorageError::Backend(format!("invalid region: {e}")))?,
        };
        let credentials = Credentials::new(
            Some(&settings.access_key),
            Some(&settings.secret_key),
            None,
            None,
            None,
        )
        .map_err(|e| StorageError::Backend(format!("invalid credentials: {e}")))?;

        let mut bucket = Bucket::new(&settings.bucket, region, credentials).map_err(backend)?;
        if settings.path_style {
            bucket = bucket.with_path_style();
        }
        Ok(Self { bucket, max_size })
    }
}

fn backend(err: S3Error) -> StorageError {
    StorageError::Backend(err.to_string())
}

fn check_status(key: &StorageKey, status: u16) -> Result<(), StorageError> {
    match status {
        200..=299 => Ok(()),
        404 => Err(StorageError::NotFound(key.to_string())),
        other => Err(StorageError::Backend(format!(
            "unexpected status {other} for '{key}'"
        ))),
    }
}

fn expiry_secs(ttl: Duration) -> u32 {
    // S3 caps presigned URLs at seven days.
    ttl.as_secs().clamp(1, 604_800) as u32
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn put(&self, key: &StorageKey, data: &[u8]) -> Result<(), StorageError> {
        if data.len() as u64 > self.max_size {
            return Err(StorageError::SizeLimitExceeded {
                actual: data.len() as u64,
                limit: self.max_size,
            });
        }
        let response = self
            .bucket
            .put_object(key.as_str(), data)
            .await
            .map_err(backend)?;
        check_status(key, response.status_code())
    }

    async fn exists(&self, key: &StorageKey) -> Result<bool, StorageError> {
        match self.bucket.head_object(key.as_str()).await {
            Ok((_, 404)) => Ok(false),
            Ok((_, status)) => check_status(key, status).map(|()| true),
            Err(S3Error::HttpFailWithBody(404, _)) => Ok(false),
            Err(e) => Err(backend(e)),
        }
    }

    async fn delete(&self, key: &StorageKey) -> Result<bool, StorageError> {
        // S3 deletes are idempotent and do not report whether the object was there.
        if !self.exists(key).await? {
            return Ok(false);
        }
        let response = self
            .bucket
            .delete_object(key.as_str())
            .await
            .map_err(backend)?;
        check_status(key, response.status_code())?;
        Ok(true)
    }
}

#[async_trait]
impl Presigner for S3BlobStore {
    async fn upload_target(
        &self,
        key: &StorageKey,
        _mime_type: &str,
        ttl: Duration,
    ) -> Result<String, StorageError> {
        self.bucket
            .presign_put(key.as_str(), expiry_secs(ttl), None, None)
            .await
            .map_err(backend)
    }

    async fn download_target(
        &self,
        key: &StorageKey,
        file_name: &str,
        ttl: Duration,
    ) -> Result<String, StorageError> {
        let mut queries = HashMap::new();
        queries.insert(
            "response-content-disposition".to_string(),
            format!("attachment; filename=\"{}\"", file_name.replace('"', "")),
        );
        self.bucket
            .presign_get(key.as_str(), expiry_secs(ttl), Some(queries))
            .await
            .map_err(backend)
    }
}
