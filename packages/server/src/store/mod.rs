//! Persistence of asset records.
//!
//! Every status change goes through a conditional write here: confirmation
//! compares the stored `version`, extraction results compare the stored
//! extraction status. Callers learn whether their write won from the return
//! value, never from an error.

mod memory;
mod sea;

pub use memory::MemoryAssetStore;
pub use sea::SeaOrmAssetStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::ocr_job::OcrJob;
use common::storage::StorageKey;
use common::{AssetOrigin, UploadStatus};
use sea_orm::DbErr;
use thiserror::Error;

use crate::entity::asset;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] DbErr),
}

/// Attributes of a new PENDING asset.
#[derive(Debug, Clone)]
pub struct NewAsset {
    pub user_id: i64,
    pub note_id: i64,
    pub file_name: String,
    pub file_size: i64,
    pub mime_type: String,
    pub storage_key: StorageKey,
    pub thumbnail_key: Option<StorageKey>,
    pub origin: AssetOrigin,
    pub upload_expires_at: Option<DateTime<Utc>>,
}

/// Result of the confirmation compare-and-swap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CasOutcome {
    /// The transition and its outbox row are committed.
    Applied(asset::Model),
    /// The version moved or the asset is no longer PENDING.
    Conflict,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionResolution {
    Completed {
        content: String,
        page_count: Option<i32>,
    },
    Failed,
}

#[async_trait]
pub trait AssetStore: Send + Sync {
    /// Persist a PENDING asset with version 0.
    async fn insert(&self, asset: NewAsset, now: DateTime<Utc>)
    -> Result<asset::Model, StoreError>;

    async fn find(&self, id: i64) -> Result<Option<asset::Model>, StoreError>;

    /// PENDING -> UPLOADED with extraction `processing`, only if the stored
    /// version still equals `expected_version`. The outbox row for `job` is
    /// written in the same transaction.
    async fn mark_uploaded(
        &self,
        id: i64,
        expected_version: i64,
        job: &OcrJob,
        now: DateTime<Utc>,
    ) -> Result<CasOutcome, StoreError>;

    /// Resolve an extraction that is still `processing`. Returns `None` when
    /// the asset is gone or already resolved; nothing is written in that case.
    async fn resolve_extraction(
        &self,
        id: i64,
        resolution: ExtractionResolution,
        now: DateTime<Utc>,
    ) -> Result<Option<asset::Model>, StoreError>;

    /// Ids of assets `processing` since before `updated_before`, oldest first.
    async fn find_stuck_processing(
        &self,
        updated_before: DateTime<Utc>,
        limit: u64,
    ) -> Result<Vec<i64>, StoreError>;

    /// Ids of PENDING assets whose intent expired before `expired_before`.
    async fn find_expired_intents(
        &self,
        expired_before: DateTime<Utc>,
        limit: u64,
    ) -> Result<Vec<i64>, StoreError>;

    /// PENDING -> FAILED if the intent is still pending and expired before
    /// `expired_before`. Returns whether the row changed.
    async fn expire_intent(
        &self,
        id: i64,
        expired_before: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    /// Remove the asset and its outbox row. Returns the removed record.
    async fn delete(&self, id: i64) -> Result<Option<asset::Model>, StoreError>;

    /// Sum of declared sizes of the note's assets in any of `statuses`.
    async fn declared_usage(
        &self,
        note_id: i64,
        statuses: &[UploadStatus],
    ) -> Result<i64, StoreError>;

    /// Outbox rows last handed out before `enqueued_before`. Claimed rows get
    /// `enqueued_at = now` and one more attempt.
    async fn claim_stale_dispatches(
        &self,
        enqueued_before: DateTime<Utc>,
        now: DateTime<Utc>,
        limit: u64,
    ) -> Result<Vec<OcrJob>, StoreError>;

    /// Drop the outbox row once the job is on the OCR queue.
    async fn clear_dispatch(&self, asset_id: i64, job_id: &str) -> Result<(), StoreError>;
}
