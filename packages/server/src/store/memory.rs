use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::ocr_job::OcrJob;
use common::{ExtractionStatus, UploadStatus};
use tokio::sync::Mutex;

use super::{AssetStore, CasOutcome, ExtractionResolution, NewAsset, StoreError};
use crate::entity::{asset, ocr_outbox};

#[derive(Default)]
struct Tables {
    next_id: i64,
    assets: BTreeMap<i64, asset::Model>,
    outbox: BTreeMap<i64, ocr_outbox::Model>,
}

/// In-process [`AssetStore`]. One lock guards both tables, so every
/// operation is a serializable transaction.
#[derive(Default)]
pub struct MemoryAssetStore {
    tables: Mutex<Tables>,
}

impl MemoryAssetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite `updated_at`, as if the last transition happened at `at`.
    pub async fn touch(&self, id: i64, at: DateTime<Utc>) -> bool {
        let mut tables = self.tables.lock().await;
        match tables.assets.get_mut(&id) {
            Some(asset) => {
                asset.updated_at = at;
                true
            }
            None => false,
        }
    }

    pub async fn outbox_entry(&self, asset_id: i64) -> Option<ocr_outbox::Model> {
        self.tables.lock().await.outbox.get(&asset_id).cloned()
    }

    /// Move an outbox row's hand-off time back to `at`.
    pub async fn backdate_dispatch(&self, asset_id: i64, at: DateTime<Utc>) -> bool {
        let mut tables = self.tables.lock().await;
        match tables.outbox.get_mut(&asset_id) {
            Some(row) => {
                row.enqueued_at = at;
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl AssetStore for MemoryAssetStore {
    async fn insert(
        &self,
        new: NewAsset,
        now: DateTime<Utc>,
    ) -> Result<asset::Model, StoreError> {
        let mut tables = self.tables.lock().await;
        tables.next_id += 1;
        let model = asset::Model {
            id: tables.next_id,
            user_id: new.user_id,
            note_id: new.note_id,
            file_name: new.file_name,
            file_size: new.file_size,
            mime_type: new.mime_type,
            storage_key: new.storage_key.into(),
            thumbnail_key: new.thumbnail_key.map(Into::into),
            origin: new.origin,
            upload_status: UploadStatus::Pending,
            upload_expires_at: new.upload_expires_at,
            extraction_status: None,
            extracted_content: None,
            page_count: None,
            extracted_at: None,
            version: 0,
            created_at: now,
            updated_at: now,
        };
        tables.assets.insert(model.id, model.clone());
        Ok(model)
    }

    async fn find(&self, id: i64) -> Result<Option<asset::Model>, StoreError> {
        Ok(self.tables.lock().await.assets.get(&id).cloned())
    }

    async fn mark_uploaded(
        &self,
        id: i64,
        expected_version: i64,
        job: &OcrJob,
        now: DateTime<Utc>,
    ) -> Result<CasOutcome, StoreError> {
        let mut tables = self.tables.lock().await;
        let Some(asset) = tables.assets.get_mut(&id) else {
            return Ok(CasOutcome::Conflict);
        };
        if asset.version != expected_version || asset.upload_status != UploadStatus::Pending {
            return Ok(CasOutcome::Conflict);
        }

        asset.upload_status = UploadStatus::Uploaded;
        asset.extraction_status = Some(ExtractionStatus::Processing);
        asset.version = expected_version + 1;
        asset.updated_at = now;
        let updated = asset.clone();

        tables.outbox.insert(
            id,
            ocr_outbox::Model {
                asset_id: id,
                job_id: job.job_id.clone(),
                storage_key: job.storage_key.clone(),
                mime_type: job.mime_type.clone(),
                attempts: 1,
                enqueued_at: now,
                created_at: now,
            },
        );
        Ok(CasOutcome::Applied(updated))
    }

    async fn resolve_extraction(
        &self,
        id: i64,
        resolution: ExtractionResolution,
        now: DateTime<Utc>,
    ) -> Result<Option<asset::Model>, StoreError> {
        let mut tables = self.tables.lock().await;
        let Some(asset) = tables.assets.get_mut(&id) else {
            return Ok(None);
        };
        if asset.extraction_status != Some(ExtractionStatus::Processing) {
            return Ok(None);
        }

        match resolution {
            ExtractionResolution::Completed {
                content,
                page_count,
            } => {
                asset.extraction_status = Some(ExtractionStatus::Completed);
                asset.extracted_content = Some(content);
                asset.page_count = page_count;
                asset.extracted_at = Some(now);
            }
            ExtractionResolution::Failed => {
                asset.extraction_status = Some(ExtractionStatus::Failed);
            }
        }
        asset.version += 1;
        asset.updated_at = now;
        let updated = asset.clone();

        tables.outbox.remove(&id);
        Ok(Some(updated))
    }

    async fn find_stuck_processing(
        &self,
        updated_before: DateTime<Utc>,
        limit: u64,
    ) -> Result<Vec<i64>, StoreError> {
        let tables = self.tables.lock().await;
        let mut stuck: Vec<_> = tables
            .assets
            .values()
            .filter(|a| {
                a.extraction_status == Some(ExtractionStatus::Processing)
                    && a.updated_at < updated_before
            })
            .map(|a| (a.updated_at, a.id))
            .collect();
        stuck.sort();
        Ok(stuck
            .into_iter()
            .take(limit as usize)
            .map(|(_, id)| id)
            .collect())
    }

    async fn find_expired_intents(
        &self,
        expired_before: DateTime<Utc>,
        limit: u64,
    ) -> Result<Vec<i64>, StoreError> {
        let tables = self.tables.lock().await;
        let mut expired: Vec<_> = tables
            .assets
            .values()
            .filter(|a| a.upload_status == UploadStatus::Pending)
            .filter_map(|a| {
                a.upload_expires_at
                    .filter(|at| *at < expired_before)
                    .map(|at| (at, a.id))
            })
            .collect();
        expired.sort();
        Ok(expired
            .into_iter()
            .take(limit as usize)
            .map(|(_, id)| id)
            .collect())
    }

    async fn expire_intent(
        &self,
        id: i64,
        expired_before: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut tables = self.tables.lock().await;
        let Some(asset) = tables.assets.get_mut(&id) else {
            return Ok(false);
        };
        let expired = asset.upload_status == UploadStatus::Pending
            && asset.upload_expires_at.is_some_and(|at| at < expired_before);
        if !expired {
            return Ok(false);
        }
        asset.upload_status = UploadStatus::Failed;
        asset.version += 1;
        asset.updated_at = now;
        Ok(true)
    }

    async fn delete(&self, id: i64) -> Result<Option<asset::Model>, StoreError> {
        let mut tables = self.tables.lock().await;
        tables.outbox.remove(&id);
        Ok(tables.assets.remove(&id))
    }

    async fn declared_usage(
        &self,
        note_id: i64,
        statuses: &[UploadStatus],
    ) -> Result<i64, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .assets
            .values()
            .filter(|a| a.note_id == note_id && statuses.contains(&a.upload_status))
            .map(|a| a.file_size)
            .sum())
    }

    async fn claim_stale_dispatches(
        &self,
        enqueued_before: DateTime<Utc>,
        now: DateTime<Utc>,
        limit: u64,
    ) -> Result<Vec<OcrJob>, StoreError> {
        let mut tables = self.tables.lock().await;
        let mut stale: Vec<_> = tables
            .outbox
            .values()
            .filter(|row| row.enqueued_at < enqueued_before)
            .map(|row| (row.enqueued_at, row.asset_id))
            .collect();
        stale.sort();

        let mut jobs = Vec::new();
        for (_, asset_id) in stale.into_iter().take(limit as usize) {
            if let Some(row) = tables.outbox.get_mut(&asset_id) {
                row.enqueued_at = now;
                row.attempts += 1;
                jobs.push(OcrJob {
                    job_id: row.job_id.clone(),
                    asset_id: row.asset_id,
                    storage_key: row.storage_key.clone(),
                    mime_type: row.mime_type.clone(),
                });
            }
        }
        Ok(jobs)
    }

    async fn clear_dispatch(&self, asset_id: i64, job_id: &str) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        if tables
            .outbox
            .get(&asset_id)
            .is_some_and(|row| row.job_id == job_id)
        {
            tables.outbox.remove(&asset_id);
        }
        Ok(())
    }
}
