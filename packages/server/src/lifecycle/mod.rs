//! Upload confirmation and OCR extraction lifecycle of an asset.
//!
//! ```text
//! (PENDING, -)        --confirm-->               (UPLOADED, processing)
//! (PENDING, -)        --intent expired-->        (FAILED, -)
//! (UPLOADED, processing) --result ok-->          (UPLOADED, completed)
//! (UPLOADED, processing) --result err/timeout--> (UPLOADED, failed)
//! ```
//!
//! Confirmation is a compare-and-swap on the asset version; the first caller
//! wins and every other caller gets [`LifecycleError::AlreadyConfirmed`].
//! Results, dispatch failures and the timeout sweep all go through the same
//! "only while processing" guard, so whichever resolves first sticks.

mod error;

pub use error::LifecycleError;

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use common::ocr_job::OcrJob;
use common::storage::{BlobStore, StorageKey};
use common::{AssetOrigin, UploadStatus};
use tracing::{error, info, warn};

use crate::dispatch::DispatchQueue;
use crate::entity::asset;
use crate::store::{AssetStore, CasOutcome, ExtractionResolution, NewAsset};

#[derive(Debug, Clone)]
pub struct LifecycleSettings {
    pub intent_ttl: Duration,
    /// Time past expiry before an unconfirmed intent is marked FAILED.
    pub intent_grace: Duration,
    /// Outbox rows older than this are handed to the dispatch pool again.
    pub redrive_after: Duration,
    /// Upper bound of records touched by one sweep.
    pub sweep_batch: u64,
}

impl Default for LifecycleSettings {
    fn default() -> Self {
        Self {
            intent_ttl: Duration::minutes(15),
            intent_grace: Duration::minutes(5),
            redrive_after: Duration::minutes(2),
            sweep_batch: 500,
        }
    }
}

/// An announced upload. Validation happens before this point.
#[derive(Debug, Clone)]
pub struct NewUploadIntent {
    pub user_id: i64,
    pub note_id: i64,
    pub file_name: String,
    pub mime_type: String,
    pub file_size: i64,
    pub origin: AssetOrigin,
}

/// An intent with its storage key and expiry decided but not yet stored.
#[derive(Debug, Clone)]
pub struct PlannedUpload {
    pub intent: NewUploadIntent,
    pub storage_key: StorageKey,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct UploadIntent {
    pub asset: asset::Model,
    pub storage_key: StorageKey,
    pub expires_at: DateTime<Utc>,
}

/// Counters of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub scanned: usize,
    pub transitioned: usize,
    /// Already resolved by someone else between scan and write.
    pub skipped: usize,
    pub errors: usize,
}

pub struct AssetLifecycle {
    store: Arc<dyn AssetStore>,
    blobs: Arc<dyn BlobStore>,
    queue: DispatchQueue,
    settings: LifecycleSettings,
}

impl AssetLifecycle {
    pub fn new(
        store: Arc<dyn AssetStore>,
        blobs: Arc<dyn BlobStore>,
        queue: DispatchQueue,
        settings: LifecycleSettings,
    ) -> Self {
        Self {
            store,
            blobs,
            queue,
            settings,
        }
    }

    pub fn settings(&self) -> &LifecycleSettings {
        &self.settings
    }

    /// Persist a PENDING asset and return where the client should upload.
    pub async fn create_upload_intent(
        &self,
        intent: NewUploadIntent,
    ) -> Result<UploadIntent, LifecycleError> {
        let planned = self.plan_upload_intent(intent, Utc::now())?;
        self.commit_upload_intent(planned).await
    }

    /// Pick the storage key and expiry of an upload without persisting it,
    /// so the caller can presign before a row exists.
    pub fn plan_upload_intent(
        &self,
        intent: NewUploadIntent,
        now: DateTime<Utc>,
    ) -> Result<PlannedUpload, LifecycleError> {
        let storage_key = StorageKey::for_asset(intent.user_id, intent.note_id, &intent.file_name)?;
        Ok(PlannedUpload {
            intent,
            storage_key,
            expires_at: now + self.settings.intent_ttl,
        })
    }

    /// Store a planned upload as a PENDING asset.
    pub async fn commit_upload_intent(
        &self,
        planned: PlannedUpload,
    ) -> Result<UploadIntent, LifecycleError> {
        let PlannedUpload {
            intent,
            storage_key,
            expires_at,
        } = planned;
        let now = Utc::now();

        let asset = self
            .store
            .insert(
                NewAsset {
                    user_id: intent.user_id,
                    note_id: intent.note_id,
                    file_name: intent.file_name,
                    file_size: intent.file_size,
                    mime_type: intent.mime_type,
                    storage_key: storage_key.clone(),
                    thumbnail_key: None,
                    origin: intent.origin,
                    upload_expires_at: Some(expires_at),
                },
                now,
            )
            .await?;

        info!(
            asset_id = asset.id,
            user_id = asset.user_id,
            note_id = asset.note_id,
            storage_key = %storage_key,
            "Upload intent created"
        );

        Ok(UploadIntent {
            asset,
            storage_key,
            expires_at,
        })
    }

    /// Confirm that the client finished uploading and start extraction.
    ///
    /// The job is queued only after the confirmation has committed. A second
    /// confirmation always fails, even when the first one is still running.
    pub async fn confirm_upload(
        &self,
        asset_id: i64,
        user_id: i64,
    ) -> Result<asset::Model, LifecycleError> {
        let asset = self.load_owned(asset_id, user_id).await?;
        if let Some(rejection) = confirmation_rejection(&asset) {
            return Err(rejection);
        }

        let key = StorageKey::parse(asset.storage_key.as_str())?;
        if !self.blobs.exists(&key).await? {
            info!(asset_id, storage_key = %key, "Confirmation before blob upload");
            return Err(LifecycleError::BlobNotUploaded(asset_id));
        }

        let job = OcrJob::new(asset.id, key.as_str(), asset.mime_type.as_str());
        match self
            .store
            .mark_uploaded(asset.id, asset.version, &job, Utc::now())
            .await?
        {
            CasOutcome::Conflict => {
                warn!(
                    asset_id,
                    version = asset.version,
                    "Lost confirmation race"
                );
                // Report what the winner did: a confirmation, an expiry or a delete.
                match self.store.find(asset_id).await? {
                    None => Err(LifecycleError::NotFound(asset_id)),
                    Some(current) => Err(confirmation_rejection(&current)
                        .unwrap_or(LifecycleError::AlreadyConfirmed(asset_id))),
                }
            }
            CasOutcome::Applied(updated) => {
                info!(asset_id, user_id, job_id = %job.job_id, "Upload confirmed");
                self.queue.enqueue(job);
                Ok(updated)
            }
        }
    }

    /// Record a successful extraction. `None` if the asset is gone or was
    /// already resolved.
    pub async fn complete_extraction(
        &self,
        asset_id: i64,
        content: String,
        page_count: Option<i32>,
    ) -> Result<Option<asset::Model>, LifecycleError> {
        let resolved = self
            .store
            .resolve_extraction(
                asset_id,
                ExtractionResolution::Completed {
                    content,
                    page_count,
                },
                Utc::now(),
            )
            .await?;

        match &resolved {
            Some(_) => info!(asset_id, page_count, "Extraction completed"),
            None => warn!(asset_id, "Ignoring extraction result for resolved asset"),
        }
        Ok(resolved)
    }

    /// Record a failed extraction. `None` if the asset is gone or was
    /// already resolved.
    pub async fn fail_extraction(
        &self,
        asset_id: i64,
    ) -> Result<Option<asset::Model>, LifecycleError> {
        let resolved = self
            .store
            .resolve_extraction(asset_id, ExtractionResolution::Failed, Utc::now())
            .await?;

        match &resolved {
            Some(_) => info!(asset_id, "Extraction failed"),
            None => warn!(asset_id, "Ignoring extraction failure for resolved asset"),
        }
        Ok(resolved)
    }

    /// Fail every extraction that has been processing for longer than
    /// `threshold`. One asset failing to update does not stop the others.
    pub async fn reconcile_timeouts(
        &self,
        threshold: Duration,
        now: DateTime<Utc>,
    ) -> Result<SweepReport, LifecycleError> {
        let stuck = self
            .store
            .find_stuck_processing(now - threshold, self.settings.sweep_batch)
            .await?;

        let mut report = SweepReport {
            scanned: stuck.len(),
            ..Default::default()
        };

        for asset_id in stuck {
            match self.fail_extraction(asset_id).await {
                Ok(Some(_)) => {
                    warn!(asset_id, threshold_secs = threshold.num_seconds(), "Extraction timed out");
                    report.transitioned += 1;
                }
                Ok(None) => report.skipped += 1,
                Err(e) => {
                    error!(asset_id, error = %e, "Failed to time out extraction");
                    report.errors += 1;
                }
            }
        }

        Ok(report)
    }

    /// Mark intents that were never confirmed as FAILED.
    pub async fn expire_stale_intents(
        &self,
        now: DateTime<Utc>,
    ) -> Result<SweepReport, LifecycleError> {
        let cutoff = now - self.settings.intent_grace;
        let expired = self
            .store
            .find_expired_intents(cutoff, self.settings.sweep_batch)
            .await?;

        let mut report = SweepReport {
            scanned: expired.len(),
            ..Default::default()
        };

        for asset_id in expired {
            match self.store.expire_intent(asset_id, cutoff, now).await {
                Ok(true) => {
                    info!(asset_id, "Upload intent expired");
                    report.transitioned += 1;
                }
                Ok(false) => report.skipped += 1,
                Err(e) => {
                    error!(asset_id, error = %e, "Failed to expire upload intent");
                    report.errors += 1;
                }
            }
        }

        Ok(report)
    }

    /// Queue again every committed job whose dispatch was never acknowledged.
    pub async fn redrive_dispatches(&self, now: DateTime<Utc>) -> Result<usize, LifecycleError> {
        let jobs = self
            .store
            .claim_stale_dispatches(
                now - self.settings.redrive_after,
                now,
                self.settings.sweep_batch,
            )
            .await?;

        let mut queued = 0;
        for job in jobs {
            info!(asset_id = job.asset_id, job_id = %job.job_id, "Redriving OCR job");
            if !self.queue.enqueue(job) {
                break;
            }
            queued += 1;
        }
        Ok(queued)
    }

    /// The job reached the OCR queue; forget its outbox row.
    pub async fn acknowledge_dispatch(&self, job: &OcrJob) -> Result<(), LifecycleError> {
        self.store.clear_dispatch(job.asset_id, &job.job_id).await?;
        Ok(())
    }

    /// Delete the record, then remove its blobs in the background. Blob
    /// removal failures are logged only.
    pub async fn delete_asset(&self, asset_id: i64, user_id: i64) -> Result<(), LifecycleError> {
        self.load_owned(asset_id, user_id).await?;

        let Some(removed) = self.store.delete(asset_id).await? else {
            return Err(LifecycleError::NotFound(asset_id));
        };
        info!(asset_id, user_id, "Asset deleted");

        let keys: Vec<String> = std::iter::once(removed.storage_key)
            .chain(removed.thumbnail_key)
            .collect();
        let blobs = self.blobs.clone();
        tokio::spawn(async move {
            for raw in keys {
                let key = match StorageKey::parse(raw.as_str()) {
                    Ok(key) => key,
                    Err(e) => {
                        warn!(asset_id, storage_key = %raw, error = %e, "Skipping blob with invalid key");
                        continue;
                    }
                };
                if let Err(e) = blobs.delete(&key).await {
                    warn!(asset_id, storage_key = %key, error = %e, "Failed to delete blob");
                }
            }
        });

        Ok(())
    }

    pub async fn get_asset(
        &self,
        asset_id: i64,
        user_id: i64,
    ) -> Result<asset::Model, LifecycleError> {
        self.load_owned(asset_id, user_id).await
    }

    /// Like [`Self::get_asset`], but only for assets whose upload was
    /// confirmed.
    pub async fn get_downloadable(
        &self,
        asset_id: i64,
        user_id: i64,
    ) -> Result<(asset::Model, StorageKey), LifecycleError> {
        let asset = self.load_owned(asset_id, user_id).await?;
        if asset.upload_status != UploadStatus::Uploaded {
            return Err(LifecycleError::NotUploaded(asset_id));
        }
        let key = StorageKey::parse(asset.storage_key.as_str())?;
        Ok((asset, key))
    }

    async fn load_owned(&self, asset_id: i64, user_id: i64) -> Result<asset::Model, LifecycleError> {
        let asset = self
            .store
            .find(asset_id)
            .await?
            .ok_or(LifecycleError::NotFound(asset_id))?;
        if asset.user_id != user_id {
            return Err(LifecycleError::Forbidden(asset_id));
        }
        Ok(asset)
    }
}

/// Why a confirmation of `asset` cannot proceed, `None` while it is PENDING.
fn confirmation_rejection(asset: &asset::Model) -> Option<LifecycleError> {
    if !asset.upload_status.is_terminal() {
        return None;
    }
    Some(match asset.upload_status {
        UploadStatus::Failed => LifecycleError::IntentExpired(asset.id),
        _ => LifecycleError::AlreadyConfirmed(asset.id),
    })
}
