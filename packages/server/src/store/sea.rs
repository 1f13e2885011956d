use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::ocr_job::OcrJob;
use common::{ExtractionStatus, UploadStatus};
use sea_orm::sea_query::{Expr, ExprTrait, LockBehavior, LockType};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use tracing::debug;

use super::{AssetStore, CasOutcome, ExtractionResolution, NewAsset, StoreError};
use crate::entity::{asset, ocr_outbox};

/// [`AssetStore`] on PostgreSQL through SeaORM.
#[derive(Clone)]
pub struct SeaOrmAssetStore {
    db: DatabaseConnection,
}

impl SeaOrmAssetStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn vanished(id: i64) -> DbErr {
    DbErr::RecordNotFound(format!("asset {id} vanished inside its own transaction"))
}

#[async_trait]
impl AssetStore for SeaOrmAssetStore {
    async fn insert(
        &self,
        new: NewAsset,
        now: DateTime<Utc>,
    ) -> Result<asset::Model, StoreError> {
        let model = asset::ActiveModel {
            user_id: Set(new.user_id),
            note_id: Set(new.note_id),
            file_name: Set(new.file_name),
            file_size: Set(new.file_size),
            mime_type: Set(new.mime_type),
            storage_key: Set(new.storage_key.into()),
            thumbnail_key: Set(new.thumbnail_key.map(Into::into)),
            origin: Set(new.origin),
            upload_status: Set(UploadStatus::Pending),
            upload_expires_at: Set(new.upload_expires_at),
            extraction_status: Set(None),
            extracted_content: Set(None),
            page_count: Set(None),
            extracted_at: Set(None),
            version: Set(0),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;
        Ok(model)
    }

    async fn find(&self, id: i64) -> Result<Option<asset::Model>, StoreError> {
        Ok(asset::Entity::find_by_id(id).one(&self.db).await?)
    }

    async fn mark_uploaded(
        &self,
        id: i64,
        expected_version: i64,
        job: &OcrJob,
        now: DateTime<Utc>,
    ) -> Result<CasOutcome, StoreError> {
        let txn = self.db.begin().await?;

        let result = asset::Entity::update_many()
            .col_expr(
                asset::Column::UploadStatus,
                Expr::value(UploadStatus::Uploaded),
            )
            .col_expr(
                asset::Column::ExtractionStatus,
                Expr::value(ExtractionStatus::Processing),
            )
            .col_expr(asset::Column::Version, Expr::value(expected_version + 1))
            .col_expr(asset::Column::UpdatedAt, Expr::value(now))
            .filter(asset::Column::Id.eq(id))
            .filter(asset::Column::Version.eq(expected_version))
            .filter(asset::Column::UploadStatus.eq(UploadStatus::Pending))
            .exec(&txn)
            .await?;

        if result.rows_affected != 1 {
            txn.rollback().await?;
            debug!(asset_id = id, expected_version, "Confirmation CAS matched no row");
            return Ok(CasOutcome::Conflict);
        }

        ocr_outbox::Entity::insert(ocr_outbox::ActiveModel {
            asset_id: Set(id),
            job_id: Set(job.job_id.clone()),
            storage_key: Set(job.storage_key.clone()),
            mime_type: Set(job.mime_type.clone()),
            attempts: Set(1),
            enqueued_at: Set(now),
            created_at: Set(now),
        })
        .exec_without_returning(&txn)
        .await?;

        let updated = asset::Entity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| vanished(id))?;

        txn.commit().await?;
        Ok(CasOutcome::Applied(updated))
    }

    async fn resolve_extraction(
        &self,
        id: i64,
        resolution: ExtractionResolution,
        now: DateTime<Utc>,
    ) -> Result<Option<asset::Model>, StoreError> {
        let txn = self.db.begin().await?;

        let mut update = asset::Entity::update_many()
            .col_expr(asset::Column::Version, Expr::col(asset::Column::Version).add(1))
            .col_expr(asset::Column::UpdatedAt, Expr::value(now));
        update = match resolution {
            ExtractionResolution::Completed {
                content,
                page_count,
            } => update
                .col_expr(
                    asset::Column::ExtractionStatus,
                    Expr::value(ExtractionStatus::Completed),
                )
                .col_expr(asset::Column::ExtractedContent, Expr::value(content))
                .col_expr(asset::Column::PageCount, Expr::value(page_count))
                .col_expr(asset::Column::ExtractedAt, Expr::value(now)),
            ExtractionResolution::Failed => update.col_expr(
                asset::Column::ExtractionStatus,
                Expr::value(ExtractionStatus::Failed),
            ),
        };

        let result = update
            .filter(asset::Column::Id.eq(id))
            .filter(asset::Column::ExtractionStatus.eq(ExtractionStatus::Processing))
            .exec(&txn)
            .await?;

        if result.rows_affected != 1 {
            txn.rollback().await?;
            return Ok(None);
        }

        ocr_outbox::Entity::delete_by_id(id).exec(&txn).await?;

        let updated = asset::Entity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| vanished(id))?;

        txn.commit().await?;
        Ok(Some(updated))
    }

    async fn find_stuck_processing(
        &self,
        updated_before: DateTime<Utc>,
        limit: u64,
    ) -> Result<Vec<i64>, StoreError> {
        let ids = asset::Entity::find()
            .select_only()
            .column(asset::Column::Id)
            .filter(asset::Column::ExtractionStatus.eq(ExtractionStatus::Processing))
            .filter(asset::Column::UpdatedAt.lt(updated_before))
            .order_by_asc(asset::Column::UpdatedAt)
            .limit(limit)
            .into_tuple()
            .all(&self.db)
            .await?;
        Ok(ids)
    }

    async fn find_expired_intents(
        &self,
        expired_before: DateTime<Utc>,
        limit: u64,
    ) -> Result<Vec<i64>, StoreError> {
        let ids = asset::Entity::find()
            .select_only()
            .column(asset::Column::Id)
            .filter(asset::Column::UploadStatus.eq(UploadStatus::Pending))
            .filter(asset::Column::UploadExpiresAt.lt(expired_before))
            .order_by_asc(asset::Column::UploadExpiresAt)
            .limit(limit)
            .into_tuple()
            .all(&self.db)
            .await?;
        Ok(ids)
    }

    async fn expire_intent(
        &self,
        id: i64,
        expired_before: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let result = asset::Entity::update_many()
            .col_expr(
                asset::Column::UploadStatus,
                Expr::value(UploadStatus::Failed),
            )
            .col_expr(asset::Column::Version, Expr::col(asset::Column::Version).add(1))
            .col_expr(asset::Column::UpdatedAt, Expr::value(now))
            .filter(asset::Column::Id.eq(id))
            .filter(asset::Column::UploadStatus.eq(UploadStatus::Pending))
            .filter(asset::Column::UploadExpiresAt.lt(expired_before))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected == 1)
    }

    async fn delete(&self, id: i64) -> Result<Option<asset::Model>, StoreError> {
        let txn = self.db.begin().await?;

        let Some(existing) = asset::Entity::find_by_id(id)
            .lock(LockType::Update)
            .one(&txn)
            .await?
        else {
            txn.rollback().await?;
            return Ok(None);
        };

        ocr_outbox::Entity::delete_by_id(id).exec(&txn).await?;
        asset::Entity::delete_by_id(id).exec(&txn).await?;

        txn.commit().await?;
        Ok(Some(existing))
    }

    async fn declared_usage(
        &self,
        note_id: i64,
        statuses: &[UploadStatus],
    ) -> Result<i64, StoreError> {
        // SUM(bigint) is NUMERIC on PostgreSQL; add up in Rust instead.
        let sizes: Vec<i64> = asset::Entity::find()
            .select_only()
            .column(asset::Column::FileSize)
            .filter(asset::Column::NoteId.eq(note_id))
            .filter(asset::Column::UploadStatus.is_in(statuses.iter().copied()))
            .into_tuple()
            .all(&self.db)
            .await?;
        Ok(sizes.into_iter().sum())
    }

    async fn claim_stale_dispatches(
        &self,
        enqueued_before: DateTime<Utc>,
        now: DateTime<Utc>,
        limit: u64,
    ) -> Result<Vec<OcrJob>, StoreError> {
        let txn = self.db.begin().await?;

        let rows = ocr_outbox::Entity::find()
            .filter(ocr_outbox::Column::EnqueuedAt.lt(enqueued_before))
            .order_by_asc(ocr_outbox::Column::EnqueuedAt)
            .limit(limit)
            .lock_with_behavior(LockType::Update, LockBehavior::SkipLocked)
            .all(&txn)
            .await?;

        if rows.is_empty() {
            txn.commit().await?;
            return Ok(Vec::new());
        }

        let ids: Vec<i64> = rows.iter().map(|row| row.asset_id).collect();
        ocr_outbox::Entity::update_many()
            .col_expr(ocr_outbox::Column::EnqueuedAt, Expr::value(now))
            .col_expr(
                ocr_outbox::Column::Attempts,
                Expr::col(ocr_outbox::Column::Attempts).add(1),
            )
            .filter(ocr_outbox::Column::AssetId.is_in(ids))
            .exec(&txn)
            .await?;

        txn.commit().await?;

        Ok(rows
            .into_iter()
            .map(|row| OcrJob {
                job_id: row.job_id,
                asset_id: row.asset_id,
                storage_key: row.storage_key,
                mime_type: row.mime_type,
            })
            .collect())
    }

    async fn clear_dispatch(&self, asset_id: i64, job_id: &str) -> Result<(), StoreError> {
        ocr_outbox::Entity::delete_many()
            .filter(ocr_outbox::Column::AssetId.eq(asset_id))
            .filter(ocr_outbox::Column::JobId.eq(job_id))
            .exec(&self.db)
            .await?;
        Ok(())
    }
}
