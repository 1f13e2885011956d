use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Extraction request committed together with an upload confirmation and
/// not yet acknowledged by the OCR queue.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "ocr_outbox")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub asset_id: i64,

    #[sea_orm(unique)]
    pub job_id: String,

    pub storage_key: String,
    pub mime_type: String,

    /// Times the row has been handed to the dispatch pool.
    pub attempts: i32,

    #[sea_orm(indexed)]
    pub enqueued_at: DateTimeUtc,

    pub created_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
