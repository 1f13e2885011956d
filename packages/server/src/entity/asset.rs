use common::{AssetOrigin, ExtractionStatus, UploadStatus};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A tracked file and its upload and extraction lifecycles.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "asset")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    #[sea_orm(indexed)]
    pub user_id: i64,

    #[sea_orm(indexed)]
    pub note_id: i64,

    pub file_name: String,
    /// Declared size in bytes.
    pub file_size: i64,
    pub mime_type: String,

    #[sea_orm(unique)]
    pub storage_key: String,
    pub thumbnail_key: Option<String>,

    pub origin: AssetOrigin,

    #[sea_orm(indexed)]
    pub upload_status: UploadStatus,
    pub upload_expires_at: Option<DateTimeUtc>,

    /// NULL until the upload is confirmed.
    #[sea_orm(indexed)]
    pub extraction_status: Option<ExtractionStatus>,
    /// Set iff `extraction_status` is `completed`.
    #[sea_orm(column_type = "Text", nullable)]
    pub extracted_content: Option<String>,
    pub page_count: Option<i32>,
    pub extracted_at: Option<DateTimeUtc>,

    /// Bumped by every state transition; confirmation compares against it.
    pub version: i64,

    pub created_at: DateTimeUtc,
    /// Time of the last state transition.
    #[sea_orm(indexed)]
    pub updated_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
