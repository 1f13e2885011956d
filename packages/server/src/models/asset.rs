use chrono::{DateTime, Utc};
use common::{AssetOrigin, ExtractionStatus, UploadStatus};
use serde::{Deserialize, Serialize};

use crate::entity::asset;
use crate::intake::UploadRequest;

/// Request body for announcing an upload.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct UploadUrlRequest {
    /// Note the asset is attached to. Must belong to the caller.
    #[schema(example = 10)]
    pub note_id: i64,
    /// Original file name. No path separators allowed.
    #[schema(example = "lecture-03.pdf")]
    pub file_name: String,
    /// One of `application/pdf`, `image/png`, `image/jpeg`, `image/webp`.
    #[schema(example = "application/pdf")]
    pub mime_type: String,
    /// Declared size in bytes.
    #[schema(example = 482133)]
    pub file_size: i64,
}

impl From<UploadUrlRequest> for UploadRequest {
    fn from(req: UploadUrlRequest) -> Self {
        Self {
            note_id: req.note_id,
            file_name: req.file_name,
            mime_type: req.mime_type,
            file_size: req.file_size,
        }
    }
}

/// Where and until when the client may upload.
#[derive(Serialize, utoipa::ToSchema)]
pub struct UploadUrlResponse {
    #[schema(example = 1)]
    pub asset_id: i64,
    /// Presigned PUT target.
    pub upload_url: String,
    #[schema(example = "users/1/notes/10/assets/3f0c9a8e-6f1e-4c55-9d2b-2b0f7f1c1e11_lecture-03.pdf")]
    pub storage_key: String,
    /// The intent must be confirmed before this time.
    pub expires_at: DateTime<Utc>,
}

/// State of an asset right after its upload was confirmed.
#[derive(Serialize, utoipa::ToSchema)]
pub struct UploadConfirmResponse {
    #[schema(example = 1)]
    pub asset_id: i64,
    pub upload_status: UploadStatus,
    pub extraction_status: Option<ExtractionStatus>,
}

impl From<asset::Model> for UploadConfirmResponse {
    fn from(model: asset::Model) -> Self {
        Self {
            asset_id: model.id,
            upload_status: model.upload_status,
            extraction_status: model.extraction_status,
        }
    }
}

/// Full asset details, including the extraction result once available.
#[derive(Serialize, utoipa::ToSchema)]
pub struct AssetDetailResponse {
    #[schema(example = 1)]
    pub id: i64,
    #[schema(example = 10)]
    pub note_id: i64,
    #[schema(example = "lecture-03.pdf")]
    pub file_name: String,
    #[schema(example = 482133)]
    pub file_size: i64,
    #[schema(example = "application/pdf")]
    pub mime_type: String,
    pub origin: AssetOrigin,
    pub upload_status: UploadStatus,
    /// Absent until the upload is confirmed.
    pub extraction_status: Option<ExtractionStatus>,
    /// Present only when extraction completed.
    pub extracted_content: Option<String>,
    #[schema(example = 3)]
    pub page_count: Option<i32>,
    pub extracted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<asset::Model> for AssetDetailResponse {
    fn from(model: asset::Model) -> Self {
        Self {
            id: model.id,
            note_id: model.note_id,
            file_name: model.file_name,
            file_size: model.file_size,
            mime_type: model.mime_type,
            origin: model.origin,
            upload_status: model.upload_status,
            extraction_status: model.extraction_status,
            extracted_content: model.extracted_content,
            page_count: model.page_count,
            extracted_at: model.extracted_at,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

/// Presigned download target.
#[derive(Serialize, utoipa::ToSchema)]
pub struct DownloadUrlResponse {
    pub download_url: String,
    pub expires_at: DateTime<Utc>,
}
