use std::sync::Arc;

use common::{AssetOrigin, UploadStatus};
use thiserror::Error;

use crate::config::AssetConfig;
use crate::lifecycle::NewUploadIntent;
use crate::notes::NoteAccess;
use crate::store::{AssetStore, StoreError};
use crate::utils::filename::validate_file_name;

/// MIME types the OCR worker can read.
pub const ALLOWED_MIME_TYPES: &[&str] = &["application/pdf", "image/png", "image/jpeg", "image/webp"];

#[derive(Debug, Error)]
pub enum IntakeError {
    #[error("unsupported MIME type '{0}'")]
    UnsupportedMimeType(String),

    #[error("file extension does not match MIME type '{0}'")]
    MimeMismatch(String),

    #[error("{0}")]
    InvalidFileName(&'static str),

    #[error("file size must be between 1 and {limit} bytes, got {size}")]
    InvalidSize { size: i64, limit: i64 },

    #[error("note {0} not found")]
    NoteNotFound(i64),

    #[error("note {0} belongs to another user")]
    NotOwner(i64),

    #[error("note storage quota exceeded ({used} + {requested} > {limit} bytes)")]
    QuotaExceeded {
        used: i64,
        requested: i64,
        limit: i64,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub note_id: i64,
    pub file_name: String,
    pub mime_type: String,
    pub file_size: i64,
}

/// Checks run before an upload intent is created: type, name, size,
/// note ownership and per-note quota.
pub struct UploadIntake {
    store: Arc<dyn AssetStore>,
    notes: Arc<dyn NoteAccess>,
    limits: AssetConfig,
}

impl UploadIntake {
    pub fn new(store: Arc<dyn AssetStore>, notes: Arc<dyn NoteAccess>, limits: AssetConfig) -> Self {
        Self {
            store,
            notes,
            limits,
        }
    }

    pub async fn check(
        &self,
        user_id: i64,
        request: UploadRequest,
    ) -> Result<NewUploadIntent, IntakeError> {
        let mime_type = request.mime_type.trim().to_ascii_lowercase();
        if !ALLOWED_MIME_TYPES.contains(&mime_type.as_str()) {
            return Err(IntakeError::UnsupportedMimeType(request.mime_type));
        }

        let file_name = validate_file_name(&request.file_name)
            .map_err(|e| IntakeError::InvalidFileName(e.message()))?;

        let guesses = mime_guess::from_path(file_name);
        if !guesses.is_empty() && !guesses.iter().any(|m| m.essence_str() == mime_type) {
            return Err(IntakeError::MimeMismatch(mime_type));
        }

        if request.file_size < 1 || request.file_size > self.limits.max_file_size {
            return Err(IntakeError::InvalidSize {
                size: request.file_size,
                limit: self.limits.max_file_size,
            });
        }

        match self.notes.owner_of(request.note_id).await? {
            None => return Err(IntakeError::NoteNotFound(request.note_id)),
            Some(owner) if owner != user_id => return Err(IntakeError::NotOwner(request.note_id)),
            Some(_) => {}
        }

        let used = self
            .store
            .declared_usage(
                request.note_id,
                &[UploadStatus::Pending, UploadStatus::Uploaded],
            )
            .await?;
        if used.saturating_add(request.file_size) > self.limits.note_storage_limit {
            return Err(IntakeError::QuotaExceeded {
                used,
                requested: request.file_size,
                limit: self.limits.note_storage_limit,
            });
        }

        Ok(NewUploadIntent {
            user_id,
            note_id: request.note_id,
            file_name: file_name.to_string(),
            mime_type,
            file_size: request.file_size,
            origin: AssetOrigin::Upload,
        })
    }
}
