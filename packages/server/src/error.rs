use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use common::storage::StorageError;
use serde::Serialize;

use crate::intake::IntakeError;
use crate::lifecycle::LifecycleError;

/// Structured error response returned by all endpoints on failure.
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorBody {
    /// Machine-readable error code. One of: `VALIDATION_ERROR`, `TOKEN_MISSING`,
    /// `TOKEN_INVALID`, `PERMISSION_DENIED`, `NOT_FOUND`, `ALREADY_CONFIRMED`,
    /// `BLOB_NOT_UPLOADED`, `INTENT_EXPIRED`, `NOT_UPLOADED`, `QUOTA_EXCEEDED`,
    /// `INTERNAL_ERROR`.
    #[schema(example = "VALIDATION_ERROR")]
    pub code: &'static str,
    /// Human-readable error description.
    #[schema(example = "File name must be 2-255 characters")]
    pub message: String,
}

/// Application-level error type.
#[derive(Debug)]
pub enum AppError {
    Validation(String),
    TokenMissing,
    TokenInvalid,
    PermissionDenied,
    NotFound(String),
    AlreadyConfirmed,
    /// The client confirmed before its upload landed. Retryable.
    BlobNotUploaded,
    IntentExpired,
    NotUploaded,
    QuotaExceeded(String),
    Internal(String),
}

impl AppError {
    fn status_and_body(self) -> (StatusCode, ErrorBody) {
        match self {
            AppError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    code: "VALIDATION_ERROR",
                    message: msg,
                },
            ),
            AppError::TokenMissing => (
                StatusCode::UNAUTHORIZED,
                ErrorBody {
                    code: "TOKEN_MISSING",
                    message: "Authentication required".into(),
                },
            ),
            AppError::TokenInvalid => (
                StatusCode::UNAUTHORIZED,
                ErrorBody {
                    code: "TOKEN_INVALID",
                    message: "Invalid or expired token".into(),
                },
            ),
            AppError::PermissionDenied => (
                StatusCode::FORBIDDEN,
                ErrorBody {
                    code: "PERMISSION_DENIED",
                    message: "Insufficient permissions".into(),
                },
            ),
            AppError::NotFound(msg) => (
                StatusCode::NOT_FOUND,
                ErrorBody {
                    code: "NOT_FOUND",
                    message: msg,
                },
            ),
            AppError::AlreadyConfirmed => (
                StatusCode::CONFLICT,
                ErrorBody {
                    code: "ALREADY_CONFIRMED",
                    message: "Upload has already been confirmed".into(),
                },
            ),
            AppError::BlobNotUploaded => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    code: "BLOB_NOT_UPLOADED",
                    message: "File has not been uploaded yet".into(),
                },
            ),
            AppError::IntentExpired => (
                StatusCode::GONE,
                ErrorBody {
                    code: "INTENT_EXPIRED",
                    message: "Upload URL has expired, request a new one".into(),
                },
            ),
            AppError::NotUploaded => (
                StatusCode::CONFLICT,
                ErrorBody {
                    code: "NOT_UPLOADED",
                    message: "Asset upload has not been confirmed".into(),
                },
            ),
            AppError::QuotaExceeded(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    code: "QUOTA_EXCEEDED",
                    message: msg,
                },
            ),
            AppError::Internal(detail) => {
                tracing::error!("Internal error: {}", detail);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody {
                        code: "INTERNAL_ERROR",
                        message: "An unexpected error occurred".into(),
                    },
                )
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = self.status_and_body();
        (status, Json(body)).into_response()
    }
}

impl From<LifecycleError> for AppError {
    fn from(err: LifecycleError) -> Self {
        match err {
            LifecycleError::NotFound(_) => AppError::NotFound("Asset not found".into()),
            LifecycleError::Forbidden(_) => AppError::PermissionDenied,
            LifecycleError::AlreadyConfirmed(_) => AppError::AlreadyConfirmed,
            LifecycleError::BlobNotUploaded(_) => AppError::BlobNotUploaded,
            LifecycleError::IntentExpired(_) => AppError::IntentExpired,
            LifecycleError::NotUploaded(_) => AppError::NotUploaded,
            LifecycleError::Blob(StorageError::InvalidKey(msg)) => AppError::Validation(msg),
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl From<IntakeError> for AppError {
    fn from(err: IntakeError) -> Self {
        match err {
            IntakeError::NoteNotFound(_) => AppError::NotFound("Note not found".into()),
            IntakeError::NotOwner(_) => AppError::PermissionDenied,
            e @ IntakeError::QuotaExceeded { .. } => AppError::QuotaExceeded(e.to_string()),
            IntakeError::Store(e) => AppError::Internal(e.to_string()),
            other => AppError::Validation(other.to_string()),
        }
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::InvalidKey(msg) => AppError::Validation(msg),
            other => AppError::Internal(other.to_string()),
        }
    }
}
