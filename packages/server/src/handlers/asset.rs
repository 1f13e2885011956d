use std::time::Duration;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::Utc;
use tracing::instrument;

use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::extractors::json::AppJson;
use crate::models::asset::*;
use crate::state::AppState;

#[utoipa::path(
    post,
    path = "/upload-url",
    tag = "Assets",
    operation_id = "createUploadUrl",
    summary = "Announce an upload",
    description = "Validates the declared file against the type, name, size and per-note quota \
        rules, creates a PENDING asset and returns a presigned URL to PUT the file to. \
        The upload must be confirmed before `expires_at`.",
    request_body = UploadUrlRequest,
    responses(
        (status = 201, description = "Upload intent created", body = UploadUrlResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR, QUOTA_EXCEEDED)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Note belongs to another user (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Note not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(user_id = auth_user.user_id, note_id = payload.note_id))]
pub async fn create_upload_url(
    auth_user: AuthUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<UploadUrlRequest>,
) -> Result<(StatusCode, Json<UploadUrlResponse>), AppError> {
    let intent = state
        .intake
        .check(auth_user.user_id, payload.into())
        .await?;

    let now = Utc::now();
    let planned = state.lifecycle.plan_upload_intent(intent, now)?;
    let ttl = (planned.expires_at - now).to_std().unwrap_or(Duration::ZERO);
    let upload_url = state
        .presigner
        .upload_target(&planned.storage_key, &planned.intent.mime_type, ttl)
        .await?;

    let created = state.lifecycle.commit_upload_intent(planned).await?;

    Ok((
        StatusCode::CREATED,
        Json(UploadUrlResponse {
            asset_id: created.asset.id,
            upload_url,
            storage_key: created.storage_key.into(),
            expires_at: created.expires_at,
        }),
    ))
}

#[utoipa::path(
    post,
    path = "/{id}/confirm",
    tag = "Assets",
    operation_id = "confirmUpload",
    summary = "Confirm a finished upload",
    description = "Marks the asset UPLOADED and starts text extraction. A second confirmation \
        always fails with ALREADY_CONFIRMED. Confirming before the file is stored fails with \
        BLOB_NOT_UPLOADED and may be retried until the intent expires.",
    params(("id" = i64, Path, description = "Asset ID")),
    responses(
        (status = 200, description = "Upload confirmed", body = UploadConfirmResponse),
        (status = 400, description = "File not uploaded yet (BLOB_NOT_UPLOADED)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Asset not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Already confirmed (ALREADY_CONFIRMED)", body = ErrorBody),
        (status = 410, description = "Upload intent expired (INTENT_EXPIRED)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(user_id = auth_user.user_id, asset_id = %id))]
pub async fn confirm_upload(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<UploadConfirmResponse>, AppError> {
    let asset = state
        .lifecycle
        .confirm_upload(id, auth_user.user_id)
        .await?;
    Ok(Json(asset.into()))
}

#[utoipa::path(
    get,
    path = "/{id}",
    tag = "Assets",
    operation_id = "getAsset",
    summary = "Get asset details",
    description = "Returns the asset with its upload and extraction state. Poll this to observe \
        extraction finishing.",
    params(("id" = i64, Path, description = "Asset ID")),
    responses(
        (status = 200, description = "Asset details", body = AssetDetailResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Asset not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(user_id = auth_user.user_id, asset_id = %id))]
pub async fn get_asset(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<AssetDetailResponse>, AppError> {
    let asset = state.lifecycle.get_asset(id, auth_user.user_id).await?;
    Ok(Json(asset.into()))
}

#[utoipa::path(
    get,
    path = "/{id}/download-url",
    tag = "Assets",
    operation_id = "getDownloadUrl",
    summary = "Get a download URL",
    description = "Returns a presigned URL serving the file as an attachment. Only available \
        after the upload was confirmed.",
    params(("id" = i64, Path, description = "Asset ID")),
    responses(
        (status = 200, description = "Download URL", body = DownloadUrlResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Asset not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Upload not confirmed (NOT_UPLOADED)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(user_id = auth_user.user_id, asset_id = %id))]
pub async fn get_download_url(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<DownloadUrlResponse>, AppError> {
    let (asset, key) = state
        .lifecycle
        .get_downloadable(id, auth_user.user_id)
        .await?;

    let ttl = state
        .config
        .asset
        .download_ttl()
        .map_err(|e| AppError::Internal(e.to_string()))?;
    let download_url = state
        .presigner
        .download_target(
            &key,
            &asset.file_name,
            Duration::from_secs(state.config.asset.download_ttl_secs),
        )
        .await?;

    Ok(Json(DownloadUrlResponse {
        download_url,
        expires_at: Utc::now() + ttl,
    }))
}

#[utoipa::path(
    delete,
    path = "/{id}",
    tag = "Assets",
    operation_id = "deleteAsset",
    summary = "Delete an asset",
    description = "Removes the asset record. The stored file and thumbnail are removed in the \
        background; a failure there does not fail the request.",
    params(("id" = i64, Path, description = "Asset ID")),
    responses(
        (status = 204, description = "Asset deleted"),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Asset not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(user_id = auth_user.user_id, asset_id = %id))]
pub async fn delete_asset(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    state.lifecycle.delete_asset(id, auth_user.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
