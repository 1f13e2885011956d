#[cfg(feature = "sea-orm")]
use sea_orm::prelude::StringLen;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Upload state of an asset's binary content.
///
/// Moves `Pending -> Uploaded` on confirmation or `Pending -> Failed` when the
/// upload intent expires. `Uploaded` and `Failed` never change again.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[cfg_attr(
    feature = "sea-orm",
    derive(sea_orm::DeriveActiveEnum, sea_orm::EnumIter),
    sea_orm(rs_type = "String", db_type = "String(StringLen::None)")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UploadStatus {
    /// Intent issued, waiting for the client to upload and confirm.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "PENDING"))]
    Pending,
    /// Blob verified and confirmation committed.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "UPLOADED"))]
    Uploaded,
    /// Intent expired before a confirmation arrived.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "FAILED"))]
    Failed,
}

impl UploadStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    pub const ALL: &'static [UploadStatus] = &[Self::Pending, Self::Uploaded, Self::Failed];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Uploaded => "UPLOADED",
            Self::Failed => "FAILED",
        }
    }
}

impl fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Default for UploadStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl FromStr for UploadStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "UPLOADED" => Ok(Self::Uploaded),
            "FAILED" => Ok(Self::Failed),
            _ => Err(ParseStatusError::new(
                s,
                UploadStatus::ALL.iter().map(|s| s.as_str()),
            )),
        }
    }
}

/// Text-extraction (OCR) state of an uploaded asset.
///
/// Only meaningful once the upload is confirmed. `Completed` and `Failed`
/// are terminal; the only writer allowed to leave `Processing` is the first
/// one to observe it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[cfg_attr(
    feature = "sea-orm",
    derive(sea_orm::DeriveActiveEnum, sea_orm::EnumIter),
    sea_orm(rs_type = "String", db_type = "String(StringLen::None)")
)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionStatus {
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "pending"))]
    Pending,
    /// Dispatched to the OCR worker, waiting for a result.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "processing"))]
    Processing,
    /// Extracted content stored on the asset.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "completed"))]
    Completed,
    /// Worker failure, dispatch failure, or reconciliation timeout.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "failed"))]
    Failed,
}

impl ExtractionStatus {
    pub const ALL: &'static [ExtractionStatus] = &[
        Self::Pending,
        Self::Processing,
        Self::Completed,
        Self::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for ExtractionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExtractionStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            _ => Err(ParseStatusError::new(
                s,
                ExtractionStatus::ALL.iter().map(|s| s.as_str()),
            )),
        }
    }
}

/// Where an asset came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[cfg_attr(
    feature = "sea-orm",
    derive(sea_orm::DeriveActiveEnum, sea_orm::EnumIter),
    sea_orm(rs_type = "String", db_type = "String(StringLen::None)")
)]
#[serde(rename_all = "snake_case")]
pub enum AssetOrigin {
    /// Uploaded by the user through an upload intent.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "upload"))]
    Upload,
    /// Produced by the system (e.g. AI-generated material attached to a note).
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "generated"))]
    Generated,
}

impl AssetOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Upload => "upload",
            Self::Generated => "generated",
        }
    }
}

impl fmt::Display for AssetOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Default for AssetOrigin {
    fn default() -> Self {
        Self::Upload
    }
}

/// Error when parsing an invalid status string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseStatusError {
    invalid: String,
    valid: String,
}

impl ParseStatusError {
    fn new<'a>(invalid: &str, valid: impl Iterator<Item = &'a str>) -> Self {
        Self {
            invalid: invalid.to_string(),
            valid: valid.collect::<Vec<_>>().join(", "),
        }
    }
}

impl fmt::Display for ParseStatusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Invalid status '{}'. Valid values: {}",
            self.invalid, self.valid
        )
    }
}

impl std::error::Error for ParseStatusError {}
