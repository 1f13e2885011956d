use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::mq::Message;

/// An extraction request sent to the OCR worker queue.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OcrJob {
    /// Job identifier (UUID), stable across redelivery of the same dispatch.
    pub job_id: String,
    /// Asset whose content should be extracted.
    pub asset_id: i64,
    /// Blob storage key of the uploaded file.
    pub storage_key: String,
    /// Declared MIME type (e.g. "application/pdf", "image/png").
    pub mime_type: String,
}

impl OcrJob {
    /// Create a new OCR job with a generated UUID.
    pub fn new(asset_id: i64, storage_key: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            job_id: Uuid::new_v4().to_string(),
            asset_id,
            storage_key: storage_key.into(),
            mime_type: mime_type.into(),
        }
    }
}

impl Message for OcrJob {
    fn message_type() -> &'static str {
        "ocr_job"
    }

    fn message_id(&self) -> &str {
        &self.job_id
    }
}
