use serde::{Deserialize, Serialize};

use crate::mq::Message;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OcrErrorInfo {
    /// Machine-readable error code (e.g., "UNREADABLE_DOCUMENT", "MODEL_ERROR").
    pub code: String,
    /// Human-readable error description.
    pub message: String,
}

impl OcrErrorInfo {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// What the worker produced for a job.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OcrOutcome {
    Completed {
        /// Extracted content, opaque to the server.
        content: String,
        /// Number of pages the worker processed.
        page_count: Option<i32>,
    },
    Failed { error: OcrErrorInfo },
}

/// Result published by the OCR worker on the result queue.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OcrResult {
    /// Original job ID.
    pub job_id: String,
    /// Asset the job was extracting.
    pub asset_id: i64,
    pub outcome: OcrOutcome,
}

impl OcrResult {
    pub fn completed(
        job_id: impl Into<String>,
        asset_id: i64,
        content: impl Into<String>,
        page_count: Option<i32>,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            asset_id,
            outcome: OcrOutcome::Completed {
                content: content.into(),
                page_count,
            },
        }
    }

    pub fn failed(job_id: impl Into<String>, asset_id: i64, error: OcrErrorInfo) -> Self {
        Self {
            job_id: job_id.into(),
            asset_id,
            outcome: OcrOutcome::Failed { error },
        }
    }
}

impl Message for OcrResult {
    fn message_type() -> &'static str {
        "ocr_result"
    }

    fn message_id(&self) -> &str {
        &self.job_id
    }
}
