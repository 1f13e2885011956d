use serde::{Deserialize, Serialize};

use crate::retry::RetryAttempt;

/// Error codes for dead-lettered OCR jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DlqErrorCode {
    /// All retry attempts exhausted.
    MaxRetriesExceeded,
    /// Failed to deserialize message payload.
    DeserializationError,
    /// The OCR worker could not reach the blob or the model backend.
    WorkerUnavailable,
}

impl DlqErrorCode {
    /// Returns the string representation of the error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MaxRetriesExceeded => "MAX_RETRIES_EXCEEDED",
            Self::DeserializationError => "DESERIALIZATION_ERROR",
            Self::WorkerUnavailable => "WORKER_UNAVAILABLE",
        }
    }
}

impl std::fmt::Display for DlqErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Envelope the transport publishes when an OCR job could not be processed.
///
/// Receiving one is the asynchronous failure signal for the job's asset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DlqEnvelope {
    /// Original message ID (job_id).
    pub message_id: String,
    /// Asset the job was extracting.
    ///
    /// `None` when the asset cannot be determined
    /// (e.g., deserialization failed before extracting asset_id).
    pub asset_id: Option<i64>,
    /// Full serialized message payload.
    pub payload: serde_json::Value,
    /// Machine-readable error code.
    pub error_code: DlqErrorCode,
    /// Human-readable error message.
    pub error_message: String,
    /// History of retry attempts before reaching DLQ.
    #[serde(default)]
    pub retry_history: Vec<RetryAttempt>,
}
