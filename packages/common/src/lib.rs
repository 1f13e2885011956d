pub mod asset_status;
pub mod config;
pub mod dlq;
pub mod mq;
pub mod ocr_job;
pub mod ocr_result;
pub mod retry;
pub mod storage;
pub mod worker;

pub use asset_status::{AssetOrigin, ExtractionStatus, UploadStatus};
pub use config::MqAppConfig;
pub use dlq::{DlqEnvelope, DlqErrorCode};
