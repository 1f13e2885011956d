use serde::Deserialize;

/// App-level MQ configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct MqAppConfig {
    /// Whether MQ is enabled. Default: true.
    /// When disabled, confirmed assets cannot be sent for extraction and are
    /// resolved as failed.
    #[serde(default = "default_mq_enabled")]
    pub enabled: bool,
    /// Redis connection URL. Default: "redis://localhost:6379".
    #[serde(default = "default_mq_url")]
    pub url: String,
    /// Connection pool size. Default: 5.
    #[serde(default = "default_mq_pool_size")]
    pub pool_size: u8,
    /// Queue for OCR jobs (server publishes, OCR worker consumes). Default: "ocr_jobs".
    #[serde(default = "default_mq_queue_name")]
    pub queue_name: String,
    /// Queue for OCR results (OCR worker publishes, server consumes). Default: "ocr_results".
    #[serde(default = "default_mq_result_queue_name")]
    pub result_queue_name: String,
    /// Queue for dead-lettered OCR jobs. Default: "ocr_dlq".
    #[serde(default = "default_mq_dlq_queue_name")]
    pub dlq_queue_name: String,
}

fn default_mq_enabled() -> bool {
    true
}
fn default_mq_url() -> String {
    "redis://localhost:6379".into()
}
fn default_mq_pool_size() -> u8 {
    5
}
fn default_mq_queue_name() -> String {
    "ocr_jobs".into()
}
fn default_mq_result_queue_name() -> String {
    "ocr_results".into()
}
fn default_mq_dlq_queue_name() -> String {
    "ocr_dlq".into()
}

impl Default for MqAppConfig {
    fn default() -> Self {
        Self {
            enabled: default_mq_enabled(),
            url: default_mq_url(),
            pool_size: default_mq_pool_size(),
            queue_name: default_mq_queue_name(),
            result_queue_name: default_mq_result_queue_name(),
            dlq_queue_name: default_mq_dlq_queue_name(),
        }
    }
}
