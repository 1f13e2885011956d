use std::path::PathBuf;

use common::MqAppConfig;
use common::retry::RetryPolicy;
use common::storage::s3::S3Settings;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct CorsConfig {
    pub allow_origins: Vec<String>,
    pub max_age: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors: CorsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    Filesystem,
    S3,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Root directory of the filesystem backend.
    pub path: PathBuf,
    /// Required when `backend = "s3"`.
    #[serde(default)]
    pub s3: Option<S3Settings>,
    /// Upper bound enforced by the backend on direct writes.
    pub max_blob_size: u64,
}

/// Limits applied to upload intents.
#[derive(Debug, Deserialize, Clone)]
pub struct AssetConfig {
    /// Lifetime of an upload intent and its presigned PUT URL.
    #[serde(default = "default_intent_ttl_secs")]
    pub intent_ttl_secs: u64,
    /// Extra time past expiry before a PENDING intent is marked FAILED.
    #[serde(default = "default_intent_grace_secs")]
    pub intent_grace_secs: u64,
    #[serde(default = "default_download_ttl_secs")]
    pub download_ttl_secs: u64,
    #[serde(default = "default_max_file_size")]
    pub max_file_size: i64,
    /// Sum of declared sizes of PENDING and UPLOADED assets per note.
    #[serde(default = "default_note_storage_limit")]
    pub note_storage_limit: i64,
}

fn default_intent_ttl_secs() -> u64 {
    15 * 60
}

fn default_intent_grace_secs() -> u64 {
    5 * 60
}

fn default_download_ttl_secs() -> u64 {
    15 * 60
}

fn default_max_file_size() -> i64 {
    30 * 1024 * 1024
}

fn default_note_storage_limit() -> i64 {
    512 * 1024 * 1024
}

impl AssetConfig {
    pub fn intent_ttl(&self) -> Result<chrono::Duration, ConfigError> {
        seconds("asset.intent_ttl_secs", self.intent_ttl_secs)
    }

    pub fn intent_grace(&self) -> Result<chrono::Duration, ConfigError> {
        seconds("asset.intent_grace_secs", self.intent_grace_secs)
    }

    pub fn download_ttl(&self) -> Result<chrono::Duration, ConfigError> {
        seconds("asset.download_ttl_secs", self.download_ttl_secs)
    }
}

/// `secs` as a duration, or a config error naming `key` when chrono cannot
/// represent it.
fn seconds(key: &str, secs: u64) -> Result<chrono::Duration, ConfigError> {
    i64::try_from(secs)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .ok_or_else(|| ConfigError::Message(format!("{key} is out of range: {secs}")))
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            intent_ttl_secs: default_intent_ttl_secs(),
            intent_grace_secs: default_intent_grace_secs(),
            download_ttl_secs: default_download_ttl_secs(),
            max_file_size: default_max_file_size(),
            note_storage_limit: default_note_storage_limit(),
        }
    }
}

/// OCR dispatch pool, retry and reconciliation settings.
#[derive(Debug, Deserialize, Clone)]
pub struct OcrConfig {
    #[serde(default = "default_dispatch_concurrency")]
    pub dispatch_concurrency: usize,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "default_max_dispatch_retries")]
    pub max_dispatch_retries: u8,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Extractions still processing after this long are failed by the sweep.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    /// Outbox rows not acknowledged within this window are handed out again.
    #[serde(default = "default_redrive_after_secs")]
    pub redrive_after_secs: u64,
    #[serde(default = "default_sweep_batch_size")]
    pub sweep_batch_size: u64,
}

fn default_dispatch_concurrency() -> usize {
    2
}

fn default_queue_capacity() -> usize {
    100
}

fn default_max_dispatch_retries() -> u8 {
    2
}

fn default_base_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    10_000
}

fn default_timeout_secs() -> u64 {
    30 * 60
}

fn default_sweep_interval_secs() -> u64 {
    5 * 60
}

fn default_redrive_after_secs() -> u64 {
    120
}

fn default_sweep_batch_size() -> u64 {
    500
}

impl OcrConfig {
    pub fn timeout(&self) -> Result<chrono::Duration, ConfigError> {
        seconds("ocr.timeout_secs", self.timeout_secs)
    }

    pub fn redrive_after(&self) -> Result<chrono::Duration, ConfigError> {
        seconds("ocr.redrive_after_secs", self.redrive_after_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_dispatch_retries,
            self.base_delay_ms,
            self.max_delay_ms,
        )
    }
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            dispatch_concurrency: default_dispatch_concurrency(),
            queue_capacity: default_queue_capacity(),
            max_dispatch_retries: default_max_dispatch_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            timeout_secs: default_timeout_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
            redrive_after_secs: default_redrive_after_secs(),
            sweep_batch_size: default_sweep_batch_size(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub mq: MqAppConfig,
    #[serde(default)]
    pub asset: AssetConfig,
    #[serde(default)]
    pub ocr: OcrConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let s = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 3000)?
            .set_default("server.cors.allow_origins", Vec::<String>::new())?
            .set_default("server.cors.max_age", 3600)?
            .set_default("storage.backend", "filesystem")?
            .set_default("storage.path", "./data/blobs")?
            .set_default("storage.max_blob_size", default_max_file_size())?
            // Load from config/config.toml
            .add_source(File::with_name("config/config").required(false))
            // Override from environment (e.g., FOLIO__AUTH__JWT_SECRET)
            .add_source(
                Environment::with_prefix("FOLIO")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("server.cors.allow_origins")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = s.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that deserialize but cannot be used, so later
    /// conversions never fail at runtime.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.asset.intent_ttl()?;
        self.asset.intent_grace()?;
        self.asset.download_ttl()?;
        self.ocr.timeout()?;
        self.ocr.redrive_after()?;
        Ok(())
    }
}
