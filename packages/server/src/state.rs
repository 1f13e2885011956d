use std::sync::Arc;

use common::storage::Presigner;

use crate::config::AppConfig;
use crate::intake::UploadIntake;
use crate::lifecycle::AssetLifecycle;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub lifecycle: Arc<AssetLifecycle>,
    pub intake: Arc<UploadIntake>,
    pub presigner: Arc<dyn Presigner>,
}
