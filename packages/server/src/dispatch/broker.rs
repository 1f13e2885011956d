use std::sync::Arc;

use async_trait::async_trait;
use common::ocr_job::OcrJob;
use mq::{Mq, MqError, publish_task};

use super::{DispatchError, OcrDispatcher};

/// Publishes jobs as `ocr_job` tasks on the Redis job queue.
pub struct MqOcrDispatcher {
    mq: Arc<Mq>,
    queue_name: String,
}

impl MqOcrDispatcher {
    pub fn new(mq: Arc<Mq>, queue_name: impl Into<String>) -> Self {
        Self {
            mq,
            queue_name: queue_name.into(),
        }
    }
}

#[async_trait]
impl OcrDispatcher for MqOcrDispatcher {
    async fn dispatch(&self, job: &OcrJob) -> Result<(), DispatchError> {
        publish_task(&self.mq, &self.queue_name, job)
            .await
            .map_err(|e| match e {
                MqError::Encode(e) => DispatchError::Rejected(e.to_string()),
                MqError::Internal(msg) => DispatchError::Transport(msg),
            })
    }
}
