use broccoli_queue::queue::BroccoliQueueBuilder;
pub use broccoli_queue::{
    brokers::broker::BrokerMessage,
    error::BroccoliError,
    queue::{BroccoliQueue, ConsumeOptions},
};
use common::MqAppConfig;
use common::mq::Message;
use common::worker::Task;
use tracing::debug;

use crate::error::MqError;

pub type MqQueue = BroccoliQueue;
pub type MqBuilder = BroccoliQueueBuilder;

pub struct MqConfig {
    pub url: String,
    pub pool_size: u8,
}

impl From<&MqAppConfig> for MqConfig {
    fn from(config: &MqAppConfig) -> Self {
        Self {
            url: config.url.clone(),
            pool_size: config.pool_size,
        }
    }
}

pub async fn init_mq(config: MqConfig) -> Result<MqQueue, MqError> {
    BroccoliQueue::builder(&config.url)
        .pool_connections(config.pool_size)
        .build()
        .await
        .map_err(MqError::from)
}

/// Wrap `message` in a [`Task`] envelope and publish it on `queue`.
pub async fn publish_task<M: Message>(
    mq: &MqQueue,
    queue: &str,
    message: &M,
) -> Result<(), MqError> {
    let task = Task::from_message(message)?;
    mq.publish(queue, None, &task, None).await?;
    debug!(queue, task_id = %task.id, task_type = %task.task_type, "Published task");
    Ok(())
}
