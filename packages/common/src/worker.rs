use serde::{Deserialize, Serialize};

use crate::mq::Message;

/// Task envelope consumed by workers. The payload is the typed message,
/// `task_type` its [`Message::message_type`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub task_type: String,
    pub payload: serde_json::Value,
}

impl Task {
    /// Wrap a typed message for publishing.
    pub fn from_message<M: Message>(message: &M) -> Result<Self, serde_json::Error> {
        Ok(Self {
            id: message.message_id().to_string(),
            task_type: M::message_type().to_string(),
            payload: serde_json::to_value(message)?,
        })
    }

    /// Whether this task carries a message of type `M`.
    pub fn is<M: Message>(&self) -> bool {
        self.task_type == M::message_type()
    }
}
