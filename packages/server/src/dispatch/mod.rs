//! Hand-off of extraction jobs to the OCR worker.
//!
//! Confirmation commits an outbox row and then pushes the job onto a bounded
//! in-process queue. A small pool drains the queue and publishes each job,
//! so a slow or unreachable broker never holds up a request.

mod broker;
mod pool;

pub use broker::MqOcrDispatcher;
pub use pool::{DispatchPoolConfig, spawn_dispatch_pool};

use async_trait::async_trait;
use common::ocr_job::OcrJob;
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::warn;

#[derive(Debug, Error)]
pub enum DispatchError {
    /// The broker could not be reached; worth another try.
    #[error("transport error: {0}")]
    Transport(String),
    /// The job can never be accepted.
    #[error("dispatch rejected: {0}")]
    Rejected(String),
}

impl DispatchError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

/// Fire-and-forget request to the extraction worker.
#[async_trait]
pub trait OcrDispatcher: Send + Sync {
    async fn dispatch(&self, job: &OcrJob) -> Result<(), DispatchError>;
}

/// Used when the message queue is disabled: every job is rejected, so
/// confirmed assets resolve to failed instead of waiting for the sweep.
pub struct DisabledDispatcher;

#[async_trait]
impl OcrDispatcher for DisabledDispatcher {
    async fn dispatch(&self, _job: &OcrJob) -> Result<(), DispatchError> {
        Err(DispatchError::Rejected("OCR dispatch is disabled".into()))
    }
}

/// Sending half of the dispatch queue.
#[derive(Clone)]
pub struct DispatchQueue {
    tx: mpsc::Sender<OcrJob>,
}

pub fn dispatch_queue(capacity: usize) -> (DispatchQueue, mpsc::Receiver<OcrJob>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (DispatchQueue { tx }, rx)
}

impl DispatchQueue {
    /// Queue a job without waiting. A job that does not fit stays in the
    /// outbox and is picked up by the next redrive.
    pub fn enqueue(&self, job: OcrJob) -> bool {
        match self.tx.try_send(job) {
            Ok(()) => true,
            Err(TrySendError::Full(job)) => {
                warn!(
                    asset_id = job.asset_id,
                    job_id = %job.job_id,
                    "Dispatch queue full, leaving job for redrive"
                );
                false
            }
            Err(TrySendError::Closed(job)) => {
                warn!(
                    asset_id = job.asset_id,
                    job_id = %job.job_id,
                    "Dispatch pool stopped, leaving job for redrive"
                );
                false
            }
        }
    }
}
