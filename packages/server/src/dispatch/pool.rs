use std::sync::Arc;

use common::ocr_job::OcrJob;
use common::retry::{RetryDecision, RetryPolicy};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::OcrDispatcher;
use crate::lifecycle::AssetLifecycle;

#[derive(Debug, Clone, Copy)]
pub struct DispatchPoolConfig {
    pub concurrency: usize,
    pub retry: RetryPolicy,
}

/// Start `concurrency` workers draining `receiver`. Workers exit once every
/// [`super::DispatchQueue`] handle is dropped and the queue is empty.
pub fn spawn_dispatch_pool(
    receiver: mpsc::Receiver<OcrJob>,
    lifecycle: Arc<AssetLifecycle>,
    dispatcher: Arc<dyn OcrDispatcher>,
    config: DispatchPoolConfig,
) -> Vec<JoinHandle<()>> {
    let receiver = Arc::new(Mutex::new(receiver));
    let workers = config.concurrency.max(1);

    info!(workers, max_retries = config.retry.max_retries, "Starting OCR dispatch pool");

    (0..workers)
        .map(|worker| {
            let receiver = receiver.clone();
            let lifecycle = lifecycle.clone();
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move {
                loop {
                    let job = { receiver.lock().await.recv().await };
                    let Some(job) = job else {
                        break;
                    };
                    dispatch_job(&lifecycle, dispatcher.as_ref(), &config.retry, job).await;
                }
                info!(worker, "OCR dispatch worker stopped");
            })
        })
        .collect()
}

async fn dispatch_job(
    lifecycle: &AssetLifecycle,
    dispatcher: &dyn OcrDispatcher,
    policy: &RetryPolicy,
    job: OcrJob,
) {
    let mut history = Vec::new();

    loop {
        match dispatcher.dispatch(&job).await {
            Ok(()) => {
                info!(asset_id = job.asset_id, job_id = %job.job_id, "OCR job dispatched");
                if let Err(e) = lifecycle.acknowledge_dispatch(&job).await {
                    // The row stays; a later redrive dispatches the job again.
                    warn!(asset_id = job.asset_id, error = %e, "Failed to clear outbox row");
                }
                return;
            }
            Err(e) if e.is_retryable() => match policy.record_failure(&mut history, &e.to_string()) {
                RetryDecision::Retry { attempt, delay } => {
                    warn!(
                        asset_id = job.asset_id,
                        job_id = %job.job_id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "OCR dispatch failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                RetryDecision::Exhausted => {
                    error!(
                        asset_id = job.asset_id,
                        job_id = %job.job_id,
                        attempts = history.len(),
                        error = %e,
                        "OCR dispatch retries exhausted"
                    );
                    break;
                }
            },
            Err(e) => {
                error!(
                    asset_id = job.asset_id,
                    job_id = %job.job_id,
                    error = %e,
                    "OCR dispatch rejected"
                );
                break;
            }
        }
    }

    match lifecycle.fail_extraction(job.asset_id).await {
        Ok(Some(_)) => info!(asset_id = job.asset_id, "Extraction failed after dispatch error"),
        Ok(None) => info!(
            asset_id = job.asset_id,
            "Extraction already resolved, dispatch failure ignored"
        ),
        Err(e) => error!(
            asset_id = job.asset_id,
            error = %e,
            "Failed to record dispatch failure, leaving it to the timeout sweep"
        ),
    }
}
