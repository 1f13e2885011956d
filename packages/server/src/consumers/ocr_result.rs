use std::sync::Arc;

use common::ocr_result::{OcrOutcome, OcrResult};
use mq::{BroccoliError, BrokerMessage, Mq};
use tracing::{error, info, warn};

use crate::entity::asset;
use crate::lifecycle::{AssetLifecycle, LifecycleError};

/// Consume extraction results published by the OCR worker.
pub async fn consume_ocr_results(lifecycle: Arc<AssetLifecycle>, mq: Arc<Mq>, queue_name: String) {
    info!(queue = %queue_name, "Starting OCR result consumer");

    let result = mq
        .process_messages(
            &queue_name,
            None,
            None,
            move |message: BrokerMessage<OcrResult>| {
                let lifecycle = lifecycle.clone();
                async move {
                    let result = message.payload;
                    let asset_id = result.asset_id;
                    let job_id = result.job_id.clone();

                    if let Err(e) = apply_ocr_result(&lifecycle, result).await {
                        error!(
                            asset_id,
                            job_id = %job_id,
                            error = %e,
                            "Failed to apply OCR result"
                        );
                        return Err(BroccoliError::Job(e.to_string()));
                    }
                    Ok(())
                }
            },
        )
        .await;

    if let Err(e) = result {
        error!(error = %e, "OCR result consumer stopped unexpectedly");
    }
}

/// Route one worker result to the matching lifecycle transition.
pub async fn apply_ocr_result(
    lifecycle: &AssetLifecycle,
    result: OcrResult,
) -> Result<Option<asset::Model>, LifecycleError> {
    match result.outcome {
        OcrOutcome::Completed {
            content,
            page_count,
        } => {
            lifecycle
                .complete_extraction(result.asset_id, content, page_count)
                .await
        }
        OcrOutcome::Failed { error } => {
            warn!(
                asset_id = result.asset_id,
                job_id = %result.job_id,
                code = %error.code,
                message = %error.message,
                "OCR worker reported failure"
            );
            lifecycle.fail_extraction(result.asset_id).await
        }
    }
}
