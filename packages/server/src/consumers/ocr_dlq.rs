use std::sync::Arc;

use common::DlqEnvelope;
use mq::{BroccoliError, BrokerMessage, Mq};
use tracing::{error, info, warn};

use crate::entity::asset;
use crate::lifecycle::{AssetLifecycle, LifecycleError};

/// Consume jobs the OCR worker gave up on. Each one fails its asset's
/// extraction unless a result already arrived.
pub async fn consume_ocr_dlq(lifecycle: Arc<AssetLifecycle>, mq: Arc<Mq>, queue_name: String) {
    info!(queue = %queue_name, "Starting OCR DLQ consumer");

    let result = mq
        .process_messages(
            &queue_name,
            None,
            None,
            move |message: BrokerMessage<DlqEnvelope>| {
                let lifecycle = lifecycle.clone();
                async move {
                    let envelope = message.payload;
                    let message_id = envelope.message_id.clone();
                    let asset_id = envelope.asset_id;

                    apply_dead_letter(&lifecycle, envelope).await.map_err(|e| {
                        error!(
                            asset_id,
                            message_id = %message_id,
                            error = %e,
                            "Failed to fail extraction for dead letter"
                        );
                        BroccoliError::Job(e.to_string())
                    })?;
                    Ok(())
                }
            },
        )
        .await;

    if let Err(e) = result {
        error!(error = %e, "OCR DLQ consumer stopped unexpectedly");
    }
}

/// Treat a dead-lettered job as the failure signal for its asset.
pub async fn apply_dead_letter(
    lifecycle: &AssetLifecycle,
    envelope: DlqEnvelope,
) -> Result<Option<asset::Model>, LifecycleError> {
    warn!(
        asset_id = envelope.asset_id,
        message_id = %envelope.message_id,
        error_code = %envelope.error_code,
        error_message = %envelope.error_message,
        retries = envelope.retry_history.len(),
        "OCR job dead-lettered"
    );

    let Some(asset_id) = envelope.asset_id else {
        info!(message_id = %envelope.message_id, "Skipping dead letter without asset id");
        return Ok(None);
    };

    lifecycle.fail_extraction(asset_id).await
}
