use common::ocr_result::{OcrErrorInfo, OcrResult};
use common::retry::RetryAttempt;
use common::{DlqEnvelope, DlqErrorCode, ExtractionStatus, UploadStatus};
use folio_server::consumers::{apply_dead_letter, apply_ocr_result};

use crate::common::{Harness, USER, eventually};

async fn dispatched_job_id(h: &Harness, asset_id: i64) -> String {
    let dispatcher = h.dispatcher.clone();
    eventually("job dispatched", || {
        let dispatcher = dispatcher.clone();
        async move {
            dispatcher
                .accepted()
                .await
                .iter()
                .any(|job| job.asset_id == asset_id)
        }
    })
    .await;

    h.dispatcher
        .accepted()
        .await
        .into_iter()
        .find(|job| job.asset_id == asset_id)
        .map(|job| job.job_id)
        .unwrap()
}

#[tokio::test]
async fn upload_to_completed_extraction() {
    let h = Harness::new();
    let intent = h.create_intent("lecture.pdf").await;
    assert_eq!(intent.asset.upload_status, UploadStatus::Pending);

    h.blobs.upload(intent.storage_key.as_str()).await;
    let confirmed = h.lifecycle.confirm_upload(intent.asset.id, USER).await.unwrap();
    assert_eq!(
        confirmed.extraction_status,
        Some(ExtractionStatus::Processing)
    );

    let job_id = dispatched_job_id(&h, confirmed.id).await;
    assert_eq!(h.dispatcher.accepted().await.len(), 1);

    let resolved = apply_ocr_result(
        &h.lifecycle,
        OcrResult::completed(job_id, confirmed.id, "X", Some(3)),
    )
    .await
    .unwrap()
    .expect("result should apply");
    assert_eq!(resolved.version, confirmed.version + 1);

    let detail = h.lifecycle.get_asset(confirmed.id, USER).await.unwrap();
    assert_eq!(detail.upload_status, UploadStatus::Uploaded);
    assert_eq!(detail.extraction_status, Some(ExtractionStatus::Completed));
    assert_eq!(detail.extracted_content.as_deref(), Some("X"));
    assert_eq!(detail.page_count, Some(3));
    assert!(detail.extracted_at.is_some());
    assert!(h.memory.outbox_entry(confirmed.id).await.is_none());
}

#[tokio::test]
async fn late_failure_does_not_overwrite_success() {
    let h = Harness::new();
    let asset = h.create_confirmed("scan.pdf").await;

    h.lifecycle
        .complete_extraction(asset.id, "text".into(), Some(1))
        .await
        .unwrap()
        .expect("first result applies");

    let ignored = h.lifecycle.fail_extraction(asset.id).await.unwrap();
    assert!(ignored.is_none());

    let detail = h.asset(asset.id).await;
    assert_eq!(detail.extraction_status, Some(ExtractionStatus::Completed));
    assert_eq!(detail.extracted_content.as_deref(), Some("text"));
}

#[tokio::test]
async fn late_success_does_not_overwrite_failure() {
    let h = Harness::new();
    let asset = h.create_confirmed("scan.pdf").await;

    h.lifecycle
        .fail_extraction(asset.id)
        .await
        .unwrap()
        .expect("failure applies");
    let failed = h.asset(asset.id).await;

    let ignored = h
        .lifecycle
        .complete_extraction(asset.id, "late".into(), Some(2))
        .await
        .unwrap();
    assert!(ignored.is_none());

    let detail = h.asset(asset.id).await;
    assert_eq!(detail.extraction_status, Some(ExtractionStatus::Failed));
    assert_eq!(detail.extracted_content, None);
    assert_eq!(detail.page_count, None);
    assert_eq!(detail.version, failed.version);
}

#[tokio::test]
async fn duplicate_results_apply_once() {
    let h = Harness::new();
    let asset = h.create_confirmed("scan.pdf").await;

    let first = h
        .lifecycle
        .complete_extraction(asset.id, "one".into(), Some(1))
        .await
        .unwrap();
    let second = h
        .lifecycle
        .complete_extraction(asset.id, "two".into(), Some(2))
        .await
        .unwrap();
    assert!(first.is_some());
    assert!(second.is_none());
    assert_eq!(
        h.asset(asset.id).await.extracted_content.as_deref(),
        Some("one")
    );
}

#[tokio::test]
async fn results_for_unknown_or_pending_assets_are_ignored() {
    let h = Harness::new();
    let intent = h.create_intent("scan.pdf").await;

    assert!(
        h.lifecycle
            .complete_extraction(intent.asset.id, "x".into(), None)
            .await
            .unwrap()
            .is_none()
    );
    assert!(h.lifecycle.fail_extraction(424242).await.unwrap().is_none());
    assert_eq!(h.asset(intent.asset.id).await.extraction_status, None);
}

#[tokio::test]
async fn worker_failure_result_fails_extraction() {
    let h = Harness::new();
    let asset = h.create_confirmed("scan.pdf").await;
    let job_id = dispatched_job_id(&h, asset.id).await;

    let resolved = apply_ocr_result(
        &h.lifecycle,
        OcrResult::failed(
            job_id,
            asset.id,
            OcrErrorInfo::new("UNREADABLE_DOCUMENT", "no text layer"),
        ),
    )
    .await
    .unwrap();
    assert!(resolved.is_some());
    assert_eq!(
        h.asset(asset.id).await.extraction_status,
        Some(ExtractionStatus::Failed)
    );
}

#[tokio::test]
async fn dead_letter_fails_extraction() {
    let h = Harness::new();
    let asset = h.create_confirmed("scan.pdf").await;
    let job_id = dispatched_job_id(&h, asset.id).await;

    let envelope = DlqEnvelope {
        message_id: job_id.clone(),
        asset_id: Some(asset.id),
        payload: serde_json::json!({ "job_id": job_id }),
        error_code: DlqErrorCode::MaxRetriesExceeded,
        error_message: "model backend timed out".into(),
        retry_history: vec![RetryAttempt::new(1, "timeout")],
    };
    assert!(apply_dead_letter(&h.lifecycle, envelope).await.unwrap().is_some());
    assert_eq!(
        h.asset(asset.id).await.extraction_status,
        Some(ExtractionStatus::Failed)
    );

    let orphan = DlqEnvelope {
        message_id: "unknown".into(),
        asset_id: None,
        payload: serde_json::Value::Null,
        error_code: DlqErrorCode::DeserializationError,
        error_message: "bad payload".into(),
        retry_history: vec![],
    };
    assert!(apply_dead_letter(&h.lifecycle, orphan).await.unwrap().is_none());
}
