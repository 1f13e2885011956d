use std::sync::Arc;

use chrono::{Duration, Utc};
use common::ocr_job::OcrJob;
use common::{AssetOrigin, ExtractionStatus};
use folio_server::dispatch::dispatch_queue;
use folio_server::lifecycle::{AssetLifecycle, NewUploadIntent};
use folio_server::store::{AssetStore, CasOutcome, MemoryAssetStore};

use crate::common::{
    DispatchMode, Harness, NOTE, RecordingDispatcher, StubBlobStore, USER, eventually,
    test_settings,
};

async fn wait_for_status(h: &Harness, asset_id: i64, status: ExtractionStatus) {
    let memory = h.memory.clone();
    eventually("extraction status", || {
        let memory = memory.clone();
        async move {
            memory
                .find(asset_id)
                .await
                .unwrap()
                .is_some_and(|a| a.extraction_status == Some(status))
        }
    })
    .await;
}

#[tokio::test]
async fn rejected_dispatch_fails_extraction() {
    let h = Harness::with_dispatcher(RecordingDispatcher::new(DispatchMode::Reject));
    let asset = h.create_confirmed("scan.pdf").await;

    // The request itself succeeded; the failure arrives afterwards.
    assert_eq!(asset.extraction_status, Some(ExtractionStatus::Processing));

    wait_for_status(&h, asset.id, ExtractionStatus::Failed).await;
    assert_eq!(h.dispatcher.attempts(), 1);
    assert!(h.memory.outbox_entry(asset.id).await.is_none());
}

#[tokio::test]
async fn unreachable_worker_fails_after_retries() {
    let h = Harness::with_dispatcher(RecordingDispatcher::new(DispatchMode::Unreachable));
    let asset = h.create_confirmed("scan.pdf").await;

    wait_for_status(&h, asset.id, ExtractionStatus::Failed).await;
    // One attempt plus two retries.
    assert_eq!(h.dispatcher.attempts(), 3);
}

#[tokio::test]
async fn transient_error_is_retried() {
    let h = Harness::with_dispatcher(
        RecordingDispatcher::new(DispatchMode::Accept).fail_first(1),
    );
    let asset = h.create_confirmed("scan.pdf").await;

    let memory = h.memory.clone();
    eventually("outbox row acknowledged", || {
        let memory = memory.clone();
        async move { memory.outbox_entry(asset.id).await.is_none() }
    })
    .await;

    assert_eq!(h.dispatcher.attempts(), 2);
    assert_eq!(h.dispatcher.accepted().await.len(), 1);
    assert_eq!(
        h.asset(asset.id).await.extraction_status,
        Some(ExtractionStatus::Processing)
    );
}

#[tokio::test]
async fn committed_job_without_dispatch_is_redriven() {
    let h = Harness::new();
    let intent = h.create_intent("scan.pdf").await;

    // Commit a confirmation without handing the job to the pool, as if the
    // process stopped between commit and enqueue.
    let job = OcrJob::new(intent.asset.id, intent.storage_key.as_str(), "application/pdf");
    let outcome = h
        .memory
        .mark_uploaded(intent.asset.id, intent.asset.version, &job, Utc::now())
        .await
        .unwrap();
    assert!(matches!(outcome, CasOutcome::Applied(_)));

    // Too fresh to redrive.
    assert_eq!(h.lifecycle.redrive_dispatches(Utc::now()).await.unwrap(), 0);

    h.memory
        .backdate_dispatch(intent.asset.id, Utc::now() - Duration::minutes(10))
        .await;
    assert_eq!(h.lifecycle.redrive_dispatches(Utc::now()).await.unwrap(), 1);

    let memory = h.memory.clone();
    eventually("redriven job acknowledged", || {
        let memory = memory.clone();
        async move { memory.outbox_entry(intent.asset.id).await.is_none() }
    })
    .await;

    let accepted = h.dispatcher.accepted().await;
    assert_eq!(accepted, vec![job]);
}

#[tokio::test]
async fn full_queue_leaves_job_in_outbox() {
    let memory = Arc::new(MemoryAssetStore::new());
    let blobs = Arc::new(StubBlobStore::new());
    // Nobody drains the queue.
    let (queue, _receiver) = dispatch_queue(1);
    let lifecycle = AssetLifecycle::new(memory.clone(), blobs.clone(), queue, test_settings());

    let mut ids = Vec::new();
    for name in ["a.pdf", "b.pdf"] {
        let intent = lifecycle
            .create_upload_intent(NewUploadIntent {
                user_id: USER,
                note_id: NOTE,
                file_name: name.into(),
                mime_type: "application/pdf".into(),
                file_size: 10,
                origin: AssetOrigin::Upload,
            })
            .await
            .unwrap();
        blobs.upload(intent.storage_key.as_str()).await;
        let confirmed = lifecycle.confirm_upload(intent.asset.id, USER).await.unwrap();
        assert_eq!(
            confirmed.extraction_status,
            Some(ExtractionStatus::Processing)
        );
        ids.push(confirmed.id);
    }

    for id in ids {
        let row = memory.outbox_entry(id).await.expect("outbox row kept");
        assert_eq!(row.attempts, 1);
    }
}
