use std::sync::Arc;

use chrono::{Duration, Utc};
use common::{ExtractionStatus, UploadStatus};
use folio_server::config::OcrConfig;
use folio_server::lifecycle::LifecycleError;
use folio_server::reconcile::run_sweep;
use folio_server::store::MemoryAssetStore;

use crate::common::{DispatchMode, Fault, FaultyStore, Harness, RecordingDispatcher, USER};

#[tokio::test]
async fn stuck_extraction_times_out() {
    let h = Harness::new();
    let stuck = h.create_confirmed("old.pdf").await;
    let fresh = h.create_confirmed("new.pdf").await;

    let now = Utc::now();
    h.memory.touch(stuck.id, now - Duration::minutes(31)).await;

    let report = h
        .lifecycle
        .reconcile_timeouts(Duration::minutes(30), now)
        .await
        .unwrap();
    assert_eq!(report.scanned, 1);
    assert_eq!(report.transitioned, 1);
    assert_eq!(report.errors, 0);

    assert_eq!(
        h.asset(stuck.id).await.extraction_status,
        Some(ExtractionStatus::Failed)
    );
    assert_eq!(
        h.asset(fresh.id).await.extraction_status,
        Some(ExtractionStatus::Processing)
    );
}

#[tokio::test]
async fn timeout_leaves_resolved_extractions_alone() {
    let h = Harness::new();
    let asset = h.create_confirmed("done.pdf").await;
    h.lifecycle
        .complete_extraction(asset.id, "text".into(), Some(1))
        .await
        .unwrap();

    let now = Utc::now();
    h.memory.touch(asset.id, now - Duration::hours(2)).await;

    let report = h
        .lifecycle
        .reconcile_timeouts(Duration::minutes(30), now)
        .await
        .unwrap();
    assert_eq!(report.scanned, 0);
    assert_eq!(
        h.asset(asset.id).await.extraction_status,
        Some(ExtractionStatus::Completed)
    );
}

#[tokio::test]
async fn sweep_continues_past_a_failing_asset() {
    let memory = Arc::new(MemoryAssetStore::new());
    // Ids are assigned from 1, so the second asset is poisoned.
    let flaky = Arc::new(FaultyStore::new(memory.clone(), Fault::ResolveFails(2)));
    let h = Harness::build(
        flaky,
        memory,
        RecordingDispatcher::new(DispatchMode::Accept),
    );

    let mut ids = Vec::new();
    for name in ["a.pdf", "b.pdf", "c.pdf"] {
        ids.push(h.create_confirmed(name).await.id);
    }
    assert_eq!(ids, vec![1, 2, 3]);

    let now = Utc::now();
    for (offset, id) in ids.iter().enumerate() {
        h.memory
            .touch(*id, now - Duration::hours(3 - offset as i64))
            .await;
    }

    let report = h
        .lifecycle
        .reconcile_timeouts(Duration::minutes(30), now)
        .await
        .unwrap();
    assert_eq!(report.scanned, 3);
    assert_eq!(report.transitioned, 2);
    assert_eq!(report.errors, 1);

    assert_eq!(
        h.asset(1).await.extraction_status,
        Some(ExtractionStatus::Failed)
    );
    assert_eq!(
        h.asset(2).await.extraction_status,
        Some(ExtractionStatus::Processing)
    );
    assert_eq!(
        h.asset(3).await.extraction_status,
        Some(ExtractionStatus::Failed)
    );
}

#[tokio::test]
async fn abandoned_intent_expires_after_grace() {
    let h = Harness::new();
    let intent = h.create_intent("never.pdf").await;
    let confirmed = h.create_confirmed("done.pdf").await;
    let grace = h.lifecycle.settings().intent_grace;

    let report = h
        .lifecycle
        .expire_stale_intents(intent.expires_at + grace - Duration::seconds(1))
        .await
        .unwrap();
    assert_eq!(report.transitioned, 0);
    assert_eq!(
        h.asset(intent.asset.id).await.upload_status,
        UploadStatus::Pending
    );

    let report = h
        .lifecycle
        .expire_stale_intents(intent.expires_at + grace + Duration::seconds(1))
        .await
        .unwrap();
    assert_eq!(report.scanned, 1);
    assert_eq!(report.transitioned, 1);

    let expired = h.asset(intent.asset.id).await;
    assert_eq!(expired.upload_status, UploadStatus::Failed);
    assert_eq!(expired.extraction_status, None);
    assert_eq!(
        h.asset(confirmed.id).await.upload_status,
        UploadStatus::Uploaded
    );

    // A late upload cannot revive the intent.
    h.blobs.upload(intent.storage_key.as_str()).await;
    let err = h
        .lifecycle
        .confirm_upload(intent.asset.id, USER)
        .await
        .unwrap_err();
    assert!(matches!(err, LifecycleError::IntentExpired(_)));
}

#[tokio::test]
async fn scheduled_sweep_runs_every_step() {
    let h = Harness::new();
    let stuck = h.create_confirmed("stuck.pdf").await;
    let fresh = h.create_confirmed("fresh.pdf").await;
    let config = OcrConfig::default();

    h.memory
        .touch(
            stuck.id,
            Utc::now() - Duration::seconds(config.timeout_secs as i64 + 60),
        )
        .await;

    run_sweep(&h.lifecycle, &config).await;

    assert_eq!(
        h.asset(stuck.id).await.extraction_status,
        Some(ExtractionStatus::Failed)
    );
    assert_eq!(
        h.asset(fresh.id).await.extraction_status,
        Some(ExtractionStatus::Processing)
    );
}
