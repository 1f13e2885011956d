use std::sync::Arc;

use common::{ExtractionStatus, UploadStatus};
use folio_server::lifecycle::LifecycleError;

use folio_server::store::{AssetStore, MemoryAssetStore};

use crate::common::{
    DispatchMode, Fault, FaultyStore, Harness, OTHER_USER, RecordingDispatcher, USER, eventually,
};

#[tokio::test]
async fn intent_starts_pending_with_expiry() {
    let h = Harness::new();
    let intent = h.create_intent("scan.pdf").await;

    assert_eq!(intent.asset.upload_status, UploadStatus::Pending);
    assert_eq!(intent.asset.extraction_status, None);
    assert_eq!(intent.asset.upload_expires_at, Some(intent.expires_at));
    assert!(
        intent
            .storage_key
            .as_str()
            .starts_with("users/1/notes/10/assets/")
    );
    assert!(intent.storage_key.as_str().ends_with("_scan.pdf"));
    assert!(h.dispatcher.accepted().await.is_empty());
}

#[tokio::test]
async fn confirm_moves_to_processing_and_dispatches_once() {
    let h = Harness::new();
    let intent = h.create_intent("scan.pdf").await;
    h.blobs.upload(intent.storage_key.as_str()).await;

    let confirmed = h.lifecycle.confirm_upload(intent.asset.id, USER).await.unwrap();
    assert_eq!(confirmed.upload_status, UploadStatus::Uploaded);
    assert_eq!(
        confirmed.extraction_status,
        Some(ExtractionStatus::Processing)
    );
    assert_eq!(confirmed.version, intent.asset.version + 1);

    let dispatcher = h.dispatcher.clone();
    eventually("job dispatched", || {
        let dispatcher = dispatcher.clone();
        async move { dispatcher.accepted().await.len() == 1 }
    })
    .await;

    let job = &h.dispatcher.accepted().await[0];
    assert_eq!(job.asset_id, intent.asset.id);
    assert_eq!(job.storage_key, intent.storage_key.as_str());
    assert_eq!(job.mime_type, "application/pdf");
}

#[tokio::test]
async fn second_confirmation_is_rejected_without_dispatch() {
    let h = Harness::new();
    let asset = h.create_confirmed("scan.pdf").await;

    let dispatcher = h.dispatcher.clone();
    eventually("first job dispatched", || {
        let dispatcher = dispatcher.clone();
        async move { dispatcher.accepted().await.len() == 1 }
    })
    .await;

    let err = h.lifecycle.confirm_upload(asset.id, USER).await.unwrap_err();
    assert!(matches!(err, LifecycleError::AlreadyConfirmed(id) if id == asset.id));

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert_eq!(h.dispatcher.accepted().await.len(), 1);
    assert_eq!(h.asset(asset.id).await.version, asset.version);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_confirmations_have_one_winner() {
    let h = Harness::new();
    let intent = h.create_intent("scan.pdf").await;
    h.blobs.upload(intent.storage_key.as_str()).await;
    let asset_id = intent.asset.id;

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let lifecycle = Arc::clone(&h.lifecycle);
            tokio::spawn(async move { lifecycle.confirm_upload(asset_id, USER).await })
        })
        .collect();

    let mut wins = 0;
    let mut conflicts = 0;
    for task in futures::future::join_all(tasks).await {
        match task.unwrap() {
            Ok(_) => wins += 1,
            Err(LifecycleError::AlreadyConfirmed(_)) => conflicts += 1,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    assert_eq!(wins, 1);
    assert_eq!(conflicts, 7);

    let dispatcher = h.dispatcher.clone();
    eventually("winner dispatched", || {
        let dispatcher = dispatcher.clone();
        async move { !dispatcher.accepted().await.is_empty() }
    })
    .await;
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert_eq!(h.dispatcher.accepted().await.len(), 1);
    assert_eq!(h.asset(asset_id).await.version, 1);
}

#[tokio::test]
async fn confirm_before_upload_is_retryable() {
    let h = Harness::new();
    let intent = h.create_intent("scan.pdf").await;

    let err = h
        .lifecycle
        .confirm_upload(intent.asset.id, USER)
        .await
        .unwrap_err();
    assert!(matches!(err, LifecycleError::BlobNotUploaded(_)));

    let untouched = h.asset(intent.asset.id).await;
    assert_eq!(untouched.upload_status, UploadStatus::Pending);
    assert_eq!(untouched.extraction_status, None);
    assert_eq!(untouched.version, intent.asset.version);
    assert!(h.memory.outbox_entry(intent.asset.id).await.is_none());

    h.blobs.upload(intent.storage_key.as_str()).await;
    let confirmed = h.lifecycle.confirm_upload(intent.asset.id, USER).await.unwrap();
    assert_eq!(confirmed.upload_status, UploadStatus::Uploaded);
}

#[tokio::test]
async fn confirm_racing_a_delete_reports_not_found() {
    let memory = Arc::new(MemoryAssetStore::new());
    let store = Arc::new(FaultyStore::new(memory.clone(), Fault::DeletedBeforeConfirm));
    let h = Harness::build(
        store,
        memory,
        RecordingDispatcher::new(DispatchMode::Accept),
    );
    let intent = h.create_intent("scan.pdf").await;
    h.blobs.upload(intent.storage_key.as_str()).await;

    let err = h
        .lifecycle
        .confirm_upload(intent.asset.id, USER)
        .await
        .unwrap_err();

    assert!(matches!(err, LifecycleError::NotFound(id) if id == intent.asset.id));
    assert!(h.memory.find(intent.asset.id).await.unwrap().is_none());
    assert!(h.memory.outbox_entry(intent.asset.id).await.is_none());
    assert_eq!(h.dispatcher.attempts(), 0);
}

#[tokio::test]
async fn ownership_is_checked() {
    let h = Harness::new();
    let intent = h.create_intent("scan.pdf").await;
    h.blobs.upload(intent.storage_key.as_str()).await;

    let err = h
        .lifecycle
        .confirm_upload(intent.asset.id, OTHER_USER)
        .await
        .unwrap_err();
    assert!(matches!(err, LifecycleError::Forbidden(_)));

    let err = h.lifecycle.confirm_upload(9999, USER).await.unwrap_err();
    assert!(matches!(err, LifecycleError::NotFound(9999)));

    assert_eq!(
        h.asset(intent.asset.id).await.upload_status,
        UploadStatus::Pending
    );
}

#[tokio::test]
async fn delete_succeeds_when_blob_removal_fails() {
    let h = Harness::new();
    let asset = h.create_confirmed("scan.pdf").await;
    h.blobs.fail_deletes();

    h.lifecycle.delete_asset(asset.id, USER).await.unwrap();
    assert!(matches!(
        h.lifecycle.get_asset(asset.id, USER).await,
        Err(LifecycleError::NotFound(_))
    ));
    assert!(h.memory.outbox_entry(asset.id).await.is_none());

    let blobs = h.blobs.clone();
    eventually("blob deletion attempted", || {
        let blobs = blobs.clone();
        async move { !blobs.delete_calls().await.is_empty() }
    })
    .await;
    assert!(h.blobs.contains(&asset.storage_key).await);
}

#[tokio::test]
async fn delete_removes_blob_in_background() {
    let h = Harness::new();
    let asset = h.create_confirmed("scan.pdf").await;

    let err = h.lifecycle.delete_asset(asset.id, OTHER_USER).await.unwrap_err();
    assert!(matches!(err, LifecycleError::Forbidden(_)));

    h.lifecycle.delete_asset(asset.id, USER).await.unwrap();

    let blobs = h.blobs.clone();
    let key = asset.storage_key.clone();
    eventually("blob removed", || {
        let blobs = blobs.clone();
        let key = key.clone();
        async move { !blobs.contains(&key).await }
    })
    .await;
}

#[tokio::test]
async fn download_requires_confirmed_upload() {
    let h = Harness::new();
    let intent = h.create_intent("scan.pdf").await;

    assert!(matches!(
        h.lifecycle.get_downloadable(intent.asset.id, USER).await,
        Err(LifecycleError::NotUploaded(_))
    ));

    h.blobs.upload(intent.storage_key.as_str()).await;
    h.lifecycle.confirm_upload(intent.asset.id, USER).await.unwrap();

    let (asset, key) = h
        .lifecycle
        .get_downloadable(intent.asset.id, USER)
        .await
        .unwrap();
    assert_eq!(asset.id, intent.asset.id);
    assert_eq!(key, intent.storage_key);
}
