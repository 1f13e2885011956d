use std::sync::Arc;

use anyhow::Context;
use common::storage::filesystem::FilesystemBlobStore;
use common::storage::s3::S3BlobStore;
use common::storage::{BlobStore, Presigner};
use mq::{MqConfig, init_mq};
use tracing::{info, warn};

use folio_server::config::{AppConfig, StorageBackend, StorageConfig};
use folio_server::consumers::{consume_ocr_dlq, consume_ocr_results};
use folio_server::database::init_db;
use folio_server::dispatch::{
    DisabledDispatcher, DispatchPoolConfig, MqOcrDispatcher, OcrDispatcher, dispatch_queue,
    spawn_dispatch_pool,
};
use folio_server::intake::UploadIntake;
use folio_server::lifecycle::{AssetLifecycle, LifecycleSettings};
use folio_server::notes::SeaOrmNoteAccess;
use folio_server::reconcile::run_reconciliation_scheduler;
use folio_server::state::AppState;
use folio_server::store::SeaOrmAssetStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_target(false).init();

    let config = AppConfig::load().context("Failed to load config")?;

    let db = init_db(&config.database.url)
        .await
        .context("Failed to connect to database")?;
    let store = Arc::new(SeaOrmAssetStore::new(db.clone()));
    let notes = Arc::new(SeaOrmNoteAccess::new(db));

    let (blobs, presigner) = init_blob_store(&config.storage).await?;

    let mq = if config.mq.enabled {
        let mq = init_mq(MqConfig::from(&config.mq))
            .await
            .context("Failed to initialize MQ")?;
        info!(
            queue_name = %config.mq.queue_name,
            result_queue_name = %config.mq.result_queue_name,
            dlq_queue_name = %config.mq.dlq_queue_name,
            "MQ connected"
        );
        Some(Arc::new(mq))
    } else {
        warn!("MQ disabled, confirmed uploads will fail extraction");
        None
    };

    let dispatcher: Arc<dyn OcrDispatcher> = match &mq {
        Some(mq) => Arc::new(MqOcrDispatcher::new(
            Arc::clone(mq),
            config.mq.queue_name.clone(),
        )),
        None => Arc::new(DisabledDispatcher),
    };

    let (queue, receiver) = dispatch_queue(config.ocr.queue_capacity);
    let lifecycle = Arc::new(AssetLifecycle::new(
        store.clone(),
        blobs,
        queue,
        lifecycle_settings(&config)?,
    ));

    spawn_dispatch_pool(
        receiver,
        Arc::clone(&lifecycle),
        dispatcher,
        DispatchPoolConfig {
            concurrency: config.ocr.dispatch_concurrency,
            retry: config.ocr.retry_policy(),
        },
    );

    if let Some(mq) = &mq {
        tokio::spawn(consume_ocr_results(
            Arc::clone(&lifecycle),
            Arc::clone(mq),
            config.mq.result_queue_name.clone(),
        ));
        tokio::spawn(consume_ocr_dlq(
            Arc::clone(&lifecycle),
            Arc::clone(mq),
            config.mq.dlq_queue_name.clone(),
        ));
    }

    tokio::spawn(run_reconciliation_scheduler(
        Arc::clone(&lifecycle),
        config.ocr.clone(),
    ));

    let intake = Arc::new(UploadIntake::new(store, notes, config.asset.clone()));
    let addr = format!("{}:{}", config.server.host, config.server.port);

    let state = AppState {
        config: Arc::new(config),
        lifecycle,
        intake,
        presigner,
    };
    let app = folio_server::build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Server running at http://{}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

async fn init_blob_store(
    config: &StorageConfig,
) -> anyhow::Result<(Arc<dyn BlobStore>, Arc<dyn Presigner>)> {
    match config.backend {
        StorageBackend::Filesystem => {
            let store = Arc::new(
                FilesystemBlobStore::new(config.path.clone(), config.max_blob_size)
                    .await
                    .context("Failed to initialize filesystem storage")?,
            );
            info!(path = %store.base_path().display(), "Using filesystem blob storage");
            let blobs: Arc<dyn BlobStore> = store.clone();
            let presigner: Arc<dyn Presigner> = store;
            Ok((blobs, presigner))
        }
        StorageBackend::S3 => {
            let settings = config
                .s3
                .as_ref()
                .context("storage.s3 is required when storage.backend = \"s3\"")?;
            let store = Arc::new(
                S3BlobStore::new(settings, config.max_blob_size)
                    .context("Failed to initialize S3 storage")?,
            );
            info!(bucket = %settings.bucket, "Using S3 blob storage");
            let blobs: Arc<dyn BlobStore> = store.clone();
            let presigner: Arc<dyn Presigner> = store;
            Ok((blobs, presigner))
        }
    }
}

fn lifecycle_settings(config: &AppConfig) -> anyhow::Result<LifecycleSettings> {
    Ok(LifecycleSettings {
        intent_ttl: config.asset.intent_ttl()?,
        intent_grace: config.asset.intent_grace()?,
        redrive_after: config.ocr.redrive_after()?,
        sweep_batch: config.ocr.sweep_batch_size,
    })
}
