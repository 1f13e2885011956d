use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use crate::config::OcrConfig;
use crate::lifecycle::AssetLifecycle;

/// Run the reconciliation sweep on a fixed interval. Sweeps never overlap:
/// a sweep that overruns its slot skips the missed ticks.
pub async fn run_reconciliation_scheduler(lifecycle: Arc<AssetLifecycle>, config: OcrConfig) {
    let scan_interval = Duration::from_secs(config.sweep_interval_secs.max(1));

    info!(
        timeout_secs = config.timeout_secs,
        scan_interval_secs = config.sweep_interval_secs,
        "Starting reconciliation scheduler"
    );

    let mut interval = tokio::time::interval(scan_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        interval.tick().await;
        run_sweep(&lifecycle, &config).await;
    }
}

/// One pass: time out stuck extractions, expire abandoned intents and
/// redrive unacknowledged dispatches. Each step runs even if an earlier one
/// failed.
pub async fn run_sweep(lifecycle: &AssetLifecycle, config: &OcrConfig) {
    let now = Utc::now();

    match config.timeout() {
        Ok(threshold) => match lifecycle.reconcile_timeouts(threshold, now).await {
            Ok(report) if report.scanned > 0 => info!(
                scanned = report.scanned,
                failed = report.transitioned,
                skipped = report.skipped,
                errors = report.errors,
                "Timed out stuck extractions"
            ),
            Ok(_) => {}
            Err(e) => error!(error = %e, "Extraction timeout sweep failed"),
        },
        Err(e) => error!(error = %e, "Skipping extraction timeout sweep"),
    }

    match lifecycle.expire_stale_intents(now).await {
        Ok(report) if report.scanned > 0 => info!(
            scanned = report.scanned,
            expired = report.transitioned,
            errors = report.errors,
            "Expired stale upload intents"
        ),
        Ok(_) => {}
        Err(e) => error!(error = %e, "Upload intent expiry sweep failed"),
    }

    match lifecycle.redrive_dispatches(now).await {
        Ok(0) => {}
        Ok(queued) => info!(queued, "Redrove unacknowledged OCR jobs"),
        Err(e) => error!(error = %e, "OCR dispatch redrive failed"),
    }
}
