//! Periodic purge of expired operation locks.
//!
//! Expired locks never block acquisition, so the sweep only keeps the lock
//! table small. A failed pass is logged and retried on the next tick.

use std::time::Duration;

use assetlink_core::association::lock_manager::LockManager;
use tokio_util::sync::CancellationToken;

/// Run the sweep loop until `cancel` is triggered.
pub async fn run(locks: LockManager, every: Duration, cancel: CancellationToken) {
    tracing::info!(interval_secs = every.as_secs(), "Lock sweep started");

    let mut interval = tokio::time::interval(every);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Lock sweep stopping");
                break;
            }
            _ = interval.tick() => {
                match locks.sweep_expired().await {
                    Ok(0) => tracing::debug!("Lock sweep: nothing expired"),
                    Ok(swept) => tracing::info!(swept, "Lock sweep: purged expired locks"),
                    Err(e) => tracing::error!(error = %e, "Lock sweep failed"),
                }
            }
        }
    }
}
