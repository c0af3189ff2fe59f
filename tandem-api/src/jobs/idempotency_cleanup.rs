//! Idempotency Cleanup Background Task
//!
//! Expired records already read as absent; this task only reclaims their
//! storage.

use crate::constants::DEFAULT_IDEMPOTENCY_CLEANUP_INTERVAL_SECS;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tandem_storage::IdempotencyStore;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Debug, Clone)]
pub struct IdempotencyCleanupConfig {
    /// How often to purge (default: 10 minutes)
    pub interval: Duration,
}

impl Default for IdempotencyCleanupConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(DEFAULT_IDEMPOTENCY_CLEANUP_INTERVAL_SECS),
        }
    }
}

impl IdempotencyCleanupConfig {
    /// Reads `TANDEM_IDEMPOTENCY_CLEANUP_INTERVAL_SECS`.
    pub fn from_env() -> Self {
        let secs = std::env::var("TANDEM_IDEMPOTENCY_CLEANUP_INTERVAL_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .unwrap_or(DEFAULT_IDEMPOTENCY_CLEANUP_INTERVAL_SECS);
        Self {
            interval: Duration::from_secs(secs),
        }
    }

    pub fn development() -> Self {
        Self {
            interval: Duration::from_secs(30),
        }
    }

    pub fn production() -> Self {
        Self::default()
    }
}

// ============================================================================
// METRICS
// ============================================================================

#[derive(Debug, Default)]
pub struct IdempotencyCleanupMetrics {
    /// Records removed since startup
    pub records_purged: AtomicU64,
    pub cleanup_cycles: AtomicU64,
    pub cleanup_errors: AtomicU64,
}

impl IdempotencyCleanupMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> IdempotencyCleanupSnapshot {
        IdempotencyCleanupSnapshot {
            records_purged: self.records_purged.load(Ordering::Relaxed),
            cleanup_cycles: self.cleanup_cycles.load(Ordering::Relaxed),
            cleanup_errors: self.cleanup_errors.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdempotencyCleanupSnapshot {
    pub records_purged: u64,
    pub cleanup_cycles: u64,
    pub cleanup_errors: u64,
}

// ============================================================================
// BACKGROUND TASK
// ============================================================================

/// Purge expired idempotency records every `config.interval` until
/// shutdown. Returns the metrics collected over the task's lifetime.
pub async fn idempotency_cleanup_task(
    store: Arc<dyn IdempotencyStore>,
    config: IdempotencyCleanupConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Arc<IdempotencyCleanupMetrics> {
    let metrics = Arc::new(IdempotencyCleanupMetrics::new());

    let mut ticker = interval(config.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tracing::info!(
        interval_secs = config.interval.as_secs(),
        "Idempotency cleanup task started"
    );

    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    tracing::info!("Idempotency cleanup task shutting down");
                    break;
                }
            }
            _ = ticker.tick() => {
                purge_once(store.as_ref(), &metrics).await;
            }
        }
    }

    let snapshot = metrics.snapshot();
    tracing::info!(
        records_purged = snapshot.records_purged,
        cleanup_cycles = snapshot.cleanup_cycles,
        cleanup_errors = snapshot.cleanup_errors,
        "Idempotency cleanup task completed"
    );
    metrics
}

async fn purge_once(store: &dyn IdempotencyStore, metrics: &IdempotencyCleanupMetrics) {
    metrics.cleanup_cycles.fetch_add(1, Ordering::Relaxed);
    match store.purge_expired(chrono::Utc::now()).await {
        Ok(0) => tracing::trace!("No expired idempotency records"),
        Ok(purged) => {
            metrics.records_purged.fetch_add(purged, Ordering::Relaxed);
            tracing::debug!(purged, "Purged expired idempotency records");
        }
        Err(e) => {
            metrics.cleanup_errors.fetch_add(1, Ordering::Relaxed);
            tracing::error!(error = %e, "Failed to purge idempotency records");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tandem_core::TenantId;
    use tandem_storage::{IdempotencyRecord, InMemoryIdempotencyStore};

    #[test]
    fn test_config_presets() {
        assert_eq!(
            IdempotencyCleanupConfig::default().interval,
            Duration::from_secs(600)
        );
        assert!(
            IdempotencyCleanupConfig::development().interval
                < IdempotencyCleanupConfig::production().interval
        );
    }

    #[tokio::test]
    async fn test_purge_once_counts_removed_records() {
        let store = InMemoryIdempotencyStore::new();
        let tenant = TenantId::parse("org_1").unwrap();
        let expired = IdempotencyRecord::new(
            tenant.clone(),
            "old",
            "fp",
            201,
            Vec::new(),
            chrono::Duration::seconds(-1),
        );
        let live = IdempotencyRecord::new(tenant, "new", "fp", 201, Vec::new(), chrono::Duration::hours(1));
        store.put(&expired).await.unwrap();
        store.put(&live).await.unwrap();

        let metrics = IdempotencyCleanupMetrics::new();
        purge_once(&store, &metrics).await;

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.records_purged, 1);
        assert_eq!(snapshot.cleanup_cycles, 1);
        assert_eq!(store.record_count(), 1);
    }

    #[tokio::test]
    async fn test_task_stops_on_shutdown() {
        let store: Arc<dyn IdempotencyStore> = Arc::new(InMemoryIdempotencyStore::new());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(idempotency_cleanup_task(
            store,
            IdempotencyCleanupConfig::development(),
            shutdown_rx,
        ));

        shutdown_tx.send(true).unwrap();
        let metrics = handle.await.unwrap();
        assert_eq!(metrics.snapshot().cleanup_errors, 0);
    }
}
