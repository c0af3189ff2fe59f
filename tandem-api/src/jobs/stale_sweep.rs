//! Stale `creating` Sweep Background Task
//!
//! A create saga that dies between the local insert and the commit leaves
//! its record in `creating`. Records older than the threshold are settled
//! through the lifecycle service: promoted or reconciled when post-hoc sync
//! is permitted, otherwise compensated with the kind's failure policy.

use crate::constants::{
    DEFAULT_STALE_CREATING_THRESHOLD_SECS, DEFAULT_STALE_SWEEP_BATCH_SIZE,
    DEFAULT_STALE_SWEEP_INTERVAL_SECS,
};
use crate::services::{LifecycleService, SweepSummary};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Debug, Clone)]
pub struct StaleSweepConfig {
    /// How often to scan (default: 60 seconds)
    pub check_interval: Duration,

    /// Age after which a `creating` record is considered abandoned
    /// (default: 15 minutes)
    pub stale_after: Duration,

    /// Records handled per cycle (default: 100)
    pub batch_size: usize,
}

impl Default for StaleSweepConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(DEFAULT_STALE_SWEEP_INTERVAL_SECS),
            stale_after: Duration::from_secs(DEFAULT_STALE_CREATING_THRESHOLD_SECS),
            batch_size: DEFAULT_STALE_SWEEP_BATCH_SIZE,
        }
    }
}

impl StaleSweepConfig {
    /// Create StaleSweepConfig from environment variables.
    ///
    /// # Environment Variables
    /// - `TANDEM_SWEEP_CHECK_INTERVAL_SECS` (default: 60)
    /// - `TANDEM_SWEEP_STALE_AFTER_SECS` (default: 900)
    /// - `TANDEM_SWEEP_BATCH_SIZE` (default: 100)
    pub fn from_env() -> Self {
        let check_interval = Duration::from_secs(
            std::env::var("TANDEM_SWEEP_CHECK_INTERVAL_SECS")
                .ok()
                .and_then(|s| s.parse::<u64>().ok())
                .filter(|secs| *secs > 0)
                .unwrap_or(DEFAULT_STALE_SWEEP_INTERVAL_SECS),
        );

        let stale_after = Duration::from_secs(
            std::env::var("TANDEM_SWEEP_STALE_AFTER_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_STALE_CREATING_THRESHOLD_SECS),
        );

        let batch_size = std::env::var("TANDEM_SWEEP_BATCH_SIZE")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_STALE_SWEEP_BATCH_SIZE);

        Self {
            check_interval,
            stale_after,
            batch_size,
        }
    }

    /// Shorter thresholds for development/testing.
    pub fn development() -> Self {
        Self {
            check_interval: Duration::from_secs(10),
            stale_after: Duration::from_secs(60),
            batch_size: 10,
        }
    }

    pub fn production() -> Self {
        Self {
            check_interval: Duration::from_secs(DEFAULT_STALE_SWEEP_INTERVAL_SECS),
            stale_after: Duration::from_secs(1800), // 30 minutes
            batch_size: DEFAULT_STALE_SWEEP_BATCH_SIZE,
        }
    }
}

// ============================================================================
// METRICS
// ============================================================================

#[derive(Debug, Default)]
pub struct StaleSweepMetrics {
    pub records_promoted: AtomicU64,
    pub records_reconciled: AtomicU64,
    pub records_drafted: AtomicU64,
    pub records_failed: AtomicU64,
    pub records_rolled_back: AtomicU64,
    pub sweep_cycles: AtomicU64,
    /// Scan failures plus per-record failures
    pub sweep_errors: AtomicU64,
}

impl StaleSweepMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, summary: &SweepSummary) {
        self.records_promoted
            .fetch_add(summary.promoted, Ordering::Relaxed);
        self.records_reconciled
            .fetch_add(summary.reconciled, Ordering::Relaxed);
        self.records_drafted
            .fetch_add(summary.drafted, Ordering::Relaxed);
        self.records_failed
            .fetch_add(summary.failed, Ordering::Relaxed);
        self.records_rolled_back
            .fetch_add(summary.rolled_back, Ordering::Relaxed);
        self.sweep_errors
            .fetch_add(summary.errors, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StaleSweepSnapshot {
        StaleSweepSnapshot {
            records_promoted: self.records_promoted.load(Ordering::Relaxed),
            records_reconciled: self.records_reconciled.load(Ordering::Relaxed),
            records_drafted: self.records_drafted.load(Ordering::Relaxed),
            records_failed: self.records_failed.load(Ordering::Relaxed),
            records_rolled_back: self.records_rolled_back.load(Ordering::Relaxed),
            sweep_cycles: self.sweep_cycles.load(Ordering::Relaxed),
            sweep_errors: self.sweep_errors.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaleSweepSnapshot {
    pub records_promoted: u64,
    pub records_reconciled: u64,
    pub records_drafted: u64,
    pub records_failed: u64,
    pub records_rolled_back: u64,
    pub sweep_cycles: u64,
    pub sweep_errors: u64,
}

// ============================================================================
// BACKGROUND TASK
// ============================================================================

/// Settle stale `creating` records every `config.check_interval` until
/// shutdown.
pub async fn stale_creating_sweep_task(
    lifecycle: LifecycleService,
    config: StaleSweepConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Arc<StaleSweepMetrics> {
    let metrics = Arc::new(StaleSweepMetrics::new());

    let mut ticker = interval(config.check_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tracing::info!(
        check_interval_secs = config.check_interval.as_secs(),
        stale_after_secs = config.stale_after.as_secs(),
        batch_size = config.batch_size,
        "Stale creating sweep task started"
    );

    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    tracing::info!("Stale creating sweep task shutting down");
                    break;
                }
            }
            _ = ticker.tick() => {
                sweep_once(&lifecycle, &config, &metrics).await;
            }
        }
    }

    let snapshot = metrics.snapshot();
    tracing::info!(
        records_promoted = snapshot.records_promoted,
        records_reconciled = snapshot.records_reconciled,
        records_failed = snapshot.records_failed,
        records_rolled_back = snapshot.records_rolled_back,
        sweep_cycles = snapshot.sweep_cycles,
        sweep_errors = snapshot.sweep_errors,
        "Stale creating sweep task completed"
    );
    metrics
}

async fn sweep_once(
    lifecycle: &LifecycleService,
    config: &StaleSweepConfig,
    metrics: &StaleSweepMetrics,
) {
    metrics.sweep_cycles.fetch_add(1, Ordering::Relaxed);

    let older_than = match chrono::Duration::from_std(config.stale_after) {
        Ok(age) => age,
        Err(e) => {
            tracing::error!(error = %e, "Stale threshold out of range");
            metrics.sweep_errors.fetch_add(1, Ordering::Relaxed);
            return;
        }
    };

    match lifecycle.sweep_stuck(older_than, config.batch_size).await {
        Ok(summary) if summary.scanned == 0 => {
            tracing::trace!("Stale sweep found no abandoned records");
        }
        Ok(summary) => {
            metrics.record(&summary);
            tracing::info!(
                scanned = summary.scanned,
                promoted = summary.promoted,
                reconciled = summary.reconciled,
                drafted = summary.drafted,
                failed = summary.failed,
                rolled_back = summary.rolled_back,
                errors = summary.errors,
                "Stale sweep cycle completed"
            );
        }
        Err(e) => {
            metrics.sweep_errors.fetch_add(1, Ordering::Relaxed);
            tracing::error!(error = %e, "Failed to scan for stale records");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tandem_core::{Resource, ResourceSpec, ResourceStatus};
    use tandem_storage::{ResourceFilter, ResourceStore};
    use tandem_test_utils::{fixtures, InMemoryResourceStore, ScriptedGateway};

    #[test]
    fn test_config_presets() {
        let config = StaleSweepConfig::default();
        assert_eq!(config.check_interval, Duration::from_secs(60));
        assert_eq!(config.stale_after, Duration::from_secs(900));
        assert_eq!(config.batch_size, 100);
        assert!(StaleSweepConfig::development().stale_after < StaleSweepConfig::production().stale_after);
    }

    fn abandoned(tenant: &tandem_core::TenantId, name: &str, spec: ResourceSpec) -> Resource {
        let mut resource = Resource::new(tenant.clone(), name, None, spec);
        resource.updated_at = chrono::Utc::now() - chrono::Duration::hours(2);
        resource
    }

    #[tokio::test]
    async fn test_sweep_once_rolls_back_abandoned_custom_voice() {
        let store = InMemoryResourceStore::new();
        let lifecycle = LifecycleService::new(Arc::new(store.clone()), Arc::new(ScriptedGateway::new()));

        let tenant = fixtures::tenant("org_a");
        let voice = abandoned(
            &tenant,
            "Founder clone",
            ResourceSpec::Voice(fixtures::custom_voice_spec()),
        );
        store.insert(&voice).await.unwrap();

        let metrics = StaleSweepMetrics::new();
        sweep_once(&lifecycle, &StaleSweepConfig::default(), &metrics).await;

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.sweep_cycles, 1);
        assert_eq!(snapshot.records_rolled_back, 1);
        assert_eq!(snapshot.records_failed, 0);
        assert_eq!(snapshot.sweep_errors, 0);

        let stored = store
            .select_one(&ResourceFilter::tenant(tenant).id(voice.id))
            .await
            .unwrap();
        assert!(stored.is_none());
    }

    #[tokio::test]
    async fn test_sweep_once_applies_each_kind_policy_when_promotion_fails() {
        let store = InMemoryResourceStore::new();
        let gateway = ScriptedGateway::new();
        let lifecycle = LifecycleService::new(Arc::new(store.clone()), Arc::new(gateway.clone()));

        let tenant = fixtures::tenant("org_a");
        let mut synced = Resource::new(
            tenant.clone(),
            "Narrator",
            None,
            ResourceSpec::Voice(fixtures::reference_voice_spec("el_narrator")),
        );
        synced.status = ResourceStatus::Active;
        synced.remote_id = Some("uv_voice_1".to_string());
        store.insert(&synced).await.unwrap();

        let voice = abandoned(
            &tenant,
            "Stuck narrator",
            ResourceSpec::Voice(fixtures::reference_voice_spec("el_stuck")),
        );
        store.insert(&voice).await.unwrap();
        let agent = abandoned(
            &tenant,
            "Stuck agent",
            ResourceSpec::Agent(fixtures::agent_spec(Some(synced.id))),
        );
        store.insert(&agent).await.unwrap();
        gateway.fail_creates(tandem_test_utils::provider_error(500));

        let metrics = StaleSweepMetrics::new();
        sweep_once(&lifecycle, &StaleSweepConfig::default(), &metrics).await;

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.records_rolled_back, 1);
        assert_eq!(snapshot.records_failed, 1);
        assert_eq!(snapshot.records_promoted, 0);

        let voice_row = store
            .select_one(&ResourceFilter::tenant(tenant.clone()).id(voice.id))
            .await
            .unwrap();
        assert!(voice_row.is_none());
        let agent_row = store
            .select_one(&ResourceFilter::tenant(tenant).id(agent.id))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(agent_row.status, ResourceStatus::Failed);
        assert!(agent_row.remote_id.is_none());
    }

    #[tokio::test]
    async fn test_task_stops_on_shutdown() {
        let lifecycle = LifecycleService::new(
            Arc::new(InMemoryResourceStore::new()),
            Arc::new(ScriptedGateway::new()),
        );
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(stale_creating_sweep_task(
            lifecycle,
            StaleSweepConfig::development(),
            shutdown_rx,
        ));

        shutdown_tx.send(true).unwrap();
        let metrics = handle.await.unwrap();
        assert_eq!(metrics.snapshot().sweep_errors, 0);
    }
}
