//! Background Jobs for TANDEM API
//!
//! - `idempotency_cleanup`: purges expired idempotency records
//! - `stale_sweep`: resolves resources left in `creating` by a crashed saga
//!
//! Both run until the shutdown watch flips to `true`:
//!
//! ```ignore
//! let (shutdown_tx, shutdown_rx) = watch::channel(false);
//! tokio::spawn(idempotency_cleanup_task(store, IdempotencyCleanupConfig::from_env(), shutdown_rx.clone()));
//! tokio::spawn(stale_creating_sweep_task(lifecycle, StaleSweepConfig::from_env(), shutdown_rx));
//!
//! let _ = shutdown_tx.send(true);
//! ```

pub mod idempotency_cleanup;
pub mod stale_sweep;

pub use idempotency_cleanup::{
    idempotency_cleanup_task, IdempotencyCleanupConfig, IdempotencyCleanupMetrics,
    IdempotencyCleanupSnapshot,
};
pub use stale_sweep::{
    stale_creating_sweep_task, StaleSweepConfig, StaleSweepMetrics, StaleSweepSnapshot,
};
