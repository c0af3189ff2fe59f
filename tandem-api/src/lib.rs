//! TANDEM API - REST layer and saga orchestration
//!
//! Exposes tenant-scoped CRUD for voice agents and voices over Axum and
//! keeps each resource mirrored in the Ultravox provider. Creates run as
//! compensating sagas; retries are deduplicated by the idempotency
//! middleware.

pub mod auth;
pub mod config;
pub mod constants;
pub mod db;
pub mod error;
pub mod jobs;
pub mod macros;
pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod services;
pub mod state;
pub mod telemetry;
pub mod types;

// Re-export commonly used types
pub use auth::{authorize_tenant, Access, RequestContext};
pub use config::{ApiConfig, IdempotencyConfig};
pub use db::{DbConfig, DbError, PgStore};
pub use error::{ApiError, ApiResult, ErrorCode};
pub use jobs::{
    idempotency_cleanup_task, stale_creating_sweep_task, IdempotencyCleanupConfig,
    StaleSweepConfig,
};
pub use middleware::{idempotency_middleware, IdempotencyState};
pub use openapi::ApiDoc;
pub use routes::create_api_router;
pub use services::{LifecycleService, OpContext};
pub use state::AppState;
pub use types::*;
