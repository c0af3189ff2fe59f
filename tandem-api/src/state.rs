//! Shared application state for Axum routers.

use std::sync::Arc;
use std::time::Instant;

use tandem_provider::RemoteGateway;
use tandem_storage::{IdempotencyStore, ResourceStore};

use crate::config::ApiConfig;
use crate::middleware::IdempotencyState;
use crate::services::LifecycleService;

/// Application-wide state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    pub lifecycle: LifecycleService,
    pub idempotency: IdempotencyState,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        resources: Arc<dyn ResourceStore>,
        idempotency: Arc<dyn IdempotencyStore>,
        gateway: Arc<dyn RemoteGateway>,
        config: &ApiConfig,
    ) -> Self {
        Self {
            lifecycle: LifecycleService::new(resources, gateway),
            idempotency: IdempotencyState::new(idempotency, config.idempotency.clone()),
            start_time: Instant::now(),
        }
    }
}

crate::impl_from_ref!(LifecycleService, lifecycle);
crate::impl_from_ref!(IdempotencyState, idempotency);
crate::impl_from_ref!(Instant, start_time);
