//! Service layer between the HTTP routes and the stores.
//!
//! Services receive the resolved tenant explicitly through [`OpContext`];
//! nothing tenant-specific is held in service state.

pub mod lifecycle_service;

pub use lifecycle_service::{
    CreateOutcome, LifecycleService, NewResource, SweepSummary, SyncOutcome,
};

use tandem_core::{ResourceId, TandemError, TenantId};

/// Per-operation context: who the operation is for and how to correlate
/// its log lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpContext {
    pub tenant_id: TenantId,
    pub correlation_id: String,
}

impl OpContext {
    pub fn new(tenant_id: TenantId, correlation_id: impl Into<String>) -> Self {
        Self {
            tenant_id,
            correlation_id: correlation_id.into(),
        }
    }

    /// Log a failed operation with its context and hand the error back.
    pub fn report(&self, resource_id: Option<ResourceId>, err: TandemError) -> TandemError {
        let resource_id = resource_id.map(|id| id.to_string()).unwrap_or_default();
        match &err {
            TandemError::Consistency(_) | TandemError::Storage(_) => tracing::error!(
                resource_id = %resource_id,
                tenant_id = %self.tenant_id,
                correlation_id = %self.correlation_id,
                error = %err,
                "Resource operation failed"
            ),
            TandemError::Provider(provider_err) => tracing::warn!(
                resource_id = %resource_id,
                tenant_id = %self.tenant_id,
                correlation_id = %self.correlation_id,
                provider = %provider_err.provider,
                http_status = ?provider_err.http_status,
                error = %err,
                "Remote provider call failed"
            ),
            _ => tracing::info!(
                resource_id = %resource_id,
                tenant_id = %self.tenant_id,
                correlation_id = %self.correlation_id,
                error = %err,
                "Resource operation rejected"
            ),
        }
        err
    }
}
