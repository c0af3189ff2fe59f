//! Error types for TANDEM operations

use crate::{ResourceId, ResourceKind};
use serde_json::Value;
use thiserror::Error;

/// Client-correctable input errors. Never retried.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("{kind} {id} cannot be synced: {reason}")]
    SyncNotPermitted {
        kind: ResourceKind,
        id: ResourceId,
        reason: String,
    },
}

impl ValidationError {
    pub fn missing(field: impl Into<String>) -> Self {
        ValidationError::RequiredFieldMissing {
            field: field.into(),
        }
    }

    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ValidationError::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Permission failure, evaluated before any persistence.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Forbidden: {reason}")]
pub struct ForbiddenError {
    pub reason: String,
}

impl ForbiddenError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// A tenant-scoped lookup found nothing.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Resource not found: {kind} with id {id}")]
pub struct NotFoundError {
    pub kind: ResourceKind,
    pub id: ResourceId,
}

/// None of the tenant candidates carried a usable value.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("Unable to resolve tenant: no non-empty tenant identifier in request or principal")]
pub struct TenantResolutionError;

/// An idempotency key was reused with a different request body.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Idempotency key '{key}' was already used with a different request")]
pub struct IdempotencyConflictError {
    pub key: String,
}

/// Failure talking to the remote provider: non-2xx, transport error,
/// timeout or an undecodable success body.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Request to {provider} failed{}: {message}", status_suffix(.http_status))]
pub struct ProviderError {
    pub provider: String,
    /// HTTP status returned by the provider, `None` for transport failures
    pub http_status: Option<u16>,
    pub message: String,
    pub details: Value,
}

fn status_suffix(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!(" with status {}", code),
        None => String::new(),
    }
}

impl ProviderError {
    pub fn new(provider: impl Into<String>, http_status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            http_status,
            message: message.into(),
            details: Value::Null,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }

    /// Whether the provider asked us to slow down.
    pub fn is_rate_limited(&self) -> bool {
        self.http_status == Some(429)
    }
}

/// An internal invariant was violated. Always a bug.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Consistency violation on {kind} {id}: {reason}")]
pub struct ConsistencyError {
    pub kind: ResourceKind,
    pub id: ResourceId,
    pub reason: String,
}

/// Local persistence errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Insert failed for {kind} {id}: {reason}")]
    InsertFailed {
        kind: ResourceKind,
        id: ResourceId,
        reason: String,
    },

    #[error("Update failed for {id}: {reason}")]
    UpdateFailed { id: ResourceId, reason: String },

    #[error("Storage lock poisoned")]
    LockPoisoned,

    #[error("Storage backend error: {reason}")]
    Backend { reason: String },

    #[error("Corrupt row for {id}: {reason}")]
    CorruptRow { id: String, reason: String },
}

/// Master error type for all TANDEM errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TandemError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("{0}")]
    Forbidden(#[from] ForbiddenError),

    #[error("{0}")]
    NotFound(#[from] NotFoundError),

    #[error("{0}")]
    TenantResolution(#[from] TenantResolutionError),

    #[error("{0}")]
    IdempotencyConflict(#[from] IdempotencyConflictError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("{0}")]
    Consistency(#[from] ConsistencyError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Result type alias for TANDEM operations.
pub type TandemResult<T> = Result<T, TandemError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_provider_error_display_with_status() {
        let err = ProviderError::new("ultravox", Some(500), "upstream exploded");
        let msg = format!("{}", err);
        assert!(msg.contains("ultravox"));
        assert!(msg.contains("500"));
        assert!(msg.contains("upstream exploded"));
    }

    #[test]
    fn test_provider_error_display_without_status() {
        let err = ProviderError::new("ultravox", None, "request timed out after 30s");
        let msg = format!("{}", err);
        assert!(!msg.contains("status"));
        assert!(msg.contains("timed out"));
    }

    #[test]
    fn test_not_found_display() {
        let err = NotFoundError {
            kind: ResourceKind::Voice,
            id: Uuid::nil(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("voice"));
        assert!(msg.contains("00000000-0000-0000-0000-000000000000"));
    }

    #[test]
    fn test_idempotency_conflict_display() {
        let err = IdempotencyConflictError {
            key: "abc-123".to_string(),
        };
        assert!(format!("{}", err).contains("abc-123"));
    }

    #[test]
    fn test_tandem_error_from_variants() {
        let storage = TandemError::from(StorageError::LockPoisoned);
        assert!(matches!(storage, TandemError::Storage(_)));

        let validation = TandemError::from(ValidationError::missing("name"));
        assert!(matches!(validation, TandemError::Validation(_)));

        let tenant = TandemError::from(TenantResolutionError);
        assert!(matches!(tenant, TandemError::TenantResolution(_)));

        let provider = TandemError::from(ProviderError::new("ultravox", Some(429), "slow down"));
        assert!(matches!(provider, TandemError::Provider(ref p) if p.is_rate_limited()));
    }
}
