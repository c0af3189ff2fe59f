//! Error Types for TANDEM API
//!
//! This module defines error handling for the API layer, including:
//! - ApiError struct for structured error responses
//! - ErrorCode enum for categorizing errors
//! - IntoResponse implementation for Axum HTTP responses
//! - Conversion from the domain error taxonomy
//!
//! All errors are serialized as JSON with appropriate HTTP status codes.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use tandem_core::{ResourceKind, TandemError, ValidationError};

// ============================================================================
// ERROR CODE ENUM
// ============================================================================

/// Error codes for API responses.
///
/// Each error code maps to a specific HTTP status code and represents
/// a category of error that can occur during API operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // ========================================================================
    // Authentication Errors (401, 403)
    // ========================================================================
    /// Request carries no verified principal
    Unauthorized,

    /// Principal lacks permission for the operation or tenant
    Forbidden,

    // ========================================================================
    // Validation Errors (400)
    // ========================================================================
    /// Request validation failed
    ValidationFailed,

    /// Request body could not be parsed
    InvalidInput,

    /// Required field is missing from request
    MissingField,

    /// Field format is incorrect
    InvalidFormat,

    /// No tenant could be resolved for the request
    TenantUnresolved,

    /// Resource cannot be reconciled into existence
    SyncNotPermitted,

    // ========================================================================
    // Not Found Errors (404)
    // ========================================================================
    /// Requested agent does not exist
    AgentNotFound,

    /// Requested voice does not exist
    VoiceNotFound,

    // ========================================================================
    // Conflict Errors (409)
    // ========================================================================
    /// Idempotency key reused with a different request
    IdempotencyConflict,

    // ========================================================================
    // Upstream Errors (429, 502)
    // ========================================================================
    /// Remote provider rejected or failed the call
    ProviderError,

    /// Remote provider is rate limiting us
    TooManyRequests,

    // ========================================================================
    // Server Errors (500)
    // ========================================================================
    /// Internal server error
    InternalError,

    /// Local state violated an invariant
    ConsistencyViolation,

    /// Database operation failed
    DatabaseError,
}

impl ErrorCode {
    /// Get the HTTP status code for this error code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorCode::Forbidden => StatusCode::FORBIDDEN,

            ErrorCode::ValidationFailed
            | ErrorCode::InvalidInput
            | ErrorCode::MissingField
            | ErrorCode::InvalidFormat
            | ErrorCode::TenantUnresolved
            | ErrorCode::SyncNotPermitted => StatusCode::BAD_REQUEST,

            ErrorCode::AgentNotFound | ErrorCode::VoiceNotFound => StatusCode::NOT_FOUND,

            ErrorCode::IdempotencyConflict => StatusCode::CONFLICT,

            ErrorCode::ProviderError => StatusCode::BAD_GATEWAY,
            ErrorCode::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,

            ErrorCode::InternalError
            | ErrorCode::ConsistencyViolation
            | ErrorCode::DatabaseError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get a default message for this error code.
    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorCode::Unauthorized => "Authentication required",
            ErrorCode::Forbidden => "Access forbidden",
            ErrorCode::ValidationFailed => "Request validation failed",
            ErrorCode::InvalidInput => "Invalid input data",
            ErrorCode::MissingField => "Required field is missing",
            ErrorCode::InvalidFormat => "Invalid format",
            ErrorCode::TenantUnresolved => "Unable to resolve tenant",
            ErrorCode::SyncNotPermitted => "Resource cannot be synced",
            ErrorCode::AgentNotFound => "Agent not found",
            ErrorCode::VoiceNotFound => "Voice not found",
            ErrorCode::IdempotencyConflict => "Idempotency key reused with a different request",
            ErrorCode::ProviderError => "Remote provider request failed",
            ErrorCode::TooManyRequests => "Remote provider rate limit exceeded",
            ErrorCode::InternalError => "Internal server error",
            ErrorCode::ConsistencyViolation => "Internal consistency violation",
            ErrorCode::DatabaseError => "Database operation failed",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ============================================================================
// API ERROR STRUCT
// ============================================================================

/// Structured error response for API operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ApiError {
    /// Error code categorizing the error
    pub code: ErrorCode,

    /// Human-readable error message
    pub message: String,

    /// Optional additional details (offending field, provider status, ...)
    #[serde(skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<Object>))]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    /// Create a new API error with the given code, using the default message.
    pub fn from_code(code: ErrorCode) -> Self {
        Self {
            code,
            message: code.default_message().to_string(),
            details: None,
        }
    }

    /// Add additional details to the error.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        self.code.status_code()
    }

    // ========================================================================
    // Convenience constructors for common errors
    // ========================================================================

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Forbidden, message)
    }

    pub fn validation_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationFailed, message)
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    pub fn missing_field(field: &str) -> Self {
        Self::new(
            ErrorCode::MissingField,
            format!("Required field '{}' is missing", field),
        )
        .with_details(json!({ "field": field }))
    }

    pub fn invalid_format(field: &str, expected: &str) -> Self {
        Self::new(
            ErrorCode::InvalidFormat,
            format!("Field '{}' has invalid format, expected {}", field, expected),
        )
    }

    /// Not found error for a resource kind.
    pub fn resource_not_found(kind: ResourceKind, id: impl fmt::Display) -> Self {
        let code = match kind {
            ResourceKind::Agent => ErrorCode::AgentNotFound,
            ResourceKind::Voice => ErrorCode::VoiceNotFound,
        };
        let label = match kind {
            ResourceKind::Agent => "Agent",
            ResourceKind::Voice => "Voice",
        };
        Self::new(code, format!("{} {} not found", label, id))
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    pub fn database_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DatabaseError, message)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

// ============================================================================
// AXUM INTEGRATION
// ============================================================================

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(self);
        (status, body).into_response()
    }
}

// ============================================================================
// CONVERSIONS FROM DOMAIN ERRORS
// ============================================================================

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        match &err {
            ValidationError::RequiredFieldMissing { field } => ApiError::missing_field(field),
            ValidationError::InvalidValue { field, .. } => {
                ApiError::validation_failed(err.to_string()).with_details(json!({ "field": field }))
            }
            ValidationError::SyncNotPermitted { .. } => {
                ApiError::new(ErrorCode::SyncNotPermitted, err.to_string())
            }
        }
    }
}

/// Domain errors are logged with their request context by the services
/// before they reach this conversion.
impl From<TandemError> for ApiError {
    fn from(err: TandemError) -> Self {
        match err {
            TandemError::Validation(e) => e.into(),
            TandemError::Forbidden(e) => ApiError::forbidden(e.reason),
            TandemError::NotFound(e) => ApiError::resource_not_found(e.kind, e.id),
            TandemError::TenantResolution(e) => {
                ApiError::new(ErrorCode::TenantUnresolved, e.to_string())
            }
            TandemError::IdempotencyConflict(e) => {
                ApiError::new(ErrorCode::IdempotencyConflict, e.to_string())
            }
            TandemError::Provider(e) => {
                let code = if e.is_rate_limited() {
                    ErrorCode::TooManyRequests
                } else {
                    ErrorCode::ProviderError
                };
                // The gateway already scrubbed and truncated the message
                ApiError::new(code, format!("{} request failed: {}", e.provider, e.message))
                    .with_details(json!({
                        "provider": e.provider,
                        "http_status": e.http_status,
                        "provider_details": e.details,
                    }))
            }
            TandemError::Consistency(e) => ApiError::from_code(ErrorCode::ConsistencyViolation)
                .with_details(json!({ "kind": e.kind, "id": e.id })),
            TandemError::Storage(_) => ApiError::database_error("Storage operation failed"),
        }
    }
}

// ============================================================================
// CONVERSIONS FROM STANDARD ERRORS
// ============================================================================

/// Convert from serde_json::Error to ApiError.
impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        tracing::debug!("JSON deserialization error: {:?}", err);
        ApiError::invalid_input(format!("Invalid JSON: {}", err))
    }
}

/// Convert from uuid::Error to ApiError.
impl From<uuid::Error> for ApiError {
    fn from(err: uuid::Error) -> Self {
        ApiError::invalid_format("id", &format!("valid UUID: {}", err))
    }
}

// ============================================================================
// RESULT TYPE ALIAS
// ============================================================================

/// Result type alias for API operations.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use tandem_core::{
        ConsistencyError, ForbiddenError, IdempotencyConflictError, NotFoundError, ProviderError,
        StorageError, TenantResolutionError,
    };
    use uuid::Uuid;

    #[test]
    fn test_error_code_status_mapping() {
        assert_eq!(ErrorCode::Unauthorized.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(ErrorCode::Forbidden.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(ErrorCode::TenantUnresolved.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorCode::VoiceNotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ErrorCode::IdempotencyConflict.status_code(), StatusCode::CONFLICT);
        assert_eq!(ErrorCode::ProviderError.status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(ErrorCode::ConsistencyViolation.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_error_codes_are_closed_set() {
        let known: ErrorCode = serde_json::from_str("\"VOICE_NOT_FOUND\"").unwrap();
        assert_eq!(known, ErrorCode::VoiceNotFound);
        assert!(serde_json::from_str::<ErrorCode>("\"SERVICE_UNAVAILABLE\"").is_err());
        assert!(serde_json::from_str::<ErrorCode>("\"ENTITY_NOT_FOUND\"").is_err());
    }

    #[test]
    fn test_domain_error_mapping() {
        let id = Uuid::now_v7();
        let cases: Vec<(TandemError, StatusCode)> = vec![
            (ValidationError::missing("name").into(), StatusCode::BAD_REQUEST),
            (ForbiddenError::new("admin role required").into(), StatusCode::FORBIDDEN),
            (
                NotFoundError { kind: ResourceKind::Voice, id }.into(),
                StatusCode::NOT_FOUND,
            ),
            (TenantResolutionError.into(), StatusCode::BAD_REQUEST),
            (
                IdempotencyConflictError { key: "k".to_string() }.into(),
                StatusCode::CONFLICT,
            ),
            (
                ProviderError::new("ultravox", Some(500), "boom").into(),
                StatusCode::BAD_GATEWAY,
            ),
            (
                ProviderError::new("ultravox", None, "request timed out after 30s").into(),
                StatusCode::BAD_GATEWAY,
            ),
            (
                ConsistencyError { kind: ResourceKind::Agent, id, reason: "gone".to_string() }.into(),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (StorageError::LockPoisoned.into(), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, status) in cases {
            let api: ApiError = err.clone().into();
            assert_eq!(api.status_code(), status, "{:?}", err);
        }
    }

    #[test]
    fn test_provider_rate_limit_is_passed_through() {
        let api: ApiError = TandemError::from(ProviderError::new("ultravox", Some(429), "slow down")).into();
        assert_eq!(api.code, ErrorCode::TooManyRequests);
        assert_eq!(api.status_code(), StatusCode::TOO_MANY_REQUESTS);
        let details = api.details.unwrap();
        assert_eq!(details["http_status"], 429);
        assert_eq!(details["provider"], "ultravox");
    }

    #[test]
    fn test_storage_errors_do_not_leak_details() {
        let api: ApiError = TandemError::from(StorageError::Backend {
            reason: "password authentication failed for user tandem".to_string(),
        })
        .into();
        assert_eq!(api.code, ErrorCode::DatabaseError);
        assert!(!api.message.contains("password"));
        assert!(api.details.is_none());
    }

    #[test]
    fn test_error_serialization() -> Result<(), serde_json::Error> {
        let err = ApiError::unauthorized("Missing principal");
        let json = serde_json::to_string(&err)?;

        assert!(json.contains("UNAUTHORIZED"));
        assert!(json.contains("Missing principal"));
        assert!(!json.contains("details"));

        let deserialized: ApiError = serde_json::from_str(&json)?;
        assert_eq!(deserialized, err);
        Ok(())
    }

    #[test]
    fn test_error_display() {
        let err = ApiError::resource_not_found(ResourceKind::Agent, "123");
        let display = format!("{}", err);
        assert!(display.contains("AgentNotFound"));
        assert!(display.contains("Agent 123 not found"));
    }
}
