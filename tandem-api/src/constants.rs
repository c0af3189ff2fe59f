//! Constants for TANDEM API
//!
//! Header names, defaults and limits used across the API layer.

// ============================================================================
// HEADERS
// ============================================================================

/// Client-supplied idempotency key on create requests
pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";

/// Set on responses replayed from the idempotency cache
pub const IDEMPOTENCY_REPLAY_HEADER: &str = "x-idempotency-replay";

/// Inbound correlation id
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Principal headers set by the upstream token verifier
pub const PRINCIPAL_USER_HEADER: &str = "x-principal-user";
pub const PRINCIPAL_ORG_HEADER: &str = "x-principal-org";
pub const PRINCIPAL_ROLE_HEADER: &str = "x-principal-role";

// ============================================================================
// IDEMPOTENCY
// ============================================================================

/// Default lifetime of a cached response (24 hours)
pub const DEFAULT_IDEMPOTENCY_TTL_SECS: u64 = 86400;

/// Maximum accepted idempotency key length
pub const MAX_IDEMPOTENCY_KEY_LEN: usize = 256;

// ============================================================================
// CORS
// ============================================================================

/// Default CORS max age in seconds (24 hours)
pub const DEFAULT_CORS_MAX_AGE_SECS: u64 = 86400;

// ============================================================================
// PAGINATION
// ============================================================================

/// Default page size for list operations
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Maximum page size for list operations
pub const MAX_PAGE_SIZE: usize = 500;

// ============================================================================
// BACKGROUND JOBS
// ============================================================================

/// How often expired idempotency records are purged (10 minutes)
pub const DEFAULT_IDEMPOTENCY_CLEANUP_INTERVAL_SECS: u64 = 600;

/// How often the stale `creating` sweep runs (1 minute)
pub const DEFAULT_STALE_SWEEP_INTERVAL_SECS: u64 = 60;

/// Age after which a `creating` record is considered abandoned (15 minutes)
pub const DEFAULT_STALE_CREATING_THRESHOLD_SECS: u64 = 900;

/// Records handled per sweep cycle
pub const DEFAULT_STALE_SWEEP_BATCH_SIZE: usize = 100;

// ============================================================================
// SERVER
// ============================================================================

/// Default listener port
pub const DEFAULT_API_PORT: u16 = 3000;

/// Development server URL
pub const DEV_SERVER_URL: &str = "http://localhost:3000";

/// Largest request or response body buffered by middleware (1MB)
pub const MAX_BODY_BYTES: usize = 1024 * 1024;
