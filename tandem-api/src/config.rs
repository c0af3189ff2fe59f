//! API Configuration Module
//!
//! CORS and idempotency settings. Configuration is loaded from environment
//! variables with defaults suited to development.

use crate::constants::{
    DEFAULT_CORS_MAX_AGE_SECS, DEFAULT_IDEMPOTENCY_TTL_SECS, IDEMPOTENCY_KEY_HEADER,
    MAX_IDEMPOTENCY_KEY_LEN,
};
use std::time::Duration;

// ============================================================================
// API CONFIGURATION
// ============================================================================

/// API configuration for CORS and request deduplication.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Allowed CORS origins (comma-separated in env var).
    /// Empty means allow all origins (dev mode).
    pub cors_origins: Vec<String>,

    /// Whether to allow credentials in CORS requests.
    pub cors_allow_credentials: bool,

    /// Max age for CORS preflight cache in seconds.
    pub cors_max_age_secs: u64,

    pub idempotency: IdempotencyConfig,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            cors_origins: Vec::new(),
            cors_allow_credentials: false,
            cors_max_age_secs: DEFAULT_CORS_MAX_AGE_SECS,
            idempotency: IdempotencyConfig::default(),
        }
    }
}

impl ApiConfig {
    /// Create ApiConfig from environment variables.
    ///
    /// Environment variables:
    /// - `TANDEM_CORS_ORIGINS`: Comma-separated allowed origins (empty = allow all)
    /// - `TANDEM_CORS_ALLOW_CREDENTIALS`: "true" or "false" (default: false)
    /// - `TANDEM_CORS_MAX_AGE_SECS`: Preflight cache duration (default: 86400)
    /// - `TANDEM_IDEMPOTENCY_TTL_SECS`: Cached response lifetime (default: 86400)
    pub fn from_env() -> Self {
        let cors_origins = std::env::var("TANDEM_CORS_ORIGINS")
            .ok()
            .map(|s| {
                s.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let cors_allow_credentials = std::env::var("TANDEM_CORS_ALLOW_CREDENTIALS")
            .ok()
            .map(|s| s.to_lowercase() == "true")
            .unwrap_or(false);

        let cors_max_age_secs = std::env::var("TANDEM_CORS_MAX_AGE_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_CORS_MAX_AGE_SECS);

        Self {
            cors_origins,
            cors_allow_credentials,
            cors_max_age_secs,
            idempotency: IdempotencyConfig::from_env(),
        }
    }

    /// Check if running in production mode (strict CORS).
    pub fn is_production(&self) -> bool {
        !self.cors_origins.is_empty()
    }

    /// Check if a given origin is allowed.
    pub fn is_origin_allowed(&self, origin: &str) -> bool {
        if self.cors_origins.is_empty() {
            return true;
        }

        self.cors_origins.iter().any(|allowed| {
            if allowed == origin {
                return true;
            }
            // *.example.com
            if let Some(pattern) = allowed.strip_prefix("*.") {
                if let Some(origin_domain) = origin.strip_prefix("https://") {
                    return origin_domain.ends_with(&format!(".{}", pattern));
                }
            }
            false
        })
    }
}

// ============================================================================
// IDEMPOTENCY CONFIGURATION
// ============================================================================

/// Request deduplication settings.
#[derive(Debug, Clone)]
pub struct IdempotencyConfig {
    /// Header carrying the client key.
    pub header_name: &'static str,

    /// How long a cached response can be replayed.
    pub ttl: Duration,

    /// Longest accepted key.
    pub max_key_len: usize,
}

impl Default for IdempotencyConfig {
    fn default() -> Self {
        Self {
            header_name: IDEMPOTENCY_KEY_HEADER,
            ttl: Duration::from_secs(DEFAULT_IDEMPOTENCY_TTL_SECS),
            max_key_len: MAX_IDEMPOTENCY_KEY_LEN,
        }
    }
}

impl IdempotencyConfig {
    pub fn from_env() -> Self {
        let ttl_secs = std::env::var("TANDEM_IDEMPOTENCY_TTL_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .unwrap_or(DEFAULT_IDEMPOTENCY_TTL_SECS);

        Self {
            ttl: Duration::from_secs(ttl_secs),
            ..Self::default()
        }
    }
}
