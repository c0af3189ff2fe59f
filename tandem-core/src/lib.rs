//! TANDEM Core - Resource Types
//!
//! Data types shared by every TANDEM crate: tenant-owned resources mirrored
//! into a remote voice provider, the error taxonomy, tenant resolution and
//! the pure drift reconciliation engine.

pub mod enums;
pub mod error;
pub mod reconcile;
pub mod resource;
pub mod tenant;

pub use enums::*;
pub use error::*;
pub use reconcile::{map_provider_status, reconcile, Difference, DriftReport, RemoteSnapshot};
pub use resource::*;
pub use tenant::{resolve_tenant, Principal, TenantCandidates, TenantId};

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use uuid::Uuid;

// ============================================================================
// IDENTITY TYPES
// ============================================================================

/// Resource identifier using UUIDv7 for timestamp-sortable IDs.
pub type ResourceId = Uuid;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// SHA-256 content hash used for request fingerprints.
pub type ContentHash = [u8; 32];

/// Generate a new UUIDv7 ResourceId (timestamp-sortable).
pub fn new_resource_id() -> ResourceId {
    Uuid::now_v7()
}

/// Compute SHA-256 hash of content.
pub fn compute_content_hash(content: &[u8]) -> ContentHash {
    let mut hasher = Sha256::new();
    hasher.update(content);
    let result = hasher.finalize();
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&result);
    hash
}

/// Hex-encoded SHA-256 of content, the form fingerprints are persisted in.
pub fn content_fingerprint(content: &[u8]) -> String {
    hex::encode(compute_content_hash(content))
}
