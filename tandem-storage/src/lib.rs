//! TANDEM Storage Layer
//!
//! Async, tenant-scoped persistence traits consumed by the lifecycle
//! service, plus in-memory implementations used by tests and by the server
//! when no database is configured.
//!
//! Every resource read and write takes a [`TenantId`]; a filter cannot be
//! built without one.

mod memory;

pub use memory::{InMemoryIdempotencyStore, InMemoryResourceStore};

use ::async_trait::async_trait;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use tandem_core::{
    Resource, ResourceId, ResourceKind, ResourcePatch, ResourceStatus, StorageError, TenantId,
    Timestamp,
};

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

// ============================================================================
// RESOURCE STORE
// ============================================================================

/// Primary key of a resource within its tenant partition.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceKey {
    pub tenant_id: TenantId,
    pub id: ResourceId,
}

impl ResourceKey {
    pub fn new(tenant_id: TenantId, id: ResourceId) -> Self {
        Self { tenant_id, id }
    }

    pub fn of(resource: &Resource) -> Self {
        Self::new(resource.tenant_id.clone(), resource.id)
    }
}

/// Filter map for selects. The tenant partition column is mandatory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceFilter {
    pub tenant_id: TenantId,
    pub id: Option<ResourceId>,
    pub kind: Option<ResourceKind>,
    pub status: Option<ResourceStatus>,
    pub remote_id: Option<String>,
    pub provider_voice_id: Option<String>,
    /// Only resources carrying a remote id
    pub has_remote_id: Option<bool>,
    pub limit: Option<usize>,
}

impl ResourceFilter {
    pub fn tenant(tenant_id: TenantId) -> Self {
        Self {
            tenant_id,
            id: None,
            kind: None,
            status: None,
            remote_id: None,
            provider_voice_id: None,
            has_remote_id: None,
            limit: None,
        }
    }

    pub fn key(key: &ResourceKey) -> Self {
        Self::tenant(key.tenant_id.clone()).id(key.id)
    }

    pub fn id(mut self, id: ResourceId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn kind(mut self, kind: ResourceKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn status(mut self, status: ResourceStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn remote_id(mut self, remote_id: impl Into<String>) -> Self {
        self.remote_id = Some(remote_id.into());
        self
    }

    pub fn provider_voice_id(mut self, provider_voice_id: impl Into<String>) -> Self {
        self.provider_voice_id = Some(provider_voice_id.into());
        self
    }

    pub fn has_remote_id(mut self, has_remote_id: bool) -> Self {
        self.has_remote_id = Some(has_remote_id);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether a resource passes every set criterion.
    pub fn matches(&self, resource: &Resource) -> bool {
        if resource.tenant_id != self.tenant_id {
            return false;
        }
        if self.id.is_some_and(|id| id != resource.id) {
            return false;
        }
        if self.kind.is_some_and(|kind| kind != resource.kind()) {
            return false;
        }
        if self.status.is_some_and(|status| status != resource.status) {
            return false;
        }
        if let Some(remote_id) = &self.remote_id {
            if resource.remote_id.as_ref() != Some(remote_id) {
                return false;
            }
        }
        if let Some(provider_voice_id) = &self.provider_voice_id {
            let candidate = resource
                .as_voice()
                .and_then(|voice| voice.provider_voice_id.as_ref());
            if candidate != Some(provider_voice_id) {
                return false;
            }
        }
        if self
            .has_remote_id
            .is_some_and(|wanted| wanted != resource.remote_id.is_some())
        {
            return false;
        }
        true
    }
}

/// Tenant-scoped resource persistence.
///
/// Writes are single-row and keyed by (tenant, id); no multi-row
/// transactions are required by callers.
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Insert a new resource. Fails if the id already exists.
    async fn insert(&self, resource: &Resource) -> StorageResult<()>;

    /// Select matching resources, newest first.
    async fn select(&self, filter: &ResourceFilter) -> StorageResult<Vec<Resource>>;

    /// Select the first matching resource.
    async fn select_one(&self, filter: &ResourceFilter) -> StorageResult<Option<Resource>> {
        let mut filter = filter.clone();
        filter.limit = Some(1);
        Ok(self.select(&filter).await?.into_iter().next())
    }

    /// Apply a patch to the resource at `key`. Returns the updated row, or
    /// `None` when nothing matched (including a tenant mismatch).
    async fn update(&self, key: &ResourceKey, patch: &ResourcePatch)
        -> StorageResult<Option<Resource>>;

    /// Hard-delete the resource at `key`. Returns whether a row was removed.
    async fn delete(&self, key: &ResourceKey) -> StorageResult<bool>;

    /// Maintenance scan across tenants: resources in `status` not updated
    /// since `updated_before`. Not reachable from request handlers.
    async fn select_stuck(
        &self,
        status: ResourceStatus,
        updated_before: Timestamp,
        limit: usize,
    ) -> StorageResult<Vec<Resource>>;
}

// ============================================================================
// IDEMPOTENCY STORE
// ============================================================================

/// Cached outcome of a completed request, keyed by (tenant, key).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdempotencyRecord {
    pub tenant_id: TenantId,
    pub key: String,
    /// Hex SHA-256 of the request fingerprint material
    pub fingerprint: String,
    pub status_code: u16,
    /// Serialized response body, replayed byte for byte
    pub response_body: Vec<u8>,
    pub created_at: Timestamp,
    pub expires_at: Timestamp,
}

impl IdempotencyRecord {
    pub fn new(
        tenant_id: TenantId,
        key: impl Into<String>,
        fingerprint: impl Into<String>,
        status_code: u16,
        response_body: Vec<u8>,
        ttl: Duration,
    ) -> Self {
        let now = chrono::Utc::now();
        Self {
            tenant_id,
            key: key.into(),
            fingerprint: fingerprint.into(),
            status_code,
            response_body,
            created_at: now,
            expires_at: now + ttl,
        }
    }

    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.expires_at <= now
    }
}

/// Persistence for idempotency records. Records are immutable once stored.
#[async_trait]
pub trait IdempotencyStore: Send + Sync {
    /// Fetch a live record. Expired records read as absent.
    async fn get(&self, tenant_id: &TenantId, key: &str) -> StorageResult<Option<IdempotencyRecord>>;

    /// Store a record unless a live one already exists for (tenant, key).
    /// Returns whether this call stored it; existing records are never
    /// overwritten.
    async fn put(&self, record: &IdempotencyRecord) -> StorageResult<bool>;

    /// Remove records expired at `now`. Returns how many were removed.
    async fn purge_expired(&self, now: Timestamp) -> StorageResult<u64>;
}
