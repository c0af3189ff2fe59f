//! In-memory stores backed by `Arc<RwLock<HashMap>>`.

use crate::{
    IdempotencyRecord, IdempotencyStore, ResourceFilter, ResourceKey, ResourceStore,
    StorageResult,
};
use ::async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tandem_core::{
    Resource, ResourceId, ResourcePatch, ResourceStatus, StorageError, TenantId, Timestamp,
};

/// In-memory resource store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryResourceStore {
    resources: Arc<RwLock<HashMap<ResourceId, Resource>>>,
}

impl InMemoryResourceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of stored resources, across tenants.
    pub fn resource_count(&self) -> usize {
        self.resources.read().map(|r| r.len()).unwrap_or(0)
    }
}

#[async_trait]
impl ResourceStore for InMemoryResourceStore {
    async fn insert(&self, resource: &Resource) -> StorageResult<()> {
        let mut resources = self
            .resources
            .write()
            .map_err(|_| StorageError::LockPoisoned)?;
        if resources.contains_key(&resource.id) {
            return Err(StorageError::InsertFailed {
                kind: resource.kind(),
                id: resource.id,
                reason: "already exists".to_string(),
            });
        }
        resources.insert(resource.id, resource.clone());
        Ok(())
    }

    async fn select(&self, filter: &ResourceFilter) -> StorageResult<Vec<Resource>> {
        let resources = self
            .resources
            .read()
            .map_err(|_| StorageError::LockPoisoned)?;
        let mut matched: Vec<Resource> = resources
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        if let Some(limit) = filter.limit {
            matched.truncate(limit);
        }
        Ok(matched)
    }

    async fn update(
        &self,
        key: &ResourceKey,
        patch: &ResourcePatch,
    ) -> StorageResult<Option<Resource>> {
        let mut resources = self
            .resources
            .write()
            .map_err(|_| StorageError::LockPoisoned)?;
        match resources.get_mut(&key.id) {
            Some(resource) if resource.tenant_id == key.tenant_id => {
                resource.apply(patch);
                Ok(Some(resource.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn delete(&self, key: &ResourceKey) -> StorageResult<bool> {
        let mut resources = self
            .resources
            .write()
            .map_err(|_| StorageError::LockPoisoned)?;
        let owned = resources
            .get(&key.id)
            .is_some_and(|r| r.tenant_id == key.tenant_id);
        if owned {
            resources.remove(&key.id);
        }
        Ok(owned)
    }

    async fn select_stuck(
        &self,
        status: ResourceStatus,
        updated_before: Timestamp,
        limit: usize,
    ) -> StorageResult<Vec<Resource>> {
        let resources = self
            .resources
            .read()
            .map_err(|_| StorageError::LockPoisoned)?;
        let mut stuck: Vec<Resource> = resources
            .values()
            .filter(|r| r.status == status && r.updated_at < updated_before)
            .cloned()
            .collect();
        stuck.sort_by(|a, b| a.updated_at.cmp(&b.updated_at));
        stuck.truncate(limit);
        Ok(stuck)
    }
}

/// In-memory idempotency store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryIdempotencyStore {
    records: Arc<RwLock<HashMap<(TenantId, String), IdempotencyRecord>>>,
}

impl InMemoryIdempotencyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_count(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }
}

#[async_trait]
impl IdempotencyStore for InMemoryIdempotencyStore {
    async fn get(
        &self,
        tenant_id: &TenantId,
        key: &str,
    ) -> StorageResult<Option<IdempotencyRecord>> {
        let records = self
            .records
            .read()
            .map_err(|_| StorageError::LockPoisoned)?;
        let now = chrono::Utc::now();
        Ok(records
            .get(&(tenant_id.clone(), key.to_string()))
            .filter(|record| !record.is_expired(now))
            .cloned())
    }

    async fn put(&self, record: &IdempotencyRecord) -> StorageResult<bool> {
        let mut records = self
            .records
            .write()
            .map_err(|_| StorageError::LockPoisoned)?;
        let slot = (record.tenant_id.clone(), record.key.clone());
        let now = chrono::Utc::now();
        if records.get(&slot).is_some_and(|existing| !existing.is_expired(now)) {
            return Ok(false);
        }
        records.insert(slot, record.clone());
        Ok(true)
    }

    async fn purge_expired(&self, now: Timestamp) -> StorageResult<u64> {
        let mut records = self
            .records
            .write()
            .map_err(|_| StorageError::LockPoisoned)?;
        let before = records.len();
        records.retain(|_, record| !record.is_expired(now));
        Ok((before - records.len()) as u64)
    }
}

// ============================================================================
// TESTS
// ============================================================================
