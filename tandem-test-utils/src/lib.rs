//! TANDEM Test Utilities
//!
//! Shared test infrastructure for the TANDEM workspace:
//! - A scripted in-memory stand-in for the remote provider
//! - A resource store wrapper that records inserts and fails on demand
//! - Fixtures for tenants, principals and resource specs
//! - Proptest generators

pub use tandem_storage::{InMemoryIdempotencyStore, InMemoryResourceStore};

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use tandem_core::{
    ProviderError, RemoteSnapshot, Resource, ResourceId, ResourceKind, ResourcePatch,
    ResourceStatus, StorageError, TenantId, Timestamp,
};
use tandem_provider::{RemoteGateway, RemoteId, RemotePayload};
use tandem_storage::{ResourceFilter, ResourceKey, ResourceStore, StorageResult};

// ============================================================================
// SCRIPTED GATEWAY
// ============================================================================

/// A call observed by [`ScriptedGateway`].
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayCall {
    Create {
        tenant_id: TenantId,
        kind: ResourceKind,
        body: Value,
    },
    Update {
        tenant_id: TenantId,
        remote_id: String,
        body: Value,
    },
    Delete {
        tenant_id: TenantId,
        remote_id: String,
    },
    Fetch {
        tenant_id: TenantId,
        remote_id: String,
    },
}

#[derive(Debug, Default)]
struct GatewayState {
    remote: HashMap<String, RemoteSnapshot>,
    next_ids: VecDeque<String>,
    issued: u64,
    create_failure: Option<ProviderError>,
    update_failure: Option<ProviderError>,
    delete_failure: Option<ProviderError>,
    fetch_failure: Option<ProviderError>,
    calls: Vec<GatewayCall>,
}

/// In-memory provider with scriptable failures.
///
/// Created mirrors are kept so fetches return them; statuses can be changed
/// to simulate provider-side progress.
#[derive(Debug, Clone, Default)]
pub struct ScriptedGateway {
    state: Arc<Mutex<GatewayState>>,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, GatewayState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Queue the id returned by the next successful create.
    pub fn with_next_id(self, id: impl Into<String>) -> Self {
        self.state().next_ids.push_back(id.into());
        self
    }

    pub fn fail_creates(&self, err: ProviderError) {
        self.state().create_failure = Some(err);
    }

    pub fn fail_updates(&self, err: ProviderError) {
        self.state().update_failure = Some(err);
    }

    pub fn fail_deletes(&self, err: ProviderError) {
        self.state().delete_failure = Some(err);
    }

    pub fn fail_fetches(&self, err: ProviderError) {
        self.state().fetch_failure = Some(err);
    }

    /// Clear every scripted failure.
    pub fn heal(&self) {
        let mut state = self.state();
        state.create_failure = None;
        state.update_failure = None;
        state.delete_failure = None;
        state.fetch_failure = None;
    }

    /// Change what the provider reports for a mirror.
    pub fn set_remote_state(&self, remote_id: &str, status: Option<&str>, training_info: Option<Value>) {
        let mut state = self.state();
        let entry = state
            .remote
            .entry(remote_id.to_string())
            .or_insert_with(|| RemoteSnapshot {
                remote_id: remote_id.to_string(),
                status: None,
                training_info: None,
                name: None,
            });
        entry.status = status.map(str::to_string);
        entry.training_info = training_info;
    }

    pub fn remote_exists(&self, remote_id: &str) -> bool {
        self.state().remote.contains_key(remote_id)
    }

    pub fn remote_count(&self) -> usize {
        self.state().remote.len()
    }

    pub fn calls(&self) -> Vec<GatewayCall> {
        self.state().calls.clone()
    }

    pub fn create_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, GatewayCall::Create { .. }))
            .count()
    }

    pub fn update_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, GatewayCall::Update { .. }))
            .count()
    }
}

/// Provider error with a status, as the HTTP gateway would produce.
pub fn provider_error(status: u16) -> ProviderError {
    ProviderError::new("ultravox", Some(status), format!("provider returned HTTP {}", status))
}

#[async_trait]
impl RemoteGateway for ScriptedGateway {
    fn provider(&self) -> &str {
        "ultravox"
    }

    async fn create_resource(
        &self,
        tenant_id: &TenantId,
        payload: &RemotePayload,
    ) -> Result<RemoteId, ProviderError> {
        let mut state = self.state();
        state.calls.push(GatewayCall::Create {
            tenant_id: tenant_id.clone(),
            kind: payload.kind,
            body: payload.body.clone(),
        });
        if let Some(err) = state.create_failure.clone() {
            return Err(err);
        }
        state.issued += 1;
        let id = match state.next_ids.pop_front() {
            Some(id) => id,
            None => format!("uv_{}_{}", payload.kind, state.issued),
        };
        let name = payload.body.get("name").and_then(Value::as_str).map(str::to_string);
        state.remote.insert(
            id.clone(),
            RemoteSnapshot {
                remote_id: id.clone(),
                status: None,
                training_info: None,
                name,
            },
        );
        Ok(RemoteId::new(id))
    }

    async fn update_resource(
        &self,
        tenant_id: &TenantId,
        remote_id: &RemoteId,
        payload: &RemotePayload,
    ) -> Result<(), ProviderError> {
        let mut state = self.state();
        state.calls.push(GatewayCall::Update {
            tenant_id: tenant_id.clone(),
            remote_id: remote_id.to_string(),
            body: payload.body.clone(),
        });
        if let Some(err) = state.update_failure.clone() {
            return Err(err);
        }
        match state.remote.get_mut(remote_id.as_str()) {
            Some(entry) => {
                entry.name = payload.body.get("name").and_then(Value::as_str).map(str::to_string);
                Ok(())
            }
            None => Err(provider_error(404)),
        }
    }

    async fn delete_resource(
        &self,
        tenant_id: &TenantId,
        _kind: ResourceKind,
        remote_id: &RemoteId,
    ) -> Result<(), ProviderError> {
        let mut state = self.state();
        state.calls.push(GatewayCall::Delete {
            tenant_id: tenant_id.clone(),
            remote_id: remote_id.to_string(),
        });
        if let Some(err) = state.delete_failure.clone() {
            return Err(err);
        }
        match state.remote.remove(remote_id.as_str()) {
            Some(_) => Ok(()),
            None => Err(provider_error(404)),
        }
    }

    async fn fetch_resource(
        &self,
        tenant_id: &TenantId,
        _kind: ResourceKind,
        remote_id: &RemoteId,
    ) -> Result<RemoteSnapshot, ProviderError> {
        let mut state = self.state();
        state.calls.push(GatewayCall::Fetch {
            tenant_id: tenant_id.clone(),
            remote_id: remote_id.to_string(),
        });
        if let Some(err) = state.fetch_failure.clone() {
            return Err(err);
        }
        state
            .remote
            .get(remote_id.as_str())
            .cloned()
            .ok_or_else(|| provider_error(404))
    }
}

// ============================================================================
// RECORDING STORE
// ============================================================================

#[derive(Debug, Default)]
struct StoreScript {
    inserted: Vec<ResourceId>,
    fail_updates: bool,
    fail_deletes: bool,
}

/// [`InMemoryResourceStore`] wrapper that remembers every inserted id, so
/// records removed by a rollback can still be addressed, and can be told to
/// fail updates or deletes.
#[derive(Debug, Clone, Default)]
pub struct RecordingResourceStore {
    inner: InMemoryResourceStore,
    script: Arc<Mutex<StoreScript>>,
}

impl RecordingResourceStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn script(&self) -> MutexGuard<'_, StoreScript> {
        self.script.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// The wrapped store, for direct inspection.
    pub fn inner(&self) -> &InMemoryResourceStore {
        &self.inner
    }

    pub fn inserted_ids(&self) -> Vec<ResourceId> {
        self.script().inserted.clone()
    }

    pub fn last_inserted(&self) -> Option<ResourceId> {
        self.script().inserted.last().copied()
    }

    pub fn fail_updates(&self) {
        self.script().fail_updates = true;
    }

    pub fn fail_deletes(&self) {
        self.script().fail_deletes = true;
    }
}

#[async_trait]
impl ResourceStore for RecordingResourceStore {
    async fn insert(&self, resource: &Resource) -> StorageResult<()> {
        self.inner.insert(resource).await?;
        self.script().inserted.push(resource.id);
        Ok(())
    }

    async fn select(&self, filter: &ResourceFilter) -> StorageResult<Vec<Resource>> {
        self.inner.select(filter).await
    }

    async fn update(
        &self,
        key: &ResourceKey,
        patch: &ResourcePatch,
    ) -> StorageResult<Option<Resource>> {
        if self.script().fail_updates {
            return Err(StorageError::UpdateFailed {
                id: key.id,
                reason: "scripted update failure".to_string(),
            });
        }
        self.inner.update(key, patch).await
    }

    async fn delete(&self, key: &ResourceKey) -> StorageResult<bool> {
        if self.script().fail_deletes {
            return Err(StorageError::LockPoisoned);
        }
        self.inner.delete(key).await
    }

    async fn select_stuck(
        &self,
        status: ResourceStatus,
        updated_before: Timestamp,
        limit: usize,
    ) -> StorageResult<Vec<Resource>> {
        self.inner.select_stuck(status, updated_before, limit).await
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built fixtures for common scenarios.

    use tandem_core::{
        AgentSpec, Principal, ResourceId, Role, TenantId, TrainingSample, VoiceSpec, VoiceType,
        DEFAULT_VOICE_LANGUAGE, DEFAULT_VOICE_PROVIDER,
    };

    pub fn tenant(raw: &str) -> TenantId {
        TenantId::parse(raw).unwrap_or_else(|_| panic!("invalid fixture tenant {:?}", raw))
    }

    pub fn admin(tenant: &str) -> Principal {
        Principal::new("user_admin", Some(tenant.to_string()), Role::ClientAdmin)
    }

    pub fn agency_admin(tenant: &str) -> Principal {
        Principal::new("user_agency", Some(tenant.to_string()), Role::AgencyAdmin)
    }

    pub fn member(tenant: &str) -> Principal {
        Principal::new("user_member", Some(tenant.to_string()), Role::Member)
    }

    pub fn agent_spec(voice_id: Option<ResourceId>) -> AgentSpec {
        AgentSpec {
            system_prompt: "You answer billing questions.".to_string(),
            voice_id,
            ..AgentSpec::default()
        }
    }

    pub fn reference_voice_spec(provider_voice_id: &str) -> VoiceSpec {
        VoiceSpec {
            voice_type: VoiceType::Reference,
            provider: DEFAULT_VOICE_PROVIDER.to_string(),
            provider_voice_id: Some(provider_voice_id.to_string()),
            language: DEFAULT_VOICE_LANGUAGE.to_string(),
        }
    }

    pub fn custom_voice_spec() -> VoiceSpec {
        VoiceSpec {
            voice_type: VoiceType::Custom,
            provider: DEFAULT_VOICE_PROVIDER.to_string(),
            provider_voice_id: None,
            language: DEFAULT_VOICE_LANGUAGE.to_string(),
        }
    }

    pub fn training_sample() -> TrainingSample {
        TrainingSample {
            text: "The quick brown fox jumps over the lazy dog.".to_string(),
            audio_url: "https://uploads.example/sample-1.wav".to_string(),
            duration_seconds: Some(4.2),
        }
    }
}

// ============================================================================
// GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies.

    use proptest::prelude::*;
    use tandem_core::{ResourceStatus, TenantId};

    pub fn arb_tenant_id() -> impl Strategy<Value = TenantId> {
        "org_[a-z0-9]{1,12}".prop_map(|raw| TenantId::parse(&raw).unwrap_or_else(|_| unreachable!()))
    }

    /// Two distinct tenants.
    pub fn arb_tenant_pair() -> impl Strategy<Value = (TenantId, TenantId)> {
        (arb_tenant_id(), arb_tenant_id()).prop_filter("tenants must differ", |(a, b)| a != b)
    }

    pub fn arb_resource_name() -> impl Strategy<Value = String> {
        "[A-Z][a-z]{2,10}( [A-Z][a-z]{2,10})?"
    }

    pub fn arb_resource_status() -> impl Strategy<Value = ResourceStatus> {
        prop_oneof![
            Just(ResourceStatus::Draft),
            Just(ResourceStatus::Creating),
            Just(ResourceStatus::Training),
            Just(ResourceStatus::Active),
            Just(ResourceStatus::Failed),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_gateway_issues_queued_ids() {
        let gateway = ScriptedGateway::new().with_next_id("uv_123");
        let tenant = fixtures::tenant("org_1");
        let payload = tandem_provider::agent_payload("A", &fixtures::agent_spec(None), None);

        let first = gateway.create_resource(&tenant, &payload).await.unwrap();
        let second = gateway.create_resource(&tenant, &payload).await.unwrap();
        assert_eq!(first.as_str(), "uv_123");
        assert_ne!(second, first);
        assert_eq!(gateway.create_count(), 2);
        assert_eq!(gateway.remote_count(), 2);
    }

    #[tokio::test]
    async fn test_scripted_failures_are_returned_and_recorded() {
        let gateway = ScriptedGateway::new();
        gateway.fail_creates(provider_error(500));
        let tenant = fixtures::tenant("org_1");
        let payload = tandem_provider::agent_payload("A", &fixtures::agent_spec(None), None);

        let err = gateway.create_resource(&tenant, &payload).await.unwrap_err();
        assert_eq!(err.http_status, Some(500));
        assert_eq!(gateway.create_count(), 1);
        assert_eq!(gateway.remote_count(), 0);

        gateway.heal();
        assert!(gateway.create_resource(&tenant, &payload).await.is_ok());
    }

    #[tokio::test]
    async fn test_recording_store_remembers_deleted_ids() {
        let store = RecordingResourceStore::new();
        let resource = Resource::new(
            fixtures::tenant("org_1"),
            "Narrator",
            None,
            tandem_core::ResourceSpec::Voice(fixtures::reference_voice_spec("el_1")),
        );
        store.insert(&resource).await.unwrap();
        assert!(store.delete(&ResourceKey::of(&resource)).await.unwrap());

        assert_eq!(store.last_inserted(), Some(resource.id));
        assert_eq!(store.inner().resource_count(), 0);
    }

    #[tokio::test]
    async fn test_recording_store_scripted_failures() {
        let store = RecordingResourceStore::new();
        let resource = Resource::new(
            fixtures::tenant("org_1"),
            "Narrator",
            None,
            tandem_core::ResourceSpec::Voice(fixtures::reference_voice_spec("el_1")),
        );
        store.insert(&resource).await.unwrap();
        store.fail_updates();
        store.fail_deletes();

        let key = ResourceKey::of(&resource);
        assert!(store
            .update(&key, &ResourcePatch::status(ResourceStatus::Failed))
            .await
            .is_err());
        assert!(store.delete(&key).await.is_err());
        assert_eq!(store.inner().resource_count(), 1);
    }
}
