//! Resource Lifecycle Service
//!
//! Drives agents and voices through the create/update/delete saga that keeps
//! the local record and its remote mirror in step:
//!
//! 1. validate and check eligibility for remote creation
//! 2. persist the record locally (`creating`, or `draft` when ineligible)
//! 3. call the provider
//! 4. commit the remote id, or compensate per the kind's failure policy
//! 5. re-read the committed record
//!
//! The local store is the source of truth for configuration; the provider
//! copy is best effort.

use std::sync::Arc;

use chrono::Utc;
use tandem_core::{
    reconcile, AgentSpec, DriftReport, FailurePolicy, NotFoundError, Resource, ResourceId,
    ResourceKind, ResourcePatch, ResourceSpec, ResourceStatus, TandemError, TandemResult,
    TrainingSample, ValidationError, VoiceType, DEFAULT_AGENT_NAME,
};
use tandem_provider::{agent_payload, voice_payload, RemoteGateway, RemoteId, RemotePayload};
use tandem_storage::{ResourceFilter, ResourceKey, ResourceStore};
use uuid::Uuid;

use super::OpContext;

// ============================================================================
// TYPES
// ============================================================================

/// Input for a create.
#[derive(Debug, Clone)]
pub struct NewResource {
    pub name: String,
    pub description: Option<String>,
    pub spec: ResourceSpec,
    /// Custom voices only; forwarded to the provider, never persisted
    pub training_samples: Vec<TrainingSample>,
}

/// Result of a create. `created` is false when an existing record was
/// returned instead (duplicate reference voice).
#[derive(Debug, Clone)]
pub struct CreateOutcome {
    pub resource: Resource,
    pub created: bool,
}

/// Result of a sync: the record after corrections plus what was found.
#[derive(Debug, Clone)]
pub struct SyncOutcome {
    pub resource: Resource,
    pub drift: DriftReport,
}

/// Counters from one pass over records stuck in `creating`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepSummary {
    pub scanned: u64,
    pub promoted: u64,
    pub reconciled: u64,
    pub drafted: u64,
    pub failed: u64,
    pub rolled_back: u64,
    pub errors: u64,
}

enum Eligibility {
    Eligible { voice_remote_id: Option<String> },
    Ineligible { reason: String },
}

enum StuckResolution {
    Promoted,
    Reconciled,
    Drafted,
    Failed,
    RolledBack,
}

// ============================================================================
// SERVICE
// ============================================================================

/// Saga orchestrator for tenant resources.
///
/// Holds no per-tenant state; every call carries its [`OpContext`].
#[derive(Clone)]
pub struct LifecycleService {
    store: Arc<dyn ResourceStore>,
    gateway: Arc<dyn RemoteGateway>,
}

impl LifecycleService {
    pub fn new(store: Arc<dyn ResourceStore>, gateway: Arc<dyn RemoteGateway>) -> Self {
        Self { store, gateway }
    }

    // ========================================================================
    // CREATE
    // ========================================================================

    /// Create a resource and its remote mirror.
    ///
    /// Ineligible resources are persisted as `draft` without a provider
    /// call. On provider failure voices are rolled back and agents are kept
    /// as `failed`; the provider error is returned either way.
    pub async fn create(&self, ctx: &OpContext, new: NewResource) -> TandemResult<CreateOutcome> {
        let resource = Resource::new(
            ctx.tenant_id.clone(),
            new.name.trim(),
            new.description,
            new.spec,
        );
        let id = resource.id;
        self.create_inner(ctx, resource, &new.training_samples)
            .await
            .map_err(|e| ctx.report(Some(id), e))
    }

    /// Create an agent with default configuration, bound to the tenant's
    /// most recent voice that has a remote mirror.
    pub async fn create_draft_agent(&self, ctx: &OpContext) -> TandemResult<CreateOutcome> {
        let voice = self
            .store
            .select_one(
                &ResourceFilter::tenant(ctx.tenant_id.clone())
                    .kind(ResourceKind::Voice)
                    .has_remote_id(true),
            )
            .await
            .map_err(|e| ctx.report(None, e.into()))?;

        let spec = AgentSpec {
            voice_id: voice.map(|v| v.id),
            ..AgentSpec::default()
        };
        self.create(
            ctx,
            NewResource {
                name: DEFAULT_AGENT_NAME.to_string(),
                description: None,
                spec: ResourceSpec::Agent(spec),
                training_samples: Vec::new(),
            },
        )
        .await
    }

    async fn create_inner(
        &self,
        ctx: &OpContext,
        mut resource: Resource,
        samples: &[TrainingSample],
    ) -> TandemResult<CreateOutcome> {
        resource.validate()?;
        validate_samples(&resource, samples)?;

        if let Some(existing) = self.find_reference_duplicate(&resource).await? {
            tracing::info!(
                resource_id = %existing.id,
                tenant_id = %ctx.tenant_id,
                correlation_id = %ctx.correlation_id,
                "Reference voice already registered, returning existing record"
            );
            return Ok(CreateOutcome {
                resource: existing,
                created: false,
            });
        }

        let voice_remote_id = match self.eligibility(&resource).await? {
            Eligibility::Eligible { voice_remote_id } => voice_remote_id,
            Eligibility::Ineligible { reason } => {
                resource.status = ResourceStatus::Draft;
                self.store.insert(&resource).await?;
                tracing::info!(
                    resource_id = %resource.id,
                    tenant_id = %ctx.tenant_id,
                    correlation_id = %ctx.correlation_id,
                    reason = %reason,
                    "Resource persisted as draft"
                );
                return Ok(CreateOutcome {
                    resource: self.reload(&resource).await?,
                    created: true,
                });
            }
        };

        // Tentative record first, so a crash mid-call leaves it discoverable
        resource.status = ResourceStatus::Creating;
        self.store.insert(&resource).await?;

        let payload = build_payload(&resource, samples, voice_remote_id.as_deref());
        let policy = resource.kind().failure_policy();
        let committed = self.push_remote(ctx, &resource, &payload, policy).await?;
        Ok(CreateOutcome {
            resource: committed,
            created: true,
        })
    }

    // ========================================================================
    // READ
    // ========================================================================

    pub async fn get(&self, ctx: &OpContext, kind: ResourceKind, id: ResourceId) -> TandemResult<Resource> {
        self.find(ctx, kind, id)
            .await
            .map_err(|e| ctx.report(Some(id), e))
    }

    /// Tenant-scoped list, newest first.
    pub async fn list(
        &self,
        ctx: &OpContext,
        kind: ResourceKind,
        status: Option<ResourceStatus>,
        limit: usize,
    ) -> TandemResult<Vec<Resource>> {
        let mut filter = ResourceFilter::tenant(ctx.tenant_id.clone())
            .kind(kind)
            .limit(limit);
        if let Some(status) = status {
            filter = filter.status(status);
        }
        self.store
            .select(&filter)
            .await
            .map_err(|e| ctx.report(None, e.into()))
    }

    // ========================================================================
    // UPDATE
    // ========================================================================

    /// Apply `edit` to the stored record, persist it, then push the change
    /// to the remote mirror.
    ///
    /// A failed remote update keeps the local change and marks the record
    /// `failed`. A record without a remote id that becomes eligible is
    /// created remotely.
    pub async fn update<F>(
        &self,
        ctx: &OpContext,
        kind: ResourceKind,
        id: ResourceId,
        edit: F,
    ) -> TandemResult<Resource>
    where
        F: FnOnce(&mut Resource) -> Result<(), ValidationError> + Send,
    {
        self.update_inner(ctx, kind, id, edit)
            .await
            .map_err(|e| ctx.report(Some(id), e))
    }

    async fn update_inner<F>(
        &self,
        ctx: &OpContext,
        kind: ResourceKind,
        id: ResourceId,
        edit: F,
    ) -> TandemResult<Resource>
    where
        F: FnOnce(&mut Resource) -> Result<(), ValidationError> + Send,
    {
        let current = self.find(ctx, kind, id).await?;
        let mut edited = current.clone();
        edit(&mut edited)?;
        edited.validate()?;

        let patch = ResourcePatch {
            name: (edited.name != current.name).then(|| edited.name.clone()),
            description: (edited.description != current.description)
                .then(|| edited.description.clone()),
            spec: (edited.spec != current.spec).then(|| edited.spec.clone()),
            ..Default::default()
        };
        let key = ResourceKey::of(&current);
        let changed = !patch.is_empty();
        let updated = if changed {
            self.store
                .update(&key, &patch)
                .await?
                .ok_or(NotFoundError { kind, id })?
        } else {
            current
        };

        let voice_remote_id = match self.eligibility(&updated).await? {
            Eligibility::Eligible { voice_remote_id } => voice_remote_id,
            Eligibility::Ineligible { reason } => {
                tracing::debug!(
                    resource_id = %id,
                    tenant_id = %ctx.tenant_id,
                    correlation_id = %ctx.correlation_id,
                    reason = %reason,
                    "Remote mirror left untouched"
                );
                return self.reload(&updated).await;
            }
        };

        match updated.remote_id.clone() {
            Some(remote_id) => {
                if !changed && updated.status != ResourceStatus::Failed {
                    return Ok(updated);
                }
                let payload = build_payload(&updated, &[], voice_remote_id.as_deref());
                let pushed = self
                    .gateway
                    .update_resource(&ctx.tenant_id, &RemoteId::new(remote_id), &payload)
                    .await;
                match pushed {
                    Ok(()) if updated.status == ResourceStatus::Failed => {
                        let recovered = ResourcePatch::status(updated.status_after_remote_create());
                        self.store.update(&key, &recovered).await?;
                    }
                    Ok(()) => {}
                    Err(err) => {
                        self.store
                            .update(&key, &ResourcePatch::status(ResourceStatus::Failed))
                            .await?;
                        return Err(err.into());
                    }
                }
                self.reload(&updated).await
            }
            // A record still in `creating` belongs to an in-flight create or the sweep
            None if updated.permits_post_hoc_sync() && updated.status != ResourceStatus::Creating => {
                self.promote(ctx, &updated, voice_remote_id.as_deref()).await
            }
            None => self.reload(&updated).await,
        }
    }

    // ========================================================================
    // DELETE
    // ========================================================================

    /// Delete the remote mirror (best effort), then the local record.
    pub async fn delete(&self, ctx: &OpContext, kind: ResourceKind, id: ResourceId) -> TandemResult<ResourceId> {
        self.delete_inner(ctx, kind, id)
            .await
            .map_err(|e| ctx.report(Some(id), e))
    }

    async fn delete_inner(&self, ctx: &OpContext, kind: ResourceKind, id: ResourceId) -> TandemResult<ResourceId> {
        let current = self.find(ctx, kind, id).await?;

        if let Some(remote_id) = &current.remote_id {
            let remote_id = RemoteId::new(remote_id.clone());
            if let Err(err) = self
                .gateway
                .delete_resource(&ctx.tenant_id, kind, &remote_id)
                .await
            {
                tracing::warn!(
                    resource_id = %id,
                    tenant_id = %ctx.tenant_id,
                    correlation_id = %ctx.correlation_id,
                    provider = %err.provider,
                    http_status = ?err.http_status,
                    remote_id = %remote_id,
                    error = %err,
                    "Remote delete failed, deleting local record anyway"
                );
            }
        }

        if !self.store.delete(&ResourceKey::of(&current)).await? {
            return Err(NotFoundError { kind, id }.into());
        }
        tracing::info!(
            resource_id = %id,
            tenant_id = %ctx.tenant_id,
            correlation_id = %ctx.correlation_id,
            "Resource deleted"
        );
        Ok(id)
    }

    // ========================================================================
    // SYNC
    // ========================================================================

    /// Reconcile the record with its remote mirror and apply every
    /// correction found. A record without a remote id is created remotely
    /// when its kind permits it.
    pub async fn sync(&self, ctx: &OpContext, kind: ResourceKind, id: ResourceId) -> TandemResult<SyncOutcome> {
        self.sync_inner(ctx, kind, id)
            .await
            .map_err(|e| ctx.report(Some(id), e))
    }

    async fn sync_inner(&self, ctx: &OpContext, kind: ResourceKind, id: ResourceId) -> TandemResult<SyncOutcome> {
        let current = self.find(ctx, kind, id).await?;
        self.reconcile_resource(ctx, current).await
    }

    async fn reconcile_resource(&self, ctx: &OpContext, current: Resource) -> TandemResult<SyncOutcome> {
        let Some(remote_id) = current.remote_id.clone() else {
            return self.create_missing_mirror(ctx, current).await;
        };

        let snapshot = self
            .gateway
            .fetch_resource(&ctx.tenant_id, current.kind(), &RemoteId::new(remote_id))
            .await?;
        let drift = reconcile(&current, &snapshot);
        if !drift.has_drift {
            return Ok(SyncOutcome {
                resource: current,
                drift,
            });
        }

        self.store
            .update(&ResourceKey::of(&current), &drift.corrections())
            .await?
            .ok_or(NotFoundError {
                kind: current.kind(),
                id: current.id,
            })?;
        tracing::info!(
            resource_id = %current.id,
            tenant_id = %ctx.tenant_id,
            correlation_id = %ctx.correlation_id,
            differences = drift.differences.len(),
            action = ?drift.recommended_action,
            "Applied drift corrections"
        );
        Ok(SyncOutcome {
            resource: self.reload(&current).await?,
            drift,
        })
    }

    async fn create_missing_mirror(&self, ctx: &OpContext, current: Resource) -> TandemResult<SyncOutcome> {
        if !current.permits_post_hoc_sync() {
            return Err(ValidationError::SyncNotPermitted {
                kind: current.kind(),
                id: current.id,
                reason: "custom voice has no remote mirror and its training samples are not retained"
                    .to_string(),
            }
            .into());
        }
        let voice_remote_id = match self.eligibility(&current).await? {
            Eligibility::Eligible { voice_remote_id } => voice_remote_id,
            Eligibility::Ineligible { reason } => {
                return Err(ValidationError::SyncNotPermitted {
                    kind: current.kind(),
                    id: current.id,
                    reason,
                }
                .into())
            }
        };

        let resource = self.promote(ctx, &current, voice_remote_id.as_deref()).await?;
        let remote_id = resource
            .remote_id
            .clone()
            .ok_or_else(|| resource.consistency("remote create committed without a remote id"))?;
        Ok(SyncOutcome {
            resource,
            drift: DriftReport::remote_created(remote_id),
        })
    }

    // ========================================================================
    // MAINTENANCE
    // ========================================================================

    /// Resolve records left in `creating` for longer than `older_than`,
    /// across all tenants.
    pub async fn sweep_stuck(&self, older_than: chrono::Duration, limit: usize) -> TandemResult<SweepSummary> {
        let cutoff = Utc::now() - older_than;
        let stuck = self
            .store
            .select_stuck(ResourceStatus::Creating, cutoff, limit)
            .await?;

        let mut summary = SweepSummary::default();
        for resource in stuck {
            summary.scanned += 1;
            let id = resource.id;
            let ctx = OpContext::new(resource.tenant_id.clone(), format!("sweep-{}", Uuid::now_v7()));
            match self.resolve_stuck(&ctx, resource).await {
                Ok(StuckResolution::Promoted) => summary.promoted += 1,
                Ok(StuckResolution::Reconciled) => summary.reconciled += 1,
                Ok(StuckResolution::Drafted) => summary.drafted += 1,
                Ok(StuckResolution::Failed) => summary.failed += 1,
                Ok(StuckResolution::RolledBack) => summary.rolled_back += 1,
                Err(err) => {
                    summary.errors += 1;
                    ctx.report(Some(id), err);
                }
            }
        }
        Ok(summary)
    }

    async fn resolve_stuck(&self, ctx: &OpContext, resource: Resource) -> TandemResult<StuckResolution> {
        if resource.remote_id.is_some() {
            self.reconcile_resource(ctx, resource).await?;
            return Ok(StuckResolution::Reconciled);
        }

        let key = ResourceKey::of(&resource);
        let policy = resource.kind().failure_policy();
        if !resource.permits_post_hoc_sync() {
            // The create that left it here never finished; settle it as that create would have
            return match policy {
                FailurePolicy::Rollback => {
                    self.store.delete(&key).await?;
                    Ok(StuckResolution::RolledBack)
                }
                FailurePolicy::Degrade => {
                    self.store
                        .update(&key, &ResourcePatch::status(ResourceStatus::Failed))
                        .await?;
                    Ok(StuckResolution::Failed)
                }
            };
        }

        match self.eligibility(&resource).await? {
            Eligibility::Ineligible { .. } => {
                self.store
                    .update(&key, &ResourcePatch::status(ResourceStatus::Draft))
                    .await?;
                Ok(StuckResolution::Drafted)
            }
            Eligibility::Eligible { voice_remote_id } => {
                match self.promote(ctx, &resource, voice_remote_id.as_deref()).await {
                    Ok(_) => Ok(StuckResolution::Promoted),
                    Err(TandemError::Provider(err)) => {
                        ctx.report(Some(resource.id), err.into());
                        Ok(match policy {
                            FailurePolicy::Rollback => StuckResolution::RolledBack,
                            FailurePolicy::Degrade => StuckResolution::Failed,
                        })
                    }
                    Err(err) => Err(err),
                }
            }
        }
    }

    // ========================================================================
    // SAGA STEPS
    // ========================================================================

    async fn find(&self, ctx: &OpContext, kind: ResourceKind, id: ResourceId) -> TandemResult<Resource> {
        self.store
            .select_one(&ResourceFilter::tenant(ctx.tenant_id.clone()).id(id).kind(kind))
            .await?
            .ok_or_else(|| NotFoundError { kind, id }.into())
    }

    /// Re-read a committed record. Missing or invariant-breaking rows are
    /// consistency errors.
    async fn reload(&self, resource: &Resource) -> TandemResult<Resource> {
        let reloaded = self
            .store
            .select_one(&ResourceFilter::key(&ResourceKey::of(resource)))
            .await?
            .ok_or_else(|| resource.consistency("committed record could not be re-read"))?;
        reloaded.check_invariants()?;
        Ok(reloaded)
    }

    async fn find_reference_duplicate(&self, resource: &Resource) -> TandemResult<Option<Resource>> {
        let Some(voice) = resource.as_voice() else {
            return Ok(None);
        };
        let Some(provider_voice_id) = voice
            .provider_voice_id
            .as_deref()
            .filter(|_| voice.voice_type == VoiceType::Reference)
        else {
            return Ok(None);
        };
        Ok(self
            .store
            .select_one(
                &ResourceFilter::tenant(resource.tenant_id.clone())
                    .kind(ResourceKind::Voice)
                    .provider_voice_id(provider_voice_id),
            )
            .await?)
    }

    /// Agents need a non-empty prompt and a voice of the same tenant that
    /// already has a remote mirror. Voices are always eligible.
    async fn eligibility(&self, resource: &Resource) -> TandemResult<Eligibility> {
        let Some(agent) = resource.as_agent() else {
            return Ok(Eligibility::Eligible {
                voice_remote_id: None,
            });
        };
        if agent.system_prompt.trim().is_empty() {
            return Ok(Eligibility::Ineligible {
                reason: "system prompt is empty".to_string(),
            });
        }
        let Some(voice_id) = agent.voice_id else {
            return Ok(Eligibility::Ineligible {
                reason: "no voice assigned".to_string(),
            });
        };

        let voice = self
            .store
            .select_one(
                &ResourceFilter::tenant(resource.tenant_id.clone())
                    .id(voice_id)
                    .kind(ResourceKind::Voice),
            )
            .await?;
        Ok(match voice.and_then(|v| v.remote_id) {
            Some(remote_id) => Eligibility::Eligible {
                voice_remote_id: Some(remote_id),
            },
            None => Eligibility::Ineligible {
                reason: format!("voice {} is missing or has no remote mirror", voice_id),
            },
        })
    }

    /// Move an existing record back to `creating` and run the remote create.
    ///
    /// A failure is compensated with the kind's own policy, as on a first
    /// create: agents end up `failed`, voices are deleted.
    async fn promote(
        &self,
        ctx: &OpContext,
        resource: &Resource,
        voice_remote_id: Option<&str>,
    ) -> TandemResult<Resource> {
        let creating = self
            .store
            .update(
                &ResourceKey::of(resource),
                &ResourcePatch::status(ResourceStatus::Creating),
            )
            .await?
            .ok_or(NotFoundError {
                kind: resource.kind(),
                id: resource.id,
            })?;
        let payload = build_payload(&creating, &[], voice_remote_id);
        let policy = creating.kind().failure_policy();
        self.push_remote(ctx, &creating, &payload, policy).await
    }

    /// Remote create, then commit or compensate.
    async fn push_remote(
        &self,
        ctx: &OpContext,
        resource: &Resource,
        payload: &RemotePayload,
        policy: FailurePolicy,
    ) -> TandemResult<Resource> {
        let key = ResourceKey::of(resource);
        match self.gateway.create_resource(&ctx.tenant_id, payload).await {
            Ok(remote_id) => {
                let patch = ResourcePatch::commit_remote(
                    remote_id.as_str(),
                    resource.status_after_remote_create(),
                );
                if self.store.update(&key, &patch).await?.is_none() {
                    return Err(resource
                        .consistency(format!(
                            "record vanished before remote id {} was committed",
                            remote_id
                        ))
                        .into());
                }
                tracing::info!(
                    resource_id = %resource.id,
                    tenant_id = %ctx.tenant_id,
                    correlation_id = %ctx.correlation_id,
                    remote_id = %remote_id,
                    "Remote mirror created"
                );
                self.reload(resource).await
            }
            Err(err) => {
                self.compensate(ctx, &key, policy).await;
                Err(err.into())
            }
        }
    }

    /// Undo the tentative record of a failed remote create.
    ///
    /// A store failure here is logged, not returned: the caller surfaces the
    /// provider error, and the record stays in `creating` for the sweep.
    async fn compensate(&self, ctx: &OpContext, key: &ResourceKey, policy: FailurePolicy) {
        let compensated = match policy {
            FailurePolicy::Rollback => self.store.delete(key).await.map(|_| ()),
            FailurePolicy::Degrade => {
                let patch = ResourcePatch {
                    status: Some(ResourceStatus::Failed),
                    remote_id: Some(None),
                    ..Default::default()
                };
                self.store.update(key, &patch).await.map(|_| ())
            }
        };
        match compensated {
            Ok(()) => tracing::warn!(
                resource_id = %key.id,
                tenant_id = %ctx.tenant_id,
                correlation_id = %ctx.correlation_id,
                policy = ?policy,
                "Remote create failed, compensated local record"
            ),
            Err(err) => tracing::error!(
                resource_id = %key.id,
                tenant_id = %ctx.tenant_id,
                correlation_id = %ctx.correlation_id,
                policy = ?policy,
                error = %err,
                "Remote create failed and compensation failed, record left in creating"
            ),
        }
    }
}

fn build_payload(resource: &Resource, samples: &[TrainingSample], voice_remote_id: Option<&str>) -> RemotePayload {
    match &resource.spec {
        ResourceSpec::Agent(agent) => agent_payload(&resource.name, agent, voice_remote_id),
        ResourceSpec::Voice(voice) => voice_payload(
            &resource.name,
            resource.description.as_deref(),
            voice,
            samples,
        ),
    }
}

/// Custom voices are trained from at least one complete sample.
fn validate_samples(resource: &Resource, samples: &[TrainingSample]) -> Result<(), ValidationError> {
    let Some(voice) = resource.as_voice() else {
        return Ok(());
    };
    if voice.voice_type != VoiceType::Custom {
        return Ok(());
    }
    if samples.is_empty() {
        return Err(ValidationError::missing("training_samples"));
    }
    for sample in samples {
        if sample.text.trim().is_empty() || sample.audio_url.trim().is_empty() {
            return Err(ValidationError::invalid(
                "training_samples",
                "each sample needs text and audio_url",
            ));
        }
        if sample.duration_seconds.is_some_and(|d| d <= 0.0) {
            return Err(ValidationError::invalid(
                "training_samples",
                "duration_seconds must be positive",
            ));
        }
    }
    Ok(())
}
