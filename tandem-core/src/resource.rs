//! Resource entity types
//!
//! A resource is owned by exactly one tenant and mirrored by the remote
//! provider once it is eligible. The configuration below is the source of
//! truth; the provider copy is best effort.

use crate::{
    new_resource_id, ConsistencyError, ResourceId, ResourceKind, ResourceStatus, TenantId,
    Timestamp, ValidationError, VoiceType,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// DEFAULTS
// ============================================================================

pub const DEFAULT_AGENT_MODEL: &str = "fixie-ai/ultravox-v0_4-8k";
pub const DEFAULT_AGENT_NAME: &str = "Untitled Agent";
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";
pub const DEFAULT_TEMPERATURE: f32 = 0.3;
pub const DEFAULT_LANGUAGE_HINT: &str = "en-US";
pub const DEFAULT_JOIN_TIMEOUT: &str = "30s";
pub const DEFAULT_MAX_DURATION: &str = "3600s";
pub const DEFAULT_VOICE_PROVIDER: &str = "elevenlabs";
pub const DEFAULT_VOICE_LANGUAGE: &str = "en";

pub const MAX_NAME_LEN: usize = 255;

// ============================================================================
// KIND-SPECIFIC CONFIGURATION
// ============================================================================

/// Agent configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct AgentSpec {
    pub system_prompt: String,
    pub model: String,
    /// Local voice this agent speaks with
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "uuid"))]
    pub voice_id: Option<ResourceId>,
    pub temperature: f32,
    pub language_hint: String,
    pub greeting: Option<String>,
    pub join_timeout: String,
    pub max_duration: String,
    pub recording_enabled: bool,
    #[serde(default)]
    #[cfg_attr(feature = "openapi", schema(value_type = Vec<Object>))]
    pub tools: Vec<Value>,
    #[serde(default)]
    pub knowledge_bases: Vec<String>,
}

impl Default for AgentSpec {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            model: DEFAULT_AGENT_MODEL.to_string(),
            voice_id: None,
            temperature: DEFAULT_TEMPERATURE,
            language_hint: DEFAULT_LANGUAGE_HINT.to_string(),
            greeting: None,
            join_timeout: DEFAULT_JOIN_TIMEOUT.to_string(),
            max_duration: DEFAULT_MAX_DURATION.to_string(),
            recording_enabled: false,
            tools: Vec::new(),
            knowledge_bases: Vec::new(),
        }
    }
}

/// Voice configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct VoiceSpec {
    pub voice_type: VoiceType,
    /// Upstream TTS provider label, e.g. `elevenlabs`
    pub provider: String,
    /// Voice id at the upstream TTS provider (reference voices)
    pub provider_voice_id: Option<String>,
    pub language: String,
}

/// Audio sample used to train a custom voice. Sent to the provider on
/// create only; samples are not persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct TrainingSample {
    pub text: String,
    pub audio_url: String,
    pub duration_seconds: Option<f64>,
}

/// Kind-specific configuration, tagged by kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum ResourceSpec {
    Agent(AgentSpec),
    Voice(VoiceSpec),
}

impl ResourceSpec {
    pub fn kind(&self) -> ResourceKind {
        match self {
            ResourceSpec::Agent(_) => ResourceKind::Agent,
            ResourceSpec::Voice(_) => ResourceKind::Voice,
        }
    }
}

// ============================================================================
// RESOURCE
// ============================================================================

/// A tenant-owned resource and its remote mirror reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub id: ResourceId,
    pub tenant_id: TenantId,
    pub name: String,
    pub description: Option<String>,
    pub status: ResourceStatus,
    /// Provider-assigned id, null until the remote create succeeds
    pub remote_id: Option<String>,
    pub spec: ResourceSpec,
    /// Provider training metadata (custom voices)
    pub training_info: Option<Value>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Resource {
    /// Build a new, not yet persisted resource in `creating`.
    pub fn new(
        tenant_id: TenantId,
        name: impl Into<String>,
        description: Option<String>,
        spec: ResourceSpec,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: new_resource_id(),
            tenant_id,
            name: name.into(),
            description,
            status: ResourceStatus::Creating,
            remote_id: None,
            spec,
            training_info: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn kind(&self) -> ResourceKind {
        self.spec.kind()
    }

    pub fn as_agent(&self) -> Option<&AgentSpec> {
        match &self.spec {
            ResourceSpec::Agent(agent) => Some(agent),
            ResourceSpec::Voice(_) => None,
        }
    }

    pub fn as_voice(&self) -> Option<&VoiceSpec> {
        match &self.spec {
            ResourceSpec::Voice(voice) => Some(voice),
            ResourceSpec::Agent(_) => None,
        }
    }

    /// Status a resource lands in once the provider accepted the create.
    pub fn status_after_remote_create(&self) -> ResourceStatus {
        match &self.spec {
            ResourceSpec::Voice(voice) if voice.voice_type == VoiceType::Custom => {
                ResourceStatus::Training
            }
            _ => ResourceStatus::Active,
        }
    }

    /// Whether a resource without a remote id can be created remotely after
    /// the fact. Custom voices cannot: their training samples are gone.
    pub fn permits_post_hoc_sync(&self) -> bool {
        match &self.spec {
            ResourceSpec::Agent(_) => true,
            ResourceSpec::Voice(voice) => voice.voice_type == VoiceType::Reference,
        }
    }

    /// Validate user-editable fields.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(ValidationError::missing("name"));
        }
        if name.chars().count() > MAX_NAME_LEN {
            return Err(ValidationError::invalid(
                "name",
                format!("must be at most {} characters", MAX_NAME_LEN),
            ));
        }

        match &self.spec {
            ResourceSpec::Agent(agent) => {
                if !(0.0..=1.0).contains(&agent.temperature) {
                    return Err(ValidationError::invalid(
                        "temperature",
                        "must be between 0.0 and 1.0",
                    ));
                }
                if agent.model.trim().is_empty() {
                    return Err(ValidationError::missing("model"));
                }
                if !agent.tools.iter().all(Value::is_object) {
                    return Err(ValidationError::invalid("tools", "each tool must be an object"));
                }
            }
            ResourceSpec::Voice(voice) => {
                if voice.voice_type == VoiceType::Reference
                    && voice
                        .provider_voice_id
                        .as_deref()
                        .map_or(true, |id| id.trim().is_empty())
                {
                    return Err(ValidationError::missing("provider_voice_id"));
                }
                if voice.provider.trim().is_empty() {
                    return Err(ValidationError::missing("provider"));
                }
            }
        }
        Ok(())
    }

    /// Check the status/remote-id invariants.
    pub fn check_invariants(&self) -> Result<(), ConsistencyError> {
        if self.status.requires_remote_id() && self.remote_id.is_none() {
            return Err(self.consistency(format!(
                "status {} requires a remote id",
                self.status
            )));
        }
        if self.status.forbids_remote_id() && self.remote_id.is_some() {
            return Err(self.consistency("draft resource must not carry a remote id"));
        }
        Ok(())
    }

    pub fn consistency(&self, reason: impl Into<String>) -> ConsistencyError {
        ConsistencyError {
            kind: self.kind(),
            id: self.id,
            reason: reason.into(),
        }
    }

    /// Apply a patch in memory. Tenant and id are never touched.
    pub fn apply(&mut self, patch: &ResourcePatch) {
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(description) = &patch.description {
            self.description = description.clone();
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(remote_id) = &patch.remote_id {
            self.remote_id = remote_id.clone();
        }
        if let Some(spec) = &patch.spec {
            self.spec = spec.clone();
        }
        if let Some(training_info) = &patch.training_info {
            self.training_info = training_info.clone();
        }
        self.updated_at = Utc::now();
    }
}

/// Partial update of a resource. `None` leaves a field untouched; for
/// nullable fields `Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourcePatch {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub status: Option<ResourceStatus>,
    pub remote_id: Option<Option<String>>,
    pub spec: Option<ResourceSpec>,
    pub training_info: Option<Option<Value>>,
}

impl ResourcePatch {
    pub fn status(status: ResourceStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    /// Commit a successful remote create.
    pub fn commit_remote(remote_id: impl Into<String>, status: ResourceStatus) -> Self {
        Self {
            status: Some(status),
            remote_id: Some(Some(remote_id.into())),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}
