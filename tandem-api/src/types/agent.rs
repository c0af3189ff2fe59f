//! Agent-related API types

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tandem_core::{
    AgentSpec, ConsistencyError, Resource, ResourceId, ResourceSpec, ResourceStatus, TenantId,
    Timestamp, ValidationError, DEFAULT_AGENT_MODEL, DEFAULT_JOIN_TIMEOUT, DEFAULT_LANGUAGE_HINT,
    DEFAULT_MAX_DURATION, DEFAULT_TEMPERATURE,
};

use super::common::double_option;
use crate::services::NewResource;

/// Request to create an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CreateAgentRequest {
    /// Explicit tenant (agency admins acting for a client)
    pub tenant_id: Option<String>,
    /// Legacy tenant field, used when nothing else resolves
    pub client_id: Option<String>,
    pub name: String,
    pub description: Option<String>,
    /// An empty prompt leaves the agent in draft
    #[serde(default)]
    pub system_prompt: String,
    pub model: Option<String>,
    /// Local voice this agent speaks with
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "uuid"))]
    pub voice_id: Option<ResourceId>,
    pub temperature: Option<f32>,
    pub language_hint: Option<String>,
    pub greeting: Option<String>,
    pub join_timeout: Option<String>,
    pub max_duration: Option<String>,
    #[serde(default)]
    pub recording_enabled: bool,
    #[serde(default)]
    #[cfg_attr(feature = "openapi", schema(value_type = Vec<Object>))]
    pub tools: Vec<Value>,
    #[serde(default)]
    pub knowledge_bases: Vec<String>,
}

impl CreateAgentRequest {
    pub fn into_new_resource(self) -> NewResource {
        let spec = AgentSpec {
            system_prompt: self.system_prompt,
            model: self.model.unwrap_or_else(|| DEFAULT_AGENT_MODEL.to_string()),
            voice_id: self.voice_id,
            temperature: self.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            language_hint: self
                .language_hint
                .unwrap_or_else(|| DEFAULT_LANGUAGE_HINT.to_string()),
            greeting: self.greeting,
            join_timeout: self
                .join_timeout
                .unwrap_or_else(|| DEFAULT_JOIN_TIMEOUT.to_string()),
            max_duration: self
                .max_duration
                .unwrap_or_else(|| DEFAULT_MAX_DURATION.to_string()),
            recording_enabled: self.recording_enabled,
            tools: self.tools,
            knowledge_bases: self.knowledge_bases,
        };
        NewResource {
            name: self.name,
            description: self.description,
            spec: ResourceSpec::Agent(spec),
            training_samples: Vec::new(),
        }
    }
}

/// Tenant fields of a draft-agent request. The body is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CreateDraftAgentRequest {
    pub tenant_id: Option<String>,
    pub client_id: Option<String>,
}

/// Request to update an agent. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct UpdateAgentRequest {
    pub tenant_id: Option<String>,
    pub client_id: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub system_prompt: Option<String>,
    pub model: Option<String>,
    /// `null` unbinds the voice, which leaves a not yet mirrored agent in draft
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "uuid"))]
    pub voice_id: Option<Option<ResourceId>>,
    pub temperature: Option<f32>,
    pub language_hint: Option<String>,
    pub greeting: Option<String>,
    pub join_timeout: Option<String>,
    pub max_duration: Option<String>,
    pub recording_enabled: Option<bool>,
    #[cfg_attr(feature = "openapi", schema(value_type = Option<Vec<Object>>))]
    pub tools: Option<Vec<Value>>,
    pub knowledge_bases: Option<Vec<String>>,
}

impl UpdateAgentRequest {
    /// Apply the present fields to a stored agent.
    pub fn apply(self, resource: &mut Resource) -> Result<(), ValidationError> {
        let ResourceSpec::Agent(spec) = &mut resource.spec else {
            return Err(ValidationError::invalid("kind", "resource is not an agent"));
        };
        if let Some(name) = self.name {
            resource.name = name.trim().to_string();
        }
        if let Some(description) = self.description {
            resource.description = Some(description).filter(|d| !d.trim().is_empty());
        }
        if let Some(system_prompt) = self.system_prompt {
            spec.system_prompt = system_prompt;
        }
        if let Some(model) = self.model {
            spec.model = model;
        }
        if let Some(voice_id) = self.voice_id {
            spec.voice_id = voice_id;
        }
        if let Some(temperature) = self.temperature {
            spec.temperature = temperature;
        }
        if let Some(language_hint) = self.language_hint {
            spec.language_hint = language_hint;
        }
        if let Some(greeting) = self.greeting {
            spec.greeting = Some(greeting).filter(|g| !g.trim().is_empty());
        }
        if let Some(join_timeout) = self.join_timeout {
            spec.join_timeout = join_timeout;
        }
        if let Some(max_duration) = self.max_duration {
            spec.max_duration = max_duration;
        }
        if let Some(recording_enabled) = self.recording_enabled {
            spec.recording_enabled = recording_enabled;
        }
        if let Some(tools) = self.tools {
            spec.tools = tools;
        }
        if let Some(knowledge_bases) = self.knowledge_bases {
            spec.knowledge_bases = knowledge_bases;
        }
        Ok(())
    }
}

/// Agent response with full details.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct AgentResponse {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub id: ResourceId,
    pub tenant_id: TenantId,
    pub name: String,
    pub description: Option<String>,
    pub status: ResourceStatus,
    /// Agent id at the provider, null until mirrored
    pub ultravox_agent_id: Option<String>,
    #[serde(flatten)]
    pub config: AgentSpec,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub created_at: Timestamp,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub updated_at: Timestamp,
}

impl TryFrom<Resource> for AgentResponse {
    type Error = ConsistencyError;

    fn try_from(resource: Resource) -> Result<Self, Self::Error> {
        let ResourceSpec::Agent(config) = resource.spec.clone() else {
            return Err(resource.consistency("expected an agent record"));
        };
        Ok(Self {
            id: resource.id,
            tenant_id: resource.tenant_id,
            name: resource.name,
            description: resource.description,
            status: resource.status,
            ultravox_agent_id: resource.remote_id,
            config,
            created_at: resource.created_at,
            updated_at: resource.updated_at,
        })
    }
}
