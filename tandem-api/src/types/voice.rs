//! Voice-related API types

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tandem_core::{
    ConsistencyError, Resource, ResourceId, ResourceSpec, ResourceStatus, TenantId, Timestamp,
    TrainingSample, ValidationError, VoiceSpec, VoiceType, DEFAULT_VOICE_LANGUAGE,
    DEFAULT_VOICE_PROVIDER,
};

use crate::services::NewResource;

/// Request to create a voice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CreateVoiceRequest {
    pub tenant_id: Option<String>,
    pub client_id: Option<String>,
    pub name: String,
    pub description: Option<String>,
    /// `custom` (trained from samples) or `reference` (existing provider voice)
    pub voice_type: VoiceType,
    /// Upstream TTS provider label (default `elevenlabs`)
    pub provider: Option<String>,
    /// Required for reference voices
    pub provider_voice_id: Option<String>,
    /// Language code (default `en`)
    pub language: Option<String>,
    /// Required for custom voices; sent to the provider, not stored
    #[serde(default)]
    pub training_samples: Vec<TrainingSample>,
}

impl CreateVoiceRequest {
    pub fn into_new_resource(self) -> NewResource {
        let spec = VoiceSpec {
            voice_type: self.voice_type,
            provider: self
                .provider
                .unwrap_or_else(|| DEFAULT_VOICE_PROVIDER.to_string()),
            provider_voice_id: self
                .provider_voice_id
                .map(|id| id.trim().to_string())
                .filter(|id| !id.is_empty()),
            language: self
                .language
                .unwrap_or_else(|| DEFAULT_VOICE_LANGUAGE.to_string()),
        };
        NewResource {
            name: self.name,
            description: self.description,
            spec: ResourceSpec::Voice(spec),
            training_samples: self.training_samples,
        }
    }
}

/// Request to update a voice. The voice type and upstream voice id are
/// fixed at creation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct UpdateVoiceRequest {
    pub tenant_id: Option<String>,
    pub client_id: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub provider: Option<String>,
    pub language: Option<String>,
}

impl UpdateVoiceRequest {
    pub fn apply(self, resource: &mut Resource) -> Result<(), ValidationError> {
        let ResourceSpec::Voice(spec) = &mut resource.spec else {
            return Err(ValidationError::invalid("kind", "resource is not a voice"));
        };
        if let Some(name) = self.name {
            resource.name = name.trim().to_string();
        }
        if let Some(description) = self.description {
            resource.description = Some(description).filter(|d| !d.trim().is_empty());
        }
        if let Some(provider) = self.provider {
            spec.provider = provider;
        }
        if let Some(language) = self.language {
            spec.language = language;
        }
        Ok(())
    }
}

/// Voice response with full details.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct VoiceResponse {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub id: ResourceId,
    pub tenant_id: TenantId,
    pub name: String,
    pub description: Option<String>,
    pub status: ResourceStatus,
    /// Voice id at the provider, null until mirrored
    pub ultravox_voice_id: Option<String>,
    pub voice_type: VoiceType,
    pub provider: String,
    pub provider_voice_id: Option<String>,
    pub language: String,
    /// Training metadata reported by the provider
    #[cfg_attr(feature = "openapi", schema(value_type = Option<Object>))]
    pub training_info: Option<Value>,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub created_at: Timestamp,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub updated_at: Timestamp,
}

impl TryFrom<Resource> for VoiceResponse {
    type Error = ConsistencyError;

    fn try_from(resource: Resource) -> Result<Self, Self::Error> {
        let ResourceSpec::Voice(spec) = resource.spec.clone() else {
            return Err(resource.consistency("expected a voice record"));
        };
        Ok(Self {
            id: resource.id,
            tenant_id: resource.tenant_id,
            name: resource.name,
            description: resource.description,
            status: resource.status,
            ultravox_voice_id: resource.remote_id,
            voice_type: spec.voice_type,
            provider: spec.provider,
            provider_voice_id: spec.provider_voice_id,
            language: spec.language,
            training_info: resource.training_info,
            created_at: resource.created_at,
            updated_at: resource.updated_at,
        })
    }
}
