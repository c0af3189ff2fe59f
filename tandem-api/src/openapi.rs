//! OpenAPI Specification for TANDEM API
//!
//! Generated from the route annotations and request/response types with
//! utoipa. Served at `/openapi.json` and printed by the `generate-openapi`
//! binary.

use utoipa::OpenApi;

use crate::error::{ApiError, ErrorCode};
use crate::routes::{agents, health, voices};
use crate::types::*;

use tandem_core::{
    AgentSpec, Difference, DriftAction, DriftReport, ResourceStatus, TenantId, TrainingSample,
    VoiceType,
};

/// OpenAPI document for TANDEM API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "TANDEM API",
        version = "0.4.0",
        description = "Tenant-scoped lifecycle of voice agents and voices mirrored into the Ultravox provider",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "http://localhost:3000", description = "Local Development")
    ),
    tags(
        (name = "Agents", description = "Voice agents and their provider mirrors"),
        (name = "Voices", description = "Custom and reference voices"),
        (name = "Health", description = "Liveness")
    ),
    paths(
        agents::create_agent,
        agents::create_draft_agent,
        agents::list_agents,
        agents::get_agent,
        agents::update_agent,
        agents::delete_agent,
        agents::sync_agent,
        voices::create_voice,
        voices::list_voices,
        voices::get_voice,
        voices::update_voice,
        voices::delete_voice,
        voices::sync_voice,
        health::health,
    ),
    components(schemas(
        ApiError,
        ErrorCode,
        CreateAgentRequest,
        CreateDraftAgentRequest,
        UpdateAgentRequest,
        AgentResponse,
        CreateVoiceRequest,
        UpdateVoiceRequest,
        VoiceResponse,
        DeleteResponse,
        Meta,
        AgentSpec,
        TrainingSample,
        TenantId,
        ResourceStatus,
        VoiceType,
        DriftReport,
        DriftAction,
        Difference,
        health::HealthResponse,
    ))
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_json_serialization() -> Result<(), String> {
        let json = ApiDoc::openapi()
            .to_json()
            .map_err(|e| format!("Failed to serialize OpenAPI: {}", e))?;

        serde_json::from_str::<serde_json::Value>(&json)
            .map_err(|e| format!("Generated JSON invalid: {}", e))?;
        assert!(json.contains("TANDEM API"));
        Ok(())
    }

    #[test]
    fn test_openapi_paths_exist() {
        let openapi = ApiDoc::openapi();
        let paths = &openapi.paths.paths;

        assert!(paths.contains_key("/api/v1/agents"));
        assert!(paths.contains_key("/api/v1/agents/draft"));
        assert!(paths.contains_key("/api/v1/agents/{id}"));
        assert!(paths.contains_key("/api/v1/agents/{id}/sync"));
        assert!(paths.contains_key("/api/v1/voices"));
        assert!(paths.contains_key("/api/v1/voices/{id}"));
        assert!(paths.contains_key("/api/v1/voices/{id}/sync"));
        assert!(paths.contains_key("/health"));
    }
}
