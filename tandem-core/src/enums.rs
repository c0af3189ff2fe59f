//! Enum types for TANDEM resources

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// RESOURCE ENUMS
// ============================================================================

/// Kind of resource mirrored into the remote provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum ResourceKind {
    Agent,
    Voice,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Agent => "agent",
            ResourceKind::Voice => "voice",
        }
    }

    /// Failure policy applied when the remote create step fails.
    ///
    /// Fixed per kind: voices roll back their tentative record, agents keep
    /// it in `failed` so the configuration the user typed is not lost.
    pub fn failure_policy(&self) -> FailurePolicy {
        match self {
            ResourceKind::Agent => FailurePolicy::Degrade,
            ResourceKind::Voice => FailurePolicy::Rollback,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "agent" | "agents" => Ok(ResourceKind::Agent),
            "voice" | "voices" => Ok(ResourceKind::Voice),
            other => Err(format!("Invalid resource kind: {}", other)),
        }
    }
}

/// Lifecycle status of a resource.
///
/// `draft` never carries a remote id; `training` and `active` always do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum ResourceStatus {
    /// Persisted locally only, not eligible (yet) for remote creation
    Draft,
    /// Local record persisted, remote create in flight
    Creating,
    /// Remote mirror exists and is still processing training media
    Training,
    /// Remote mirror exists and is usable
    Active,
    /// Last remote interaction failed
    Failed,
}

impl ResourceStatus {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            ResourceStatus::Draft => "draft",
            ResourceStatus::Creating => "creating",
            ResourceStatus::Training => "training",
            ResourceStatus::Active => "active",
            ResourceStatus::Failed => "failed",
        }
    }

    pub fn from_db_str(s: &str) -> Result<Self, ResourceStatusParseError> {
        match s.trim().to_lowercase().as_str() {
            "draft" => Ok(ResourceStatus::Draft),
            "creating" => Ok(ResourceStatus::Creating),
            "training" => Ok(ResourceStatus::Training),
            "active" => Ok(ResourceStatus::Active),
            "failed" => Ok(ResourceStatus::Failed),
            _ => Err(ResourceStatusParseError(s.to_string())),
        }
    }

    /// Statuses that must carry a remote reference id.
    pub fn requires_remote_id(&self) -> bool {
        matches!(self, ResourceStatus::Training | ResourceStatus::Active)
    }

    /// Statuses that must not carry a remote reference id.
    pub fn forbids_remote_id(&self) -> bool {
        matches!(self, ResourceStatus::Draft)
    }
}

impl fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_db_str())
    }
}

impl FromStr for ResourceStatus {
    type Err = ResourceStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_db_str(s)
    }
}

/// Error when parsing an invalid resource status string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceStatusParseError(pub String);

impl fmt::Display for ResourceStatusParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid resource status: {}", self.0)
    }
}

impl std::error::Error for ResourceStatusParseError {}

/// What happens to the tentative local record when the remote create fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Delete the tentative record and surface the provider error
    Rollback,
    /// Keep the record as `failed` and surface the provider error
    Degrade,
}

/// How a voice is backed on the provider side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum VoiceType {
    /// Native clone trained from uploaded samples
    #[serde(alias = "native")]
    Custom,
    /// Reference to an existing voice at an upstream TTS provider
    #[serde(alias = "external")]
    Reference,
}

impl VoiceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoiceType::Custom => "custom",
            VoiceType::Reference => "reference",
        }
    }
}

impl FromStr for VoiceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "custom" | "native" => Ok(VoiceType::Custom),
            "reference" | "external" => Ok(VoiceType::Reference),
            other => Err(format!("Invalid voice type: {}", other)),
        }
    }
}

// ============================================================================
// ROLES
// ============================================================================

/// Role carried by an authenticated principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum Role {
    ClientAdmin,
    AgencyAdmin,
    Member,
    Viewer,
}

impl Role {
    /// Parse a role claim. Unknown roles fall back to `Member`.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "client_admin" => Role::ClientAdmin,
            "agency_admin" => Role::AgencyAdmin,
            "viewer" => Role::Viewer,
            _ => Role::Member,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::ClientAdmin => "client_admin",
            Role::AgencyAdmin => "agency_admin",
            Role::Member => "member",
            Role::Viewer => "viewer",
        }
    }

    /// Whether this role may create, update, delete or sync resources.
    pub fn is_admin(&self) -> bool {
        matches!(self, Role::ClientAdmin | Role::AgencyAdmin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Corrective action recommended by a drift report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum DriftAction {
    None,
    UpdateStatus,
    SyncRemoteId,
}
