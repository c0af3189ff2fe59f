//! Tenant partition key resolution
//!
//! Every resource belongs to exactly one tenant. The tenant is resolved once
//! per request from the candidates below and then passed explicitly to every
//! store and gateway call.

use crate::{Role, TenantResolutionError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Non-empty, trimmed tenant partition key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema), schema(value_type = String))]
pub struct TenantId(String);

impl TenantId {
    /// Parse a raw identifier, trimming whitespace. Empty input is rejected.
    pub fn parse(raw: &str) -> Result<Self, TenantResolutionError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(TenantResolutionError);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for TenantId {
    type Error = TenantResolutionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<TenantId> for String {
    fn from(value: TenantId) -> Self {
        value.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Candidate tenant identifiers gathered from a request.
#[derive(Debug, Clone, Copy, Default)]
pub struct TenantCandidates<'a> {
    /// Tenant named explicitly in the request body
    pub explicit: Option<&'a str>,
    /// Tenant claim of the authenticated principal
    pub principal: Option<&'a str>,
    /// Legacy alternate field (pre-organisation `client_id`)
    pub legacy: Option<&'a str>,
}

/// Resolve the effective tenant.
///
/// Precedence is strict: explicit request value, then principal claim, then
/// the legacy field. Blank candidates are skipped.
pub fn resolve_tenant(candidates: TenantCandidates<'_>) -> Result<TenantId, TenantResolutionError> {
    [candidates.explicit, candidates.principal, candidates.legacy]
        .into_iter()
        .flatten()
        .find_map(|raw| TenantId::parse(raw).ok())
        .ok_or(TenantResolutionError)
}

/// Already-verified caller identity handed over by the upstream verifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: String,
    pub org_id: Option<String>,
    pub role: Role,
}

impl Principal {
    pub fn new(user_id: impl Into<String>, org_id: Option<String>, role: Role) -> Self {
        Self {
            user_id: user_id.into(),
            org_id,
            role,
        }
    }

    /// Tenant claim: the organisation, or the user's personal workspace
    /// when no organisation is selected.
    pub fn tenant_claim(&self) -> Option<&str> {
        self.org_id
            .as_deref()
            .filter(|org| !org.trim().is_empty())
            .or(Some(self.user_id.as_str()))
            .filter(|claim| !claim.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_explicit_wins_over_principal() {
        let tenant = resolve_tenant(TenantCandidates {
            explicit: Some("org_explicit"),
            principal: Some("org_claim"),
            legacy: Some("client_1"),
        })
        .unwrap();
        assert_eq!(tenant.as_str(), "org_explicit");
    }

    #[test]
    fn test_blank_explicit_falls_through() {
        let tenant = resolve_tenant(TenantCandidates {
            explicit: Some("   "),
            principal: Some(" org_claim "),
            legacy: None,
        })
        .unwrap();
        assert_eq!(tenant.as_str(), "org_claim");
    }

    #[test]
    fn test_legacy_is_last_resort() {
        let tenant = resolve_tenant(TenantCandidates {
            explicit: None,
            principal: Some(""),
            legacy: Some("client_1"),
        })
        .unwrap();
        assert_eq!(tenant.as_str(), "client_1");
    }

    #[test]
    fn test_all_empty_fails() {
        let err = resolve_tenant(TenantCandidates {
            explicit: Some(""),
            principal: Some("\t"),
            legacy: None,
        });
        assert_eq!(err, Err(TenantResolutionError));
        assert_eq!(resolve_tenant(TenantCandidates::default()), Err(TenantResolutionError));
    }

    #[test]
    fn test_principal_claim_prefers_org() {
        let with_org = Principal::new("user_1", Some("org_1".to_string()), Role::Member);
        assert_eq!(with_org.tenant_claim(), Some("org_1"));

        let personal = Principal::new("user_1", Some(" ".to_string()), Role::Member);
        assert_eq!(personal.tenant_claim(), Some("user_1"));

        let anonymous = Principal::new("", None, Role::Viewer);
        assert_eq!(anonymous.tenant_claim(), None);
    }

    #[test]
    fn test_tenant_id_deserialize_rejects_blank() {
        let ok: TenantId = serde_json::from_str("\" org_1 \"").unwrap();
        assert_eq!(ok.as_str(), "org_1");
        assert!(serde_json::from_str::<TenantId>("\"  \"").is_err());
    }

    proptest! {
        #[test]
        fn prop_resolved_tenant_is_trimmed_and_non_empty(
            explicit in proptest::option::of("[ a-z0-9_]{0,12}"),
            principal in proptest::option::of("[ a-z0-9_]{0,12}"),
            legacy in proptest::option::of("[ a-z0-9_]{0,12}"),
        ) {
            let result = resolve_tenant(TenantCandidates {
                explicit: explicit.as_deref(),
                principal: principal.as_deref(),
                legacy: legacy.as_deref(),
            });
            let first_usable = [explicit.as_deref(), principal.as_deref(), legacy.as_deref()]
                .into_iter()
                .flatten()
                .map(str::trim)
                .find(|s| !s.is_empty());
            match (result, first_usable) {
                (Ok(tenant), Some(expected)) => {
                    prop_assert_eq!(tenant.as_str(), expected);
                    prop_assert_eq!(tenant.as_str().trim(), tenant.as_str());
                }
                (Err(_), None) => {}
                (got, expected) => prop_assert!(false, "got {:?}, expected {:?}", got, expected),
            }
        }
    }
}
