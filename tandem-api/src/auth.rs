//! Request principal and tenant authorization.
//!
//! Token verification happens upstream; the verified principal arrives in
//! trusted headers. This module turns those headers into a [`RequestContext`]
//! and decides which tenant a request may act on.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts, http::HeaderMap};
use tandem_core::{
    resolve_tenant, ForbiddenError, Principal, Role, TandemError, TandemResult, TenantCandidates,
    TenantId,
};
use uuid::Uuid;

use crate::constants::{
    PRINCIPAL_ORG_HEADER, PRINCIPAL_ROLE_HEADER, PRINCIPAL_USER_HEADER, REQUEST_ID_HEADER,
};
use crate::error::ApiError;
use crate::services::OpContext;

// ============================================================================
// ACCESS LEVEL
// ============================================================================

/// What a request intends to do with the tenant's resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
}

// ============================================================================
// REQUEST CONTEXT
// ============================================================================

/// Verified principal plus the request's correlation id.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub principal: Principal,
    pub correlation_id: String,
}

impl RequestContext {
    /// Build from request headers. A missing user header is a 401.
    pub fn from_headers(headers: &HeaderMap) -> Result<Self, ApiError> {
        let user_id = header_value(headers, PRINCIPAL_USER_HEADER)
            .ok_or_else(|| ApiError::unauthorized("Missing verified principal"))?;
        let org_id = header_value(headers, PRINCIPAL_ORG_HEADER);
        let role = header_value(headers, PRINCIPAL_ROLE_HEADER)
            .map(|r| Role::parse(&r))
            .unwrap_or(Role::Member);
        let correlation_id = header_value(headers, REQUEST_ID_HEADER)
            .unwrap_or_else(|| Uuid::now_v7().to_string());

        Ok(Self {
            principal: Principal::new(user_id, org_id, role),
            correlation_id,
        })
    }

    /// Resolve the tenant for this request and check the principal may act
    /// on it. Runs before any persistence.
    pub fn authorize(
        &self,
        explicit: Option<&str>,
        legacy: Option<&str>,
        access: Access,
    ) -> TandemResult<OpContext> {
        let tenant_id = authorize_tenant(&self.principal, explicit, legacy, access).map_err(|err| {
            tracing::info!(
                user_id = %self.principal.user_id,
                tenant_id = %explicit.or(legacy).unwrap_or_default(),
                correlation_id = %self.correlation_id,
                error = %err,
                "Request not authorized for tenant"
            );
            err
        })?;
        Ok(OpContext::new(tenant_id, self.correlation_id.clone()))
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Self::from_headers(&parts.headers)
    }
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

// ============================================================================
// TENANT AUTHORIZATION
// ============================================================================

/// Resolve the effective tenant and enforce cross-tenant rules.
///
/// - Mutations require an admin role.
/// - A tenant other than the principal's own claim is only honoured for
///   agency admins.
pub fn authorize_tenant(
    principal: &Principal,
    explicit: Option<&str>,
    legacy: Option<&str>,
    access: Access,
) -> TandemResult<TenantId> {
    if access == Access::Write && !principal.role.is_admin() {
        return Err(ForbiddenError::new(format!(
            "role {} may not modify resources",
            principal.role
        ))
        .into());
    }

    let claim = principal.tenant_claim();
    let tenant_id = resolve_tenant(TenantCandidates {
        explicit,
        principal: claim,
        legacy,
    })?;

    let foreign = claim.is_some_and(|own| own.trim() != tenant_id.as_str());
    if foreign && principal.role != Role::AgencyAdmin {
        return Err(TandemError::Forbidden(ForbiddenError::new(
            "principal may not act on another tenant",
        )));
    }

    Ok(tenant_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use proptest::prelude::*;
    use tandem_core::TenantResolutionError;

    fn principal(org: Option<&str>, role: Role) -> Principal {
        Principal::new("user_1", org.map(str::to_string), role)
    }

    #[test]
    fn test_context_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(PRINCIPAL_USER_HEADER, HeaderValue::from_static("user_1"));
        headers.insert(PRINCIPAL_ORG_HEADER, HeaderValue::from_static("org_acme"));
        headers.insert(PRINCIPAL_ROLE_HEADER, HeaderValue::from_static("client_admin"));
        headers.insert(REQUEST_ID_HEADER, HeaderValue::from_static("req-42"));

        let ctx = RequestContext::from_headers(&headers).unwrap();
        assert_eq!(ctx.principal.role, Role::ClientAdmin);
        assert_eq!(ctx.principal.tenant_claim(), Some("org_acme"));
        assert_eq!(ctx.correlation_id, "req-42");
    }

    #[test]
    fn test_missing_principal_is_unauthorized() {
        let err = RequestContext::from_headers(&HeaderMap::new()).unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::Unauthorized);
    }

    #[test]
    fn test_generated_correlation_id() {
        let mut headers = HeaderMap::new();
        headers.insert(PRINCIPAL_USER_HEADER, HeaderValue::from_static("user_1"));
        let ctx = RequestContext::from_headers(&headers).unwrap();
        assert!(Uuid::parse_str(&ctx.correlation_id).is_ok());
        assert_eq!(ctx.principal.role, Role::Member);
    }

    #[test]
    fn test_member_cannot_write() {
        let p = principal(Some("org_a"), Role::Member);
        assert!(matches!(
            authorize_tenant(&p, None, None, Access::Write),
            Err(TandemError::Forbidden(_))
        ));
        assert_eq!(
            authorize_tenant(&p, None, None, Access::Read).unwrap().as_str(),
            "org_a"
        );
    }

    #[test]
    fn test_foreign_tenant_requires_agency_admin() {
        let client = principal(Some("org_a"), Role::ClientAdmin);
        assert!(matches!(
            authorize_tenant(&client, Some("org_b"), None, Access::Write),
            Err(TandemError::Forbidden(_))
        ));

        let agency = principal(Some("org_a"), Role::AgencyAdmin);
        assert_eq!(
            authorize_tenant(&agency, Some("org_b"), None, Access::Write)
                .unwrap()
                .as_str(),
            "org_b"
        );
    }

    #[test]
    fn test_explicit_matching_claim_is_allowed() {
        let client = principal(Some("org_a"), Role::ClientAdmin);
        assert_eq!(
            authorize_tenant(&client, Some("  org_a "), None, Access::Write)
                .unwrap()
                .as_str(),
            "org_a"
        );
    }

    #[test]
    fn test_user_id_is_claim_for_personal_workspace() {
        let personal = principal(None, Role::ClientAdmin);
        assert_eq!(
            authorize_tenant(&personal, None, None, Access::Write)
                .unwrap()
                .as_str(),
            "user_1"
        );
    }

    #[test]
    fn test_unresolvable_tenant() {
        let nobody = Principal::new("  ", None, Role::AgencyAdmin);
        assert_eq!(
            authorize_tenant(&nobody, Some(" "), None, Access::Read),
            Err(TandemError::TenantResolution(TenantResolutionError))
        );
    }

    proptest! {
        #[test]
        fn prop_non_agency_roles_never_cross_tenants(
            own in "org_[a-z]{1,8}",
            other in "org_[a-z]{1,8}",
            role in prop_oneof![Just(Role::ClientAdmin), Just(Role::Member), Just(Role::Viewer)],
        ) {
            prop_assume!(own != other);
            let p = principal(Some(&own), role);
            let result = authorize_tenant(&p, Some(&other), None, Access::Read);
            prop_assert!(matches!(result, Err(TandemError::Forbidden(_))));
        }
    }
}
