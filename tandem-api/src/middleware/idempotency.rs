//! Idempotency Middleware for TANDEM API
//!
//! Create requests may carry an `Idempotency-Key` header. The middleware:
//!
//! 1. Resolves the tenant the request will act on
//! 2. Looks up (tenant, key) in the idempotency store
//! 3. Same fingerprint: replays the cached status and body verbatim
//! 4. Different fingerprint: 409 Conflict
//! 5. New key: runs the handler and caches its outcome
//!
//! The fingerprint is SHA-256 over method, path and body. A JSON body is
//! hashed in canonical form (sorted keys, no insignificant whitespace), so
//! a client that re-serializes its retry still matches. Requests whose
//! principal or tenant cannot be resolved pass through unchanged so the
//! handler reports the real error.

use std::borrow::Cow;
use std::sync::Arc;

use axum::{
    body::{Body, Bytes},
    extract::{Request, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::Value;
use tandem_core::{content_fingerprint, IdempotencyConflictError, TandemError, TenantId};
use tandem_storage::{IdempotencyRecord, IdempotencyStore};

use crate::auth::{authorize_tenant, Access, RequestContext};
use crate::config::IdempotencyConfig;
use crate::constants::{IDEMPOTENCY_REPLAY_HEADER, MAX_BODY_BYTES};
use crate::error::ApiError;

// ============================================================================
// STATE
// ============================================================================

/// Shared state for the idempotency middleware.
#[derive(Clone)]
pub struct IdempotencyState {
    pub store: Arc<dyn IdempotencyStore>,
    pub config: IdempotencyConfig,
}

impl IdempotencyState {
    pub fn new(store: Arc<dyn IdempotencyStore>, config: IdempotencyConfig) -> Self {
        Self { store, config }
    }
}

// ============================================================================
// MIDDLEWARE
// ============================================================================

/// Axum middleware deduplicating create requests by idempotency key.
///
/// Mount with `route_layer` on the create routes only.
pub async fn idempotency_middleware(
    State(state): State<IdempotencyState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if request.method() != Method::POST {
        return Ok(next.run(request).await);
    }

    let Some(key) = idempotency_key(&request, &state.config)? else {
        return Ok(next.run(request).await);
    };

    let Ok(context) = RequestContext::from_headers(request.headers()) else {
        return Ok(next.run(request).await);
    };

    let (parts, body) = request.into_parts();
    let body_bytes = axum::body::to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|e| ApiError::invalid_input(format!("Failed to read request body: {}", e)))?;

    let Some(tenant_id) = request_tenant(&context, &body_bytes) else {
        let request = Request::from_parts(parts, Body::from(body_bytes));
        return Ok(next.run(request).await);
    };

    let fingerprint = compute_fingerprint(&parts.method, parts.uri.path(), &body_bytes);

    let cached = state
        .store
        .get(&tenant_id, &key)
        .await
        .map_err(TandemError::from)?;
    if let Some(record) = cached {
        if record.fingerprint != fingerprint {
            tracing::info!(
                tenant_id = %tenant_id,
                correlation_id = %context.correlation_id,
                idempotency_key = %key,
                "Idempotency key reused with a different request"
            );
            return Err(TandemError::from(IdempotencyConflictError { key }).into());
        }
        tracing::debug!(
            tenant_id = %tenant_id,
            correlation_id = %context.correlation_id,
            idempotency_key = %key,
            "Replaying cached response"
        );
        return Ok(replay(&record));
    }

    let request = Request::from_parts(parts, Body::from(body_bytes));
    let response = next.run(request).await;

    let (resp_parts, resp_body) = response.into_parts();
    let resp_bytes = axum::body::to_bytes(resp_body, MAX_BODY_BYTES)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to buffer response: {}", e)))?;

    if is_cacheable(resp_parts.status) {
        store_outcome(
            &state,
            tenant_id,
            &key,
            fingerprint,
            resp_parts.status,
            &resp_bytes,
            &context.correlation_id,
        )
        .await;
    }

    Ok(Response::from_parts(resp_parts, Body::from(resp_bytes)))
}

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

/// Read and validate the key header. Absent means the request is not
/// deduplicated.
fn idempotency_key(request: &Request, config: &IdempotencyConfig) -> Result<Option<String>, ApiError> {
    let Some(raw) = request.headers().get(config.header_name) else {
        return Ok(None);
    };
    let key = raw
        .to_str()
        .map_err(|_| ApiError::invalid_format(config.header_name, "visible ASCII"))?
        .trim();
    if key.is_empty() || key.chars().count() > config.max_key_len {
        return Err(ApiError::invalid_input(format!(
            "Idempotency key must be 1-{} characters",
            config.max_key_len
        )));
    }
    Ok(Some(key.to_string()))
}

/// Tenant the handler will act on, resolved the same way the handler does.
fn request_tenant(context: &RequestContext, body: &Bytes) -> Option<TenantId> {
    let json: Value = serde_json::from_slice(body).unwrap_or(Value::Null);
    let explicit = json.get("tenant_id").and_then(Value::as_str);
    let legacy = json.get("client_id").and_then(Value::as_str);
    authorize_tenant(&context.principal, explicit, legacy, Access::Write).ok()
}

/// Hex SHA-256 of method + path + canonical body.
fn compute_fingerprint(method: &Method, path: &str, body: &[u8]) -> String {
    let body = canonical_body(body);
    let mut material = Vec::with_capacity(method.as_str().len() + path.len() + body.len() + 2);
    material.extend_from_slice(method.as_str().as_bytes());
    material.push(b'|');
    material.extend_from_slice(path.as_bytes());
    material.push(b'|');
    material.extend_from_slice(&body);
    content_fingerprint(&material)
}

/// JSON re-serialized with ordered object keys; anything else as sent.
fn canonical_body(body: &[u8]) -> Cow<'_, [u8]> {
    serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|json| serde_json::to_vec(&json).ok())
        .map_or(Cow::Borrowed(body), Cow::Owned)
}

/// Outcomes worth replaying. Auth failures, conflicts, rate limits and
/// transient server errors are left uncached so a retry can run again.
fn is_cacheable(status: StatusCode) -> bool {
    if status.is_success() {
        return true;
    }
    if status.is_client_error() {
        return !matches!(
            status,
            StatusCode::UNAUTHORIZED
                | StatusCode::FORBIDDEN
                | StatusCode::CONFLICT
                | StatusCode::TOO_MANY_REQUESTS
        );
    }
    status == StatusCode::BAD_GATEWAY
}

fn replay(record: &IdempotencyRecord) -> Response {
    let status = StatusCode::from_u16(record.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut response = (status, record.response_body.clone()).into_response();
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(IDEMPOTENCY_REPLAY_HEADER, HeaderValue::from_static("true"));
    response
}

/// Best effort: a failed write only costs a future replay.
async fn store_outcome(
    state: &IdempotencyState,
    tenant_id: TenantId,
    key: &str,
    fingerprint: String,
    status: StatusCode,
    body: &Bytes,
    correlation_id: &str,
) {
    let ttl = chrono::Duration::from_std(state.config.ttl).unwrap_or_else(|_| chrono::Duration::days(1));
    let record = IdempotencyRecord::new(
        tenant_id,
        key,
        fingerprint,
        status.as_u16(),
        body.to_vec(),
        ttl,
    );
    match state.store.put(&record).await {
        Ok(true) => {}
        Ok(false) => tracing::debug!(
            tenant_id = %record.tenant_id,
            correlation_id = %correlation_id,
            idempotency_key = %key,
            "Concurrent request already cached this key"
        ),
        Err(e) => tracing::warn!(
            tenant_id = %record.tenant_id,
            correlation_id = %correlation_id,
            idempotency_key = %key,
            error = %e,
            "Failed to store idempotency response"
        ),
    }
}

// ============================================================================
// TESTS
// ============================================================================
