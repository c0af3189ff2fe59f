//! REST API Routes
//!
//! - `/health`: liveness, no principal required
//! - `/openapi.json`: generated API document
//! - `/api/v1/agents`, `/api/v1/voices`: tenant-scoped resource lifecycle

pub mod agents;
pub mod health;
pub mod voices;

use std::time::Duration;

use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use tandem_core::{ConsistencyError, ResourceId, TandemError};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use crate::config::ApiConfig;
use crate::constants::{
    IDEMPOTENCY_KEY_HEADER, IDEMPOTENCY_REPLAY_HEADER, PRINCIPAL_ORG_HEADER,
    PRINCIPAL_ROLE_HEADER, PRINCIPAL_USER_HEADER, REQUEST_ID_HEADER,
};
use crate::error::{ApiError, ApiResult};
use crate::openapi::ApiDoc;
use crate::state::AppState;

/// Build the complete API router.
pub fn create_api_router(state: AppState, api_config: &ApiConfig) -> Router {
    let api_routes = Router::new()
        .nest("/agents", agents::create_router(state.clone()))
        .nest("/voices", voices::create_router(state.clone()));

    Router::new()
        .nest("/api/v1", api_routes)
        .nest("/health", health::create_router(state))
        .route("/openapi.json", get(openapi_json))
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer(api_config))
}

fn build_cors_layer(config: &ApiConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::ACCEPT,
            HeaderName::from_static(IDEMPOTENCY_KEY_HEADER),
            HeaderName::from_static(REQUEST_ID_HEADER),
            HeaderName::from_static(PRINCIPAL_USER_HEADER),
            HeaderName::from_static(PRINCIPAL_ORG_HEADER),
            HeaderName::from_static(PRINCIPAL_ROLE_HEADER),
        ])
        .expose_headers([HeaderName::from_static(IDEMPOTENCY_REPLAY_HEADER)])
        .max_age(Duration::from_secs(config.cors_max_age_secs));

    if config.cors_origins.is_empty() {
        tracing::info!("CORS: Development mode - allowing all origins");
        cors.allow_origin(Any).allow_headers(Any).expose_headers(Any)
    } else {
        tracing::info!(
            "CORS: Production mode - allowing origins: {:?}",
            config.cors_origins
        );
        let origins: Vec<HeaderValue> = config
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();

        if config.cors_allow_credentials {
            cors.allow_origin(origins).allow_credentials(true)
        } else {
            cors.allow_origin(origins)
        }
    }
}

async fn openapi_json() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}

// ============================================================================
// HANDLER HELPERS
// ============================================================================

/// Parse a path id, answering 400 instead of axum's plain-text rejection.
pub(crate) fn parse_resource_id(raw: &str) -> ApiResult<ResourceId> {
    Ok(uuid::Uuid::parse_str(raw.trim())?)
}

/// Decode a JSON body. An empty body decodes as `T::default()` when
/// `allow_empty` is set.
pub(crate) fn decode_body<T>(body: &[u8], allow_empty: bool) -> ApiResult<T>
where
    T: serde::de::DeserializeOwned + Default,
{
    if allow_empty && body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    Ok(serde_json::from_slice(body)?)
}

pub(crate) fn consistency(err: ConsistencyError) -> ApiError {
    TandemError::from(err).into()
}
