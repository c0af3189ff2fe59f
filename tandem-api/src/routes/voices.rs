//! Voice REST API Routes

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    middleware::from_fn_with_state,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use tandem_core::{Resource, ResourceKind};

use crate::{
    auth::{Access, RequestContext},
    error::{ApiError, ApiResult},
    middleware::idempotency_middleware,
    routes::{consistency, decode_body, parse_resource_id},
    services::LifecycleService,
    state::AppState,
    types::{
        CreateVoiceRequest, DeleteResponse, Envelope, ListQuery, SyncResponse, TenantQuery,
        UpdateVoiceRequest, VoiceResponse,
    },
};

fn voice_body(resource: Resource) -> ApiResult<VoiceResponse> {
    VoiceResponse::try_from(resource).map_err(consistency)
}

// ============================================================================
// ROUTE HANDLERS
// ============================================================================

/// POST /api/v1/voices - Create a voice and its remote mirror
#[utoipa::path(
    post,
    path = "/api/v1/voices",
    tag = "Voices",
    request_body = CreateVoiceRequest,
    params(
        ("idempotency-key" = Option<String>, Header, description = "Replays the first outcome for retries"),
    ),
    responses(
        (status = 201, description = "Voice created (training for custom voices)", body = Envelope<VoiceResponse>),
        (status = 200, description = "Reference voice already registered; existing record returned", body = Envelope<VoiceResponse>),
        (status = 400, description = "Invalid request", body = ApiError),
        (status = 401, description = "Missing principal", body = ApiError),
        (status = 403, description = "Role or tenant not permitted", body = ApiError),
        (status = 409, description = "Idempotency key reused with a different body", body = ApiError),
        (status = 502, description = "Provider rejected the create; nothing was kept", body = ApiError),
    )
)]
pub async fn create_voice(
    State(service): State<LifecycleService>,
    ctx: RequestContext,
    body: Bytes,
) -> ApiResult<impl IntoResponse> {
    let req: CreateVoiceRequest = serde_json::from_slice(&body)?;
    let op = ctx.authorize(req.tenant_id.as_deref(), req.client_id.as_deref(), Access::Write)?;

    let outcome = service.create(&op, req.into_new_resource()).await?;
    let status = if outcome.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    let data = voice_body(outcome.resource)?;
    Ok((status, Json(Envelope::new(data, &ctx.correlation_id))))
}

/// GET /api/v1/voices - List the tenant's voices, newest first
#[utoipa::path(
    get,
    path = "/api/v1/voices",
    tag = "Voices",
    params(ListQuery),
    responses(
        (status = 200, description = "Voices of the tenant", body = Envelope<Vec<VoiceResponse>>),
        (status = 401, description = "Missing principal", body = ApiError),
        (status = 403, description = "Tenant not permitted", body = ApiError),
    )
)]
pub async fn list_voices(
    State(service): State<LifecycleService>,
    ctx: RequestContext,
    Query(query): Query<ListQuery>,
) -> ApiResult<impl IntoResponse> {
    let op = ctx.authorize(query.tenant_id.as_deref(), query.client_id.as_deref(), Access::Read)?;

    let voices = service
        .list(&op, ResourceKind::Voice, query.status, query.page_size())
        .await?
        .into_iter()
        .map(voice_body)
        .collect::<ApiResult<Vec<_>>>()?;
    Ok(Json(Envelope::new(voices, &ctx.correlation_id)))
}

/// GET /api/v1/voices/{id} - Get one voice
#[utoipa::path(
    get,
    path = "/api/v1/voices/{id}",
    tag = "Voices",
    params(
        ("id" = String, Path, description = "Voice ID"),
        TenantQuery,
    ),
    responses(
        (status = 200, description = "Voice details", body = Envelope<VoiceResponse>),
        (status = 404, description = "No such voice in this tenant", body = ApiError),
    )
)]
pub async fn get_voice(
    State(service): State<LifecycleService>,
    ctx: RequestContext,
    Path(id): Path<String>,
    Query(query): Query<TenantQuery>,
) -> ApiResult<impl IntoResponse> {
    let id = parse_resource_id(&id)?;
    let op = ctx.authorize(query.tenant_id.as_deref(), query.client_id.as_deref(), Access::Read)?;

    let voice = service.get(&op, ResourceKind::Voice, id).await?;
    Ok(Json(Envelope::new(voice_body(voice)?, &ctx.correlation_id)))
}

/// PUT|PATCH /api/v1/voices/{id} - Update a voice and push the change
#[utoipa::path(
    patch,
    path = "/api/v1/voices/{id}",
    tag = "Voices",
    request_body = UpdateVoiceRequest,
    params(
        ("id" = String, Path, description = "Voice ID"),
        TenantQuery,
    ),
    responses(
        (status = 200, description = "Voice updated", body = Envelope<VoiceResponse>),
        (status = 400, description = "Invalid request", body = ApiError),
        (status = 404, description = "No such voice in this tenant", body = ApiError),
        (status = 502, description = "Provider rejected the update; voice marked failed", body = ApiError),
    )
)]
pub async fn update_voice(
    State(service): State<LifecycleService>,
    ctx: RequestContext,
    Path(id): Path<String>,
    Query(query): Query<TenantQuery>,
    body: Bytes,
) -> ApiResult<impl IntoResponse> {
    let id = parse_resource_id(&id)?;
    let req: UpdateVoiceRequest = decode_body(&body, false)?;
    let op = ctx.authorize(
        req.tenant_id.as_deref().or(query.tenant_id.as_deref()),
        req.client_id.as_deref().or(query.client_id.as_deref()),
        Access::Write,
    )?;

    let voice = service
        .update(&op, ResourceKind::Voice, id, move |resource| req.apply(resource))
        .await?;
    Ok(Json(Envelope::new(voice_body(voice)?, &ctx.correlation_id)))
}

/// DELETE /api/v1/voices/{id} - Delete a voice and its remote mirror
#[utoipa::path(
    delete,
    path = "/api/v1/voices/{id}",
    tag = "Voices",
    params(
        ("id" = String, Path, description = "Voice ID"),
        TenantQuery,
    ),
    responses(
        (status = 200, description = "Voice deleted", body = Envelope<DeleteResponse>),
        (status = 404, description = "No such voice in this tenant", body = ApiError),
    )
)]
pub async fn delete_voice(
    State(service): State<LifecycleService>,
    ctx: RequestContext,
    Path(id): Path<String>,
    Query(query): Query<TenantQuery>,
) -> ApiResult<impl IntoResponse> {
    let id = parse_resource_id(&id)?;
    let op = ctx.authorize(query.tenant_id.as_deref(), query.client_id.as_deref(), Access::Write)?;

    let id = service.delete(&op, ResourceKind::Voice, id).await?;
    Ok(Json(Envelope::new(
        DeleteResponse { id, deleted: true },
        &ctx.correlation_id,
    )))
}

/// POST /api/v1/voices/{id}/sync - Reconcile with the provider
#[utoipa::path(
    post,
    path = "/api/v1/voices/{id}/sync",
    tag = "Voices",
    params(
        ("id" = String, Path, description = "Voice ID"),
        TenantQuery,
    ),
    responses(
        (status = 200, description = "Reconciled voice and the drift that was corrected", body = Envelope<SyncResponse<VoiceResponse>>),
        (status = 400, description = "Custom voice without a remote mirror cannot be re-created", body = ApiError),
        (status = 404, description = "No such voice in this tenant", body = ApiError),
        (status = 502, description = "Provider unavailable", body = ApiError),
    )
)]
pub async fn sync_voice(
    State(service): State<LifecycleService>,
    ctx: RequestContext,
    Path(id): Path<String>,
    Query(query): Query<TenantQuery>,
) -> ApiResult<impl IntoResponse> {
    let id = parse_resource_id(&id)?;
    let op = ctx.authorize(query.tenant_id.as_deref(), query.client_id.as_deref(), Access::Write)?;

    let outcome = service.sync(&op, ResourceKind::Voice, id).await?;
    let data = SyncResponse {
        resource: voice_body(outcome.resource)?,
        drift: outcome.drift,
    };
    Ok(Json(Envelope::new(data, &ctx.correlation_id)))
}

/// Create the voice router.
pub fn create_router(state: AppState) -> Router {
    let idempotency = from_fn_with_state(state.idempotency.clone(), idempotency_middleware);

    Router::new()
        .route(
            "/",
            get(list_voices).post(create_voice).route_layer(idempotency),
        )
        .route(
            "/:id",
            get(get_voice)
                .put(update_voice)
                .patch(update_voice)
                .delete(delete_voice),
        )
        .route("/:id/sync", post(sync_voice))
        .with_state(state)
}
