//! Agent REST API Routes
//!
//! Handlers resolve and authorize the tenant, then hand over to the
//! lifecycle service.

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
        AgentResponse, CreateAgentRequest, CreateDraftAgentRequest, DeleteResponse, Envelope,
        ListQuery, SyncResponse, TenantQuery, UpdateAgentRequest,
    },
};

fn agent_body(resource: Resource) -> ApiResult<AgentResponse> {
    AgentResponse::try_from(resource).map_err(consistency)
}

// ============================================================================
// ROUTE HANDLERS
// ============================================================================

/// POST /api/v1/agents - Create an agent and its remote mirror
#[utoipa::path(
    post,
    path = "/api/v1/agents",
    tag = "Agents",
    request_body = CreateAgentRequest,
    params(
        ("idempotency-key" = Option<String>, Header, description = "Replays the first outcome for retries"),
    ),
    responses(
        (status = 201, description = "Agent created (active, or draft when not yet eligible)", body = Envelope<AgentResponse>),
        (status = 400, description = "Invalid request", body = ApiError),
        (status = 401, description = "Missing principal", body = ApiError),
        (status = 403, description = "Role or tenant not permitted", body = ApiError),
        (status = 409, description = "Idempotency key reused with a different body", body = ApiError),
        (status = 502, description = "Provider rejected the create; agent kept as failed", body = ApiError),
    )
)]
pub async fn create_agent(
    State(service): State<LifecycleService>,
    ctx: RequestContext,
    body: Bytes,
) -> ApiResult<impl IntoResponse> {
    let req: CreateAgentRequest = serde_json::from_slice(&body)?;
    let op = ctx.authorize(req.tenant_id.as_deref(), req.client_id.as_deref(), Access::Write)?;

    let outcome = service.create(&op, req.into_new_resource()).await?;
    let data = agent_body(outcome.resource)?;
    Ok((StatusCode::CREATED, Json(Envelope::new(data, &ctx.correlation_id))))
}

/// POST /api/v1/agents/draft - Create an agent with default configuration
#[utoipa::path(
    post,
    path = "/api/v1/agents/draft",
    tag = "Agents",
    request_body = CreateDraftAgentRequest,
    responses(
        (status = 201, description = "Agent created, bound to the newest synced voice when there is one", body = Envelope<AgentResponse>),
        (status = 401, description = "Missing principal", body = ApiError),
        (status = 403, description = "Role or tenant not permitted", body = ApiError),
        (status = 502, description = "Provider rejected the create", body = ApiError),
    )
)]
pub async fn create_draft_agent(
    State(service): State<LifecycleService>,
    ctx: RequestContext,
    body: Bytes,
) -> ApiResult<impl IntoResponse> {
    let req: CreateDraftAgentRequest = decode_body(&body, true)?;
    let op = ctx.authorize(req.tenant_id.as_deref(), req.client_id.as_deref(), Access::Write)?;

    let outcome = service.create_draft_agent(&op).await?;
    let data = agent_body(outcome.resource)?;
    Ok((StatusCode::CREATED, Json(Envelope::new(data, &ctx.correlation_id))))
}

/// GET /api/v1/agents - List the tenant's agents, newest first
#[utoipa::path(
    get,
    path = "/api/v1/agents",
    tag = "Agents",
    params(ListQuery),
    responses(
        (status = 200, description = "Agents of the tenant", body = Envelope<Vec<AgentResponse>>),
        (status = 401, description = "Missing principal", body = ApiError),
        (status = 403, description = "Tenant not permitted", body = ApiError),
    )
)]
pub async fn list_agents(
    State(service): State<LifecycleService>,
    ctx: RequestContext,
    Query(query): Query<ListQuery>,
) -> ApiResult<impl IntoResponse> {
    let op = ctx.authorize(query.tenant_id.as_deref(), query.client_id.as_deref(), Access::Read)?;

    let agents = service
        .list(&op, ResourceKind::Agent, query.status, query.page_size())
        .await?
        .into_iter()
        .map(agent_body)
        .collect::<ApiResult<Vec<_>>>()?;
    Ok(Json(Envelope::new(agents, &ctx.correlation_id)))
}

/// GET /api/v1/agents/{id} - Get one agent
#[utoipa::path(
    get,
    path = "/api/v1/agents/{id}",
    tag = "Agents",
    params(
        ("id" = String, Path, description = "Agent ID"),
        TenantQuery,
    ),
    responses(
        (status = 200, description = "Agent details", body = Envelope<AgentResponse>),
        (status = 404, description = "No such agent in this tenant", body = ApiError),
    )
)]
pub async fn get_agent(
    State(service): State<LifecycleService>,
    ctx: RequestContext,
    Path(id): Path<String>,
    Query(query): Query<TenantQuery>,
) -> ApiResult<impl IntoResponse> {
    let id = parse_resource_id(&id)?;
    let op = ctx.authorize(query.tenant_id.as_deref(), query.client_id.as_deref(), Access::Read)?;

    let agent = service.get(&op, ResourceKind::Agent, id).await?;
    Ok(Json(Envelope::new(agent_body(agent)?, &ctx.correlation_id)))
}

/// PUT|PATCH /api/v1/agents/{id} - Update an agent and push the change
#[utoipa::path(
    patch,
    path = "/api/v1/agents/{id}",
    tag = "Agents",
    request_body = UpdateAgentRequest,
    params(
        ("id" = String, Path, description = "Agent ID"),
        TenantQuery,
    ),
    responses(
        (status = 200, description = "Agent updated", body = Envelope<AgentResponse>),
        (status = 400, description = "Invalid request", body = ApiError),
        (status = 404, description = "No such agent in this tenant", body = ApiError),
        (status = 502, description = "Provider rejected the update; agent marked failed", body = ApiError),
    )
)]
pub async fn update_agent(
    State(service): State<LifecycleService>,
    ctx: RequestContext,
    Path(id): Path<String>,
    Query(query): Query<TenantQuery>,
    body: Bytes,
) -> ApiResult<impl IntoResponse> {
    let id = parse_resource_id(&id)?;
    let req: UpdateAgentRequest = decode_body(&body, false)?;
    let op = ctx.authorize(
        req.tenant_id.as_deref().or(query.tenant_id.as_deref()),
        req.client_id.as_deref().or(query.client_id.as_deref()),
        Access::Write,
    )?;

    let agent = service
        .update(&op, ResourceKind::Agent, id, move |resource| req.apply(resource))
        .await?;
    Ok(Json(Envelope::new(agent_body(agent)?, &ctx.correlation_id)))
}

/// DELETE /api/v1/agents/{id} - Delete an agent and its remote mirror
#[utoipa::path(
    delete,
    path = "/api/v1/agents/{id}",
    tag = "Agents",
    params(
        ("id" = String, Path, description = "Agent ID"),
        TenantQuery,
    ),
    responses(
        (status = 200, description = "Agent deleted", body = Envelope<DeleteResponse>),
        (status = 404, description = "No such agent in this tenant", body = ApiError),
    )
)]
pub async fn delete_agent(
    State(service): State<LifecycleService>,
    ctx: RequestContext,
    Path(id): Path<String>,
    Query(query): Query<TenantQuery>,
) -> ApiResult<impl IntoResponse> {
    let id = parse_resource_id(&id)?;
    let op = ctx.authorize(query.tenant_id.as_deref(), query.client_id.as_deref(), Access::Write)?;

    let id = service.delete(&op, ResourceKind::Agent, id).await?;
    Ok(Json(Envelope::new(
        DeleteResponse { id, deleted: true },
        &ctx.correlation_id,
    )))
}

/// POST /api/v1/agents/{id}/sync - Reconcile with the provider
#[utoipa::path(
    post,
    path = "/api/v1/agents/{id}/sync",
    tag = "Agents",
    params(
        ("id" = String, Path, description = "Agent ID"),
        TenantQuery,
    ),
    responses(
        (status = 200, description = "Reconciled agent and the drift that was corrected", body = Envelope<SyncResponse<AgentResponse>>),
        (status = 400, description = "Agent is not eligible for a remote mirror", body = ApiError),
        (status = 404, description = "No such agent in this tenant", body = ApiError),
        (status = 502, description = "Provider unavailable", body = ApiError),
    )
)]
pub async fn sync_agent(
    State(service): State<LifecycleService>,
    ctx: RequestContext,
    Path(id): Path<String>,
    Query(query): Query<TenantQuery>,
) -> ApiResult<impl IntoResponse> {
    let id = parse_resource_id(&id)?;
    let op = ctx.authorize(query.tenant_id.as_deref(), query.client_id.as_deref(), Access::Write)?;

    let outcome = service.sync(&op, ResourceKind::Agent, id).await?;
    let data = SyncResponse {
        resource: agent_body(outcome.resource)?,
        drift: outcome.drift,
    };
    Ok(Json(Envelope::new(data, &ctx.correlation_id)))
}

/// Create the agent router.
pub fn create_router(state: AppState) -> Router {
    let idempotency = from_fn_with_state(state.idempotency.clone(), idempotency_middleware);

    Router::new()
        .route(
            "/",
            get(list_agents)
                .post(create_agent)
                .route_layer(idempotency.clone()),
        )
        .route("/draft", post(create_draft_agent).route_layer(idempotency))
        .route(
            "/:id",
            get(get_agent)
                .put(update_agent)
                .patch(update_agent)
                .delete(delete_agent),
        )
        .route("/:id/sync", post(sync_agent))
        .with_state(state)
}
