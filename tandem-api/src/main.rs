//! TANDEM API Server Entry Point
//!
//! Bootstraps configuration, picks the storage backend, spawns the
//! background jobs and starts the Axum HTTP server.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tandem_api::{
    constants::DEFAULT_API_PORT,
    create_api_router, idempotency_cleanup_task, stale_creating_sweep_task,
    telemetry::{init_tracing, TelemetryConfig},
    ApiConfig, ApiError, ApiResult, AppState, DbConfig, IdempotencyCleanupConfig, PgStore,
    StaleSweepConfig,
};
use tandem_provider::{ProviderConfig, RemoteGateway, UltravoxGateway};
use tandem_storage::{
    IdempotencyStore, InMemoryIdempotencyStore, InMemoryResourceStore, ResourceStore,
};
use tokio::sync::watch;

#[tokio::main]
async fn main() -> ApiResult<()> {
    init_tracing(&TelemetryConfig::default())?;

    let api_config = ApiConfig::from_env();

    let provider_config = ProviderConfig::from_env();
    if !provider_config.is_configured() {
        tracing::warn!("ULTRAVOX_API_KEY is not set; provider calls will be rejected");
    }
    let gateway: Arc<dyn RemoteGateway> = Arc::new(
        UltravoxGateway::new(provider_config)
            .map_err(|e| ApiError::internal_error(format!("Failed to build gateway: {}", e)))?,
    );

    let (resources, idempotency) = build_stores().await?;

    let state = AppState::new(resources, Arc::clone(&idempotency), gateway, &api_config);
    let app: Router = create_api_router(state.clone(), &api_config);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let cleanup = tokio::spawn(idempotency_cleanup_task(
        idempotency,
        IdempotencyCleanupConfig::from_env(),
        shutdown_rx.clone(),
    ));
    let sweep = tokio::spawn(stale_creating_sweep_task(
        state.lifecycle.clone(),
        StaleSweepConfig::from_env(),
        shutdown_rx,
    ));

    let addr = resolve_bind_addr()?;
    tracing::info!(%addr, "Starting TANDEM API server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;

    let server = axum::serve(listener, app);
    tokio::select! {
        result = server => {
            result.map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    let _ = shutdown_tx.send(true);
    let _ = tokio::join!(cleanup, sweep);
    Ok(())
}

/// Postgres when `TANDEM_DB_HOST` is set, in-memory otherwise.
async fn build_stores() -> ApiResult<(Arc<dyn ResourceStore>, Arc<dyn IdempotencyStore>)> {
    if DbConfig::is_configured() {
        let db_config = DbConfig::from_env();
        let store = PgStore::from_config(&db_config)?;
        store.migrate().await?;
        tracing::info!(host = %db_config.host, dbname = %db_config.dbname, "Using Postgres storage");
        let store = Arc::new(store);
        let resources: Arc<dyn ResourceStore> = store.clone();
        let idempotency: Arc<dyn IdempotencyStore> = store;
        return Ok((resources, idempotency));
    }

    tracing::warn!("TANDEM_DB_HOST is not set; using in-memory storage");
    let resources: Arc<dyn ResourceStore> = Arc::new(InMemoryResourceStore::new());
    let idempotency: Arc<dyn IdempotencyStore> = Arc::new(InMemoryIdempotencyStore::new());
    Ok((resources, idempotency))
}

fn resolve_bind_addr() -> ApiResult<SocketAddr> {
    let host = std::env::var("TANDEM_API_BIND").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port_str = std::env::var("PORT")
        .ok()
        .or_else(|| std::env::var("TANDEM_API_PORT").ok())
        .unwrap_or_else(|| DEFAULT_API_PORT.to_string());
    let port = port_str
        .parse::<u16>()
        .map_err(|_| ApiError::invalid_input(format!("Invalid port value: {}", port_str)))?;

    let addr = format!("{}:{}", host, port);
    addr.parse::<SocketAddr>()
        .map_err(|e| ApiError::invalid_input(format!("Invalid bind address {}: {}", addr, e)))
}
