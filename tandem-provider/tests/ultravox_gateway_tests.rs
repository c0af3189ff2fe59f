//! Gateway tests against a local axum stand-in for the provider.

use axum::extract::Path;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::time::Duration;
use tandem_core::{AgentSpec, ResourceKind, TenantId};
use tandem_provider::{agent_payload, ProviderConfig, RemoteGateway, RemoteId, UltravoxGateway};

const API_KEY: &str = "sk_test_gateway_key";

async fn spawn_provider(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}/api", addr)
}

fn tenant() -> TenantId {
    TenantId::parse("org_gateway").unwrap()
}

fn gateway(base_url: String, timeout: Duration) -> UltravoxGateway {
    let config = ProviderConfig::new(API_KEY, base_url).with_timeouts(timeout, timeout);
    UltravoxGateway::new(config).unwrap()
}

#[tokio::test]
async fn test_create_decodes_agent_id_and_sends_api_key() {
    let router = Router::new().route(
        "/api/agents",
        post(|headers: HeaderMap, Json(body): Json<Value>| async move {
            if headers.get("x-api-key").and_then(|v| v.to_str().ok()) != Some(API_KEY) {
                return (StatusCode::UNAUTHORIZED, Json(json!({"detail": "bad key"})));
            }
            assert_eq!(body["name"], "Support");
            (StatusCode::CREATED, Json(json!({"agentId": "uv_123"})))
        }),
    );
    let base = spawn_provider(router).await;
    let gateway = gateway(base, Duration::from_secs(5));

    let payload = agent_payload("Support", &AgentSpec::default(), Some("uv_voice"));
    let id = gateway.create_resource(&tenant(), &payload).await.unwrap();
    assert_eq!(id, RemoteId::new("uv_123"));
}

#[tokio::test]
async fn test_create_without_id_is_provider_error() {
    let router = Router::new().route(
        "/api/agents",
        post(|| async { (StatusCode::OK, Json(json!({"name": "Support"}))) }),
    );
    let base = spawn_provider(router).await;
    let gateway = gateway(base, Duration::from_secs(5));

    let payload = agent_payload("Support", &AgentSpec::default(), None);
    let err = gateway.create_resource(&tenant(), &payload).await.unwrap_err();
    assert_eq!(err.http_status, Some(200));
    assert!(err.message.contains("missing resource id"));
}

#[tokio::test]
async fn test_non_2xx_is_provider_error_without_secret() {
    let router = Router::new().route(
        "/api/agents",
        post(|| async {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"detail": format!("key {} rejected", API_KEY)})),
            )
        }),
    );
    let base = spawn_provider(router).await;
    let gateway = gateway(base, Duration::from_secs(5));

    let payload = agent_payload("Support", &AgentSpec::default(), None);
    let err = gateway.create_resource(&tenant(), &payload).await.unwrap_err();
    assert_eq!(err.http_status, Some(500));
    assert_eq!(err.provider, "ultravox");
    assert!(!err.message.contains(API_KEY));
    assert!(!err.details.to_string().contains(API_KEY));
}

#[tokio::test]
async fn test_timeout_is_provider_error() {
    let router = Router::new().route(
        "/api/voices/:id",
        get(|| async {
            tokio::time::sleep(Duration::from_secs(3)).await;
            Json(json!({"voiceId": "uv_1"}))
        }),
    );
    let base = spawn_provider(router).await;
    let gateway = gateway(base, Duration::from_millis(200));

    let err = gateway
        .fetch_resource(&tenant(), ResourceKind::Voice, &RemoteId::new("uv_1"))
        .await
        .unwrap_err();
    assert_eq!(err.http_status, None);
    assert!(err.message.contains("timed out"));
}

#[tokio::test]
async fn test_fetch_and_delete() {
    let router = Router::new().route(
        "/api/voices/:id",
        get(|Path(id): Path<String>| async move {
            Json(json!({"voiceId": id, "status": "ready", "training_info": {"progress": 100}}))
        })
        .delete(|| async { StatusCode::NO_CONTENT }),
    );
    let base = spawn_provider(router).await;
    let gateway = gateway(base, Duration::from_secs(5));
    let remote_id = RemoteId::new("uv_77");

    let snapshot = gateway
        .fetch_resource(&tenant(), ResourceKind::Voice, &remote_id)
        .await
        .unwrap();
    assert_eq!(snapshot.remote_id, "uv_77");
    assert_eq!(snapshot.status.as_deref(), Some("ready"));

    gateway
        .delete_resource(&tenant(), ResourceKind::Voice, &remote_id)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_connection_refused_is_provider_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let gateway = gateway(format!("http://{}/api", addr), Duration::from_secs(2));
    let err = gateway
        .delete_resource(&tenant(), ResourceKind::Agent, &RemoteId::new("uv_1"))
        .await
        .unwrap_err();
    assert_eq!(err.http_status, None);
    assert!(err.message.contains("HTTP request failed"));
}
