//! Router-level tests for idempotent create retries.

use axum::http::StatusCode;
use serde_json::json;

#[path = "support/app.rs"]
mod app;
use app::{Call, TestApp};

fn voice_body(name: &str) -> serde_json::Value {
    json!({
        "name": name,
        "voice_type": "custom",
        "training_samples": [{
            "text": "Hello there",
            "audio_url": "https://cdn.example.com/samples/hello.wav"
        }]
    })
}

#[tokio::test]
async fn test_retry_replays_first_outcome() {
    let app = TestApp::new();
    let call = || {
        Call::post("/api/v1/voices")
            .as_admin("org_a")
            .idempotency_key("retry-1")
            .json(voice_body("Clone"))
    };

    let first = app.send(call()).await;
    let second = app.send(call()).await;

    assert_eq!(first.status, StatusCode::CREATED);
    assert!(!first.replayed);
    assert_eq!(second.status, StatusCode::CREATED);
    assert!(second.replayed);
    assert_eq!(second.raw, first.raw);
    assert_eq!(app.resources.resource_count(), 1);
    assert_eq!(app.gateway.create_count(), 1);
    assert_eq!(app.idempotency.record_count(), 1);
}

#[tokio::test]
async fn test_key_reuse_with_different_body_conflicts() {
    let app = TestApp::new();

    let first = app
        .send(
            Call::post("/api/v1/voices")
                .as_admin("org_a")
                .idempotency_key("retry-2")
                .json(voice_body("Clone")),
        )
        .await;
    assert_eq!(first.status, StatusCode::CREATED);

    let second = app
        .send(
            Call::post("/api/v1/voices")
                .as_admin("org_a")
                .idempotency_key("retry-2")
                .json(voice_body("Different clone")),
        )
        .await;

    assert_eq!(second.status, StatusCode::CONFLICT);
    assert_eq!(second.error_code(), "IDEMPOTENCY_CONFLICT");
    assert_eq!(app.resources.resource_count(), 1);
}

#[tokio::test]
async fn test_same_key_in_another_tenant_is_independent() {
    let app = TestApp::new();

    for tenant in ["org_a", "org_b"] {
        let res = app
            .send(
                Call::post("/api/v1/voices")
                    .as_admin(tenant)
                    .idempotency_key("shared-key")
                    .json(voice_body("Clone")),
            )
            .await;
        assert_eq!(res.status, StatusCode::CREATED);
        assert!(!res.replayed);
    }

    assert_eq!(app.resources.resource_count(), 2);
    assert_eq!(app.idempotency.record_count(), 2);
}

#[tokio::test]
async fn test_forbidden_outcome_is_not_cached() {
    let app = TestApp::new();

    let denied = app
        .send(
            Call::post("/api/v1/voices")
                .as_role("org_a", "member")
                .idempotency_key("retry-3")
                .json(voice_body("Clone")),
        )
        .await;
    assert_eq!(denied.status, StatusCode::FORBIDDEN);
    assert_eq!(app.idempotency.record_count(), 0);

    let allowed = app
        .send(
            Call::post("/api/v1/voices")
                .as_admin("org_a")
                .idempotency_key("retry-3")
                .json(voice_body("Clone")),
        )
        .await;
    assert_eq!(allowed.status, StatusCode::CREATED);
    assert!(!allowed.replayed);
}

#[tokio::test]
async fn test_retry_with_reformatted_body_replays() {
    let app = TestApp::new();

    let first = app
        .send(
            Call::post("/api/v1/voices")
                .as_admin("org_a")
                .idempotency_key("retry-4")
                .raw_json(r#"{"name":"Narrator","voice_type":"reference","provider_voice_id":"el_1"}"#),
        )
        .await;
    assert_eq!(first.status, StatusCode::CREATED);

    let retry = app
        .send(
            Call::post("/api/v1/voices")
                .as_admin("org_a")
                .idempotency_key("retry-4")
                .raw_json(
                    r#"{
                        "provider_voice_id": "el_1",
                        "name": "Narrator",
                        "voice_type": "reference"
                    }"#,
                ),
        )
        .await;

    assert_eq!(retry.status, StatusCode::CREATED);
    assert!(retry.replayed);
    assert_eq!(retry.raw, first.raw);
    assert_eq!(app.gateway.create_count(), 1);
}
