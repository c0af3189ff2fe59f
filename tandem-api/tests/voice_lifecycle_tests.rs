//! Router-level tests for the voice lifecycle.

use axum::http::StatusCode;
use serde_json::json;
use tandem_test_utils::{provider_error, ScriptedGateway};

#[path = "support/app.rs"]
mod app;
use app::{Call, TestApp};

fn reference_voice(pvid: &str) -> serde_json::Value {
    json!({
        "name": "Narrator",
        "voice_type": "reference",
        "provider_voice_id": pvid,
    })
}

fn custom_voice() -> serde_json::Value {
    json!({
        "name": "Founder clone",
        "voice_type": "custom",
        "training_samples": [{
            "text": "Thanks for calling, how can I help?",
            "audio_url": "https://cdn.example.com/samples/1.wav",
            "duration_seconds": 4.2
        }]
    })
}

#[tokio::test]
async fn test_reference_voice_is_active_with_mirror_id() {
    let app = TestApp::with_gateway(ScriptedGateway::new().with_next_id("uv_voice_9"));

    let res = app
        .send(Call::post("/api/v1/voices").as_admin("org_a").json(reference_voice("el_rachel")))
        .await;

    assert_eq!(res.status, StatusCode::CREATED);
    assert_eq!(res.data()["status"], "active");
    assert_eq!(res.data()["ultravox_voice_id"], "uv_voice_9");
    assert_eq!(res.data()["tenant_id"], "org_a");
    assert!(res.body["meta"]["request_id"].is_string());
}

#[tokio::test]
async fn test_custom_voice_starts_training() {
    let app = TestApp::new();

    let res = app
        .send(Call::post("/api/v1/voices").as_admin("org_a").json(custom_voice()))
        .await;

    assert_eq!(res.status, StatusCode::CREATED);
    assert_eq!(res.data()["status"], "training");
}

#[tokio::test]
async fn test_provider_failure_rolls_voice_back() {
    let app = TestApp::new();
    app.gateway.fail_creates(provider_error(500));

    let res = app
        .send(Call::post("/api/v1/voices").as_admin("org_a").json(reference_voice("el_rachel")))
        .await;

    assert_eq!(res.status, StatusCode::BAD_GATEWAY);
    assert_eq!(res.error_code(), "PROVIDER_ERROR");
    assert_eq!(app.resources.resource_count(), 0);

    let list = app.send(Call::get("/api/v1/voices").as_admin("org_a")).await;
    assert_eq!(list.status, StatusCode::OK);
    assert_eq!(list.data().as_array().map(Vec::len), Some(0));

    let rolled_back = app.recorder.last_inserted().expect("tentative record was inserted");
    let get = app
        .send(Call::get(format!("/api/v1/voices/{}", rolled_back)).as_admin("org_a"))
        .await;
    assert_eq!(get.status, StatusCode::NOT_FOUND);
    assert_eq!(get.error_code(), "VOICE_NOT_FOUND");
}

#[tokio::test]
async fn test_duplicate_reference_voice_returns_existing() {
    let app = TestApp::new();

    let first = app
        .send(Call::post("/api/v1/voices").as_admin("org_a").json(reference_voice("el_rachel")))
        .await;
    assert_eq!(first.status, StatusCode::CREATED);

    let second = app
        .send(Call::post("/api/v1/voices").as_admin("org_a").json(reference_voice("el_rachel")))
        .await;
    assert_eq!(second.status, StatusCode::OK);
    assert_eq!(second.data()["id"], first.data()["id"]);
    assert_eq!(app.gateway.create_count(), 1);
}

#[tokio::test]
async fn test_custom_voice_without_samples_is_rejected() {
    let app = TestApp::new();
    let mut body = custom_voice();
    body["training_samples"] = json!([]);

    let res = app
        .send(Call::post("/api/v1/voices").as_admin("org_a").json(body))
        .await;

    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(app.gateway.create_count(), 0);
    assert_eq!(app.resources.resource_count(), 0);
}

#[tokio::test]
async fn test_sync_applies_training_progress_once() {
    let app = TestApp::with_gateway(ScriptedGateway::new().with_next_id("uv_clone_1"));
    let created = app
        .send(Call::post("/api/v1/voices").as_admin("org_a").json(custom_voice()))
        .await;
    let id = created.data()["id"].as_str().unwrap().to_string();

    app.gateway
        .set_remote_state("uv_clone_1", Some("ready"), Some(json!({"progress": 100})));

    let uri = format!("/api/v1/voices/{}/sync", id);
    let first = app.send(Call::post(uri.clone()).as_admin("org_a")).await;
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(first.data()["drift"]["has_drift"], true);
    assert_eq!(first.data()["resource"]["status"], "active");

    let second = app.send(Call::post(uri).as_admin("org_a")).await;
    assert_eq!(second.status, StatusCode::OK);
    assert_eq!(second.data()["drift"]["has_drift"], false);
}

#[tokio::test]
async fn test_member_cannot_create_voice() {
    let app = TestApp::new();

    let res = app
        .send(
            Call::post("/api/v1/voices")
                .as_role("org_a", "member")
                .json(reference_voice("el_rachel")),
        )
        .await;

    assert_eq!(res.status, StatusCode::FORBIDDEN);
    assert_eq!(app.resources.resource_count(), 0);
    assert_eq!(app.gateway.create_count(), 0);
}

#[tokio::test]
async fn test_missing_principal_is_unauthorized() {
    let app = TestApp::new();

    let res = app
        .send(Call::post("/api/v1/voices").json(reference_voice("el_rachel")))
        .await;

    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
}
