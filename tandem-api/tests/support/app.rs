//! Shared harness for router-level tests: the real router over in-memory
//! stores and a scripted provider.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use serde_json::Value;
use std::sync::Arc;
use tandem_api::{create_api_router, ApiConfig, AppState};
use tandem_test_utils::{
    InMemoryIdempotencyStore, InMemoryResourceStore, RecordingResourceStore, ScriptedGateway,
};
use tower::ServiceExt;

pub struct TestApp {
    pub router: Router,
    pub gateway: ScriptedGateway,
    pub resources: InMemoryResourceStore,
    /// Wraps `resources`; keeps ids of rows that were rolled back
    pub recorder: RecordingResourceStore,
    pub idempotency: InMemoryIdempotencyStore,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_gateway(ScriptedGateway::new())
    }

    pub fn with_gateway(gateway: ScriptedGateway) -> Self {
        let recorder = RecordingResourceStore::new();
        let resources = recorder.inner().clone();
        let idempotency = InMemoryIdempotencyStore::new();
        let config = ApiConfig::default();
        let state = AppState::new(
            Arc::new(recorder.clone()),
            Arc::new(idempotency.clone()),
            Arc::new(gateway.clone()),
            &config,
        );
        Self {
            router: create_api_router(state, &config),
            gateway,
            resources,
            recorder,
            idempotency,
        }
    }

    pub async fn send(&self, call: Call) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(call.build())
            .await
            .expect("router is infallible");

        let status = response.status();
        let replayed = response
            .headers()
            .get("x-idempotency-replay")
            .is_some_and(|v| v == "true");
        let raw = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body readable")
            .to_vec();
        let body = serde_json::from_slice(&raw).unwrap_or(Value::Null);

        TestResponse {
            status,
            replayed,
            body,
            raw,
        }
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub replayed: bool,
    pub body: Value,
    pub raw: Vec<u8>,
}

impl TestResponse {
    /// `data` of a success envelope.
    pub fn data(&self) -> &Value {
        &self.body["data"]
    }

    /// `code` of an error body.
    pub fn error_code(&self) -> &str {
        self.body["code"].as_str().unwrap_or_default()
    }
}

/// Request builder carrying the verified principal headers.
pub struct Call {
    method: Method,
    uri: String,
    headers: Vec<(&'static str, String)>,
    body: Option<String>,
}

impl Call {
    pub fn new(method: Method, uri: impl Into<String>) -> Self {
        Self {
            method,
            uri: uri.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn get(uri: impl Into<String>) -> Self {
        Self::new(Method::GET, uri)
    }

    pub fn post(uri: impl Into<String>) -> Self {
        Self::new(Method::POST, uri)
    }

    pub fn patch(uri: impl Into<String>) -> Self {
        Self::new(Method::PATCH, uri)
    }

    pub fn delete(uri: impl Into<String>) -> Self {
        Self::new(Method::DELETE, uri)
    }

    /// Principal belonging to `tenant` with the given role claim.
    pub fn as_role(mut self, tenant: &str, role: &str) -> Self {
        self.headers.push(("x-principal-user", format!("user_{}", tenant)));
        self.headers.push(("x-principal-org", tenant.to_string()));
        self.headers.push(("x-principal-role", role.to_string()));
        self
    }

    pub fn as_admin(self, tenant: &str) -> Self {
        self.as_role(tenant, "client_admin")
    }

    pub fn idempotency_key(mut self, key: &str) -> Self {
        self.headers.push(("idempotency-key", key.to_string()));
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body.to_string());
        self
    }

    /// JSON body sent exactly as written.
    pub fn raw_json(mut self, body: &str) -> Self {
        self.body = Some(body.to_string());
        self
    }

    pub fn build(self) -> Request<Body> {
        let mut builder = Request::builder().method(self.method).uri(self.uri);
        for (name, value) in self.headers {
            builder = builder.header(name, value);
        }
        let body = match self.body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(json)
            }
            None => Body::empty(),
        };
        builder.body(body).expect("valid request")
    }
}
