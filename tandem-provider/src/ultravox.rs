//! Ultravox HTTP gateway

use crate::decode::{decode_remote_id, decode_snapshot, parse_body, DecodeError};
use crate::redact::redact;
use crate::{RemoteGateway, RemoteId, RemotePayload};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use std::time::Duration;
use tandem_core::{ProviderError, RemoteSnapshot, ResourceKind, TenantId};

pub const PROVIDER_NAME: &str = "ultravox";
pub const DEFAULT_BASE_URL: &str = "https://api.ultravox.ai/api";
pub const API_KEY_HEADER: &str = "X-API-Key";

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_MEDIA_TIMEOUT_SECS: u64 = 120;
const MIN_MEDIA_TIMEOUT_SECS: u64 = 30;
const MAX_MEDIA_TIMEOUT_SECS: u64 = 120;

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Provider connection settings.
#[derive(Clone)]
pub struct ProviderConfig {
    pub api_key: SecretString,
    pub base_url: String,
    /// Timeout for plain JSON calls
    pub timeout: Duration,
    /// Timeout for calls carrying training media
    pub media_timeout: Duration,
}

impl ProviderConfig {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        let api_key: String = api_key.into();
        Self {
            api_key: SecretString::new(api_key.into_boxed_str()),
            base_url: base_url.into(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            media_timeout: Duration::from_secs(DEFAULT_MEDIA_TIMEOUT_SECS),
        }
    }

    /// Load from environment variables:
    /// - `ULTRAVOX_API_KEY` (empty when unset; `is_configured` reports it)
    /// - `ULTRAVOX_BASE_URL`
    /// - `TANDEM_PROVIDER_TIMEOUT_SECS`
    /// - `TANDEM_PROVIDER_MEDIA_TIMEOUT_SECS` (clamped to 30..=120)
    pub fn from_env() -> Self {
        let api_key = std::env::var("ULTRAVOX_API_KEY").unwrap_or_default();
        let base_url =
            std::env::var("ULTRAVOX_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let timeout_secs = std::env::var("TANDEM_PROVIDER_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        let media_timeout_secs = std::env::var("TANDEM_PROVIDER_MEDIA_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_MEDIA_TIMEOUT_SECS)
            .clamp(MIN_MEDIA_TIMEOUT_SECS, MAX_MEDIA_TIMEOUT_SECS);

        Self {
            timeout: Duration::from_secs(timeout_secs.max(1)),
            media_timeout: Duration::from_secs(media_timeout_secs),
            ..Self::new(api_key, base_url)
        }
    }

    pub fn with_timeouts(mut self, timeout: Duration, media_timeout: Duration) -> Self {
        self.timeout = timeout;
        self.media_timeout = media_timeout;
        self
    }

    pub fn is_configured(&self) -> bool {
        !self.api_key.expose_secret().trim().is_empty()
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .field("timeout", &self.timeout)
            .field("media_timeout", &self.media_timeout)
            .finish()
    }
}

// ============================================================================
// GATEWAY
// ============================================================================

/// reqwest-backed gateway for the Ultravox REST API.
pub struct UltravoxGateway {
    client: Client,
    config: ProviderConfig,
}

impl UltravoxGateway {
    pub fn new(config: ProviderConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ProviderError::new(PROVIDER_NAME, None, format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }

    fn collection(kind: ResourceKind) -> &'static str {
        match kind {
            ResourceKind::Agent => "agents",
            ResourceKind::Voice => "voices",
        }
    }

    fn url(&self, kind: ResourceKind, remote_id: Option<&RemoteId>) -> String {
        let base = self.config.base_url.trim_end_matches('/');
        match remote_id {
            Some(id) => format!("{}/{}/{}", base, Self::collection(kind), id),
            None => format!("{}/{}", base, Self::collection(kind)),
        }
    }

    fn request(&self, method: Method, url: String, timeout: Duration) -> RequestBuilder {
        self.client
            .request(method, url)
            .header(API_KEY_HEADER, self.config.api_key.expose_secret())
            .timeout(timeout)
    }

    fn secret(&self) -> &str {
        self.config.api_key.expose_secret()
    }

    /// Send a request, mapping transport failures and non-2xx statuses.
    async fn send(&self, builder: RequestBuilder, timeout: Duration) -> Result<(u16, Value), ProviderError> {
        let response = builder.send().await.map_err(|e| self.transport_error(e, timeout))?;
        self.read(response).await
    }

    async fn read(&self, response: Response) -> Result<(u16, Value), ProviderError> {
        let status = response.status().as_u16();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ProviderError::new(PROVIDER_NAME, Some(status), format!("Failed to read response body: {}", redact(&e.to_string(), self.secret()))))?;

        if !(200..300).contains(&status) {
            return Err(error_from_status(status, &String::from_utf8_lossy(&bytes), self.secret()));
        }

        parse_body(&bytes)
            .map(|body| (status, body))
            .map_err(|e| decode_failure(status, e))
    }

    fn transport_error(&self, err: reqwest::Error, timeout: Duration) -> ProviderError {
        if err.is_timeout() {
            return ProviderError::new(
                PROVIDER_NAME,
                None,
                format!("request timed out after {}s", timeout.as_secs()),
            )
            .with_details(json!({ "timeout_secs": timeout.as_secs() }));
        }
        ProviderError::new(
            PROVIDER_NAME,
            None,
            format!("HTTP request failed: {}", redact(&err.to_string(), self.secret())),
        )
    }

    fn timeout_for(&self, payload: Option<&RemotePayload>) -> Duration {
        match payload {
            Some(p) if p.media => self.config.media_timeout,
            _ => self.config.timeout,
        }
    }
}

impl std::fmt::Debug for UltravoxGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UltravoxGateway")
            .field("config", &self.config)
            .finish()
    }
}

/// Map a non-2xx response into a provider error. Provider text is scrubbed
/// of the API key and truncated; a JSON `detail`/`message`/`error` field is
/// preferred over the raw body.
pub fn error_from_status(status: u16, body: &str, secret: &str) -> ProviderError {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let message = parsed
        .as_ref()
        .and_then(|v| {
            ["detail", "message", "error"]
                .iter()
                .find_map(|field| v.get(*field).and_then(Value::as_str))
        })
        .map(str::to_string)
        .unwrap_or_else(|| body.trim().to_string());
    let message = if message.is_empty() {
        format!("provider returned HTTP {}", status)
    } else {
        redact(&message, secret)
    };

    ProviderError::new(PROVIDER_NAME, Some(status), message).with_details(json!({
        "provider_details": redact(body, secret),
    }))
}

fn decode_failure(status: u16, err: DecodeError) -> ProviderError {
    ProviderError::new(PROVIDER_NAME, Some(status), err.to_string())
}

#[async_trait]
impl RemoteGateway for UltravoxGateway {
    fn provider(&self) -> &str {
        PROVIDER_NAME
    }

    async fn create_resource(
        &self,
        tenant_id: &TenantId,
        payload: &RemotePayload,
    ) -> Result<RemoteId, ProviderError> {
        let timeout = self.timeout_for(Some(payload));
        let url = self.url(payload.kind, None);
        tracing::debug!(tenant_id = %tenant_id, kind = %payload.kind, media = payload.media, "Creating remote resource");

        let builder = self.request(Method::POST, url, timeout).json(&payload.body);
        let (status, body) = self.send(builder, timeout).await?;
        decode_remote_id(&body).map_err(|e| decode_failure(status, e))
    }

    async fn update_resource(
        &self,
        tenant_id: &TenantId,
        remote_id: &RemoteId,
        payload: &RemotePayload,
    ) -> Result<(), ProviderError> {
        let timeout = self.timeout_for(Some(payload));
        let url = self.url(payload.kind, Some(remote_id));
        tracing::debug!(tenant_id = %tenant_id, kind = %payload.kind, remote_id = %remote_id, "Updating remote resource");

        let builder = self.request(Method::PATCH, url, timeout).json(&payload.body);
        self.send(builder, timeout).await.map(|_| ())
    }

    async fn delete_resource(
        &self,
        tenant_id: &TenantId,
        kind: ResourceKind,
        remote_id: &RemoteId,
    ) -> Result<(), ProviderError> {
        let timeout = self.timeout_for(None);
        let url = self.url(kind, Some(remote_id));
        tracing::debug!(tenant_id = %tenant_id, kind = %kind, remote_id = %remote_id, "Deleting remote resource");

        let builder = self.request(Method::DELETE, url, timeout);
        self.send(builder, timeout).await.map(|_| ())
    }

    async fn fetch_resource(
        &self,
        tenant_id: &TenantId,
        kind: ResourceKind,
        remote_id: &RemoteId,
    ) -> Result<RemoteSnapshot, ProviderError> {
        let timeout = self.timeout_for(None);
        let url = self.url(kind, Some(remote_id));
        tracing::debug!(tenant_id = %tenant_id, kind = %kind, remote_id = %remote_id, "Fetching remote resource");

        let builder = self.request(Method::GET, url, timeout);
        let (status, body) = self.send(builder, timeout).await?;
        decode_snapshot(&body, remote_id).map_err(|e| decode_failure(status, e))
    }
}
