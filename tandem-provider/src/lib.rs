//! TANDEM Remote Provider Gateway
//!
//! One network round trip per operation, no internal retry. Every failure
//! (non-2xx, transport error, timeout, undecodable body) is a
//! [`ProviderError`]; retry policy belongs to the caller.

pub mod decode;
pub mod payload;
pub mod redact;
pub mod ultravox;

pub use decode::{decode_remote_id, decode_snapshot, DecodeError};
pub use payload::{agent_payload, voice_payload, RemotePayload};
pub use ultravox::{ProviderConfig, UltravoxGateway};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use tandem_core::{ProviderError, RemoteSnapshot, ResourceKind, TenantId};

/// Provider-assigned identifier of a remote mirror.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemoteId(String);

impl RemoteId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for RemoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Gateway to the remote provider.
///
/// The tenant is passed on every call so provider traffic can be attributed;
/// implementations hold no per-tenant state.
#[async_trait]
pub trait RemoteGateway: Send + Sync {
    /// Provider name used in errors and logs.
    fn provider(&self) -> &str;

    /// Create the remote mirror. A 2xx without an id is an error.
    async fn create_resource(
        &self,
        tenant_id: &TenantId,
        payload: &RemotePayload,
    ) -> Result<RemoteId, ProviderError>;

    /// Push the local configuration to an existing mirror.
    async fn update_resource(
        &self,
        tenant_id: &TenantId,
        remote_id: &RemoteId,
        payload: &RemotePayload,
    ) -> Result<(), ProviderError>;

    /// Delete the remote mirror.
    async fn delete_resource(
        &self,
        tenant_id: &TenantId,
        kind: ResourceKind,
        remote_id: &RemoteId,
    ) -> Result<(), ProviderError>;

    /// Fetch the current remote state.
    async fn fetch_resource(
        &self,
        tenant_id: &TenantId,
        kind: ResourceKind,
        remote_id: &RemoteId,
    ) -> Result<RemoteSnapshot, ProviderError>;
}
