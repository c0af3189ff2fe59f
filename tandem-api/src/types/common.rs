//! Response envelope and shared query types

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tandem_core::{DriftReport, ResourceId, ResourceStatus, Timestamp};

use crate::constants::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};

/// Per-response metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Meta {
    /// Correlation id of the request
    pub request_id: String,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub ts: Timestamp,
}

/// Success body: `{ "data": ..., "meta": { "request_id", "ts" } }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Envelope<T> {
    pub data: T,
    pub meta: Meta,
}

impl<T> Envelope<T> {
    pub fn new(data: T, request_id: impl Into<String>) -> Self {
        Self {
            data,
            meta: Meta {
                request_id: request_id.into(),
                ts: Utc::now(),
            },
        }
    }
}

/// Deserializer for `Option<Option<T>>` patch fields: an absent field stays
/// `None` (with `#[serde(default)]`), an explicit `null` becomes `Some(None)`.
pub(crate) fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: serde::Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Tenant override on single-resource routes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::IntoParams))]
pub struct TenantQuery {
    /// Explicit tenant; only agency admins may name another tenant
    pub tenant_id: Option<String>,
    /// Legacy tenant field
    pub client_id: Option<String>,
}

/// Filters for list routes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::IntoParams))]
pub struct ListQuery {
    pub tenant_id: Option<String>,
    pub client_id: Option<String>,
    pub status: Option<ResourceStatus>,
    /// Page size (default 50, max 500)
    pub limit: Option<usize>,
}

impl ListQuery {
    pub fn page_size(&self) -> usize {
        self.limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE)
    }
}

/// Body of a successful delete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct DeleteResponse {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub id: ResourceId,
    pub deleted: bool,
}

/// Resource after a sync, with the drift that was found and corrected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct SyncResponse<T> {
    pub resource: T,
    pub drift: DriftReport,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_size_bounds() {
        assert_eq!(ListQuery::default().page_size(), 50);
        let huge = ListQuery {
            limit: Some(10_000),
            ..Default::default()
        };
        assert_eq!(huge.page_size(), 500);
        let zero = ListQuery {
            limit: Some(0),
            ..Default::default()
        };
        assert_eq!(zero.page_size(), 1);
    }

    #[test]
    fn test_envelope_shape() {
        let envelope = Envelope::new(DeleteResponse { id: uuid::Uuid::nil(), deleted: true }, "req-1");
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["data"]["deleted"], true);
        assert_eq!(json["meta"]["request_id"], "req-1");
        assert!(json["meta"]["ts"].is_string());
    }
}
