//! Typed decoding of provider response bodies.
//!
//! The provider spells its identifier differently per endpoint and version,
//! sometimes wrapping the payload in `data`. All probing happens here.

use crate::RemoteId;
use serde_json::Value;
use tandem_core::RemoteSnapshot;
use thiserror::Error;

/// Field names the provider uses for a resource identifier, in lookup order.
pub const REMOTE_ID_FIELDS: [&str; 4] = ["id", "voiceId", "agentId", "voice_id"];

/// Errors decoding a success body.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Response body is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("Response body is not a JSON object")]
    NotAnObject,

    #[error("Response missing resource id (looked for {})", REMOTE_ID_FIELDS.join(", "))]
    MissingId,
}

fn find_id(object: &serde_json::Map<String, Value>) -> Option<RemoteId> {
    REMOTE_ID_FIELDS.iter().find_map(|field| match object.get(*field) {
        Some(Value::String(id)) if !id.trim().is_empty() => Some(RemoteId::new(id.trim())),
        _ => None,
    })
}

/// Extract the provider-assigned id from a create response.
pub fn decode_remote_id(body: &Value) -> Result<RemoteId, DecodeError> {
    let object = body.as_object().ok_or(DecodeError::NotAnObject)?;
    find_id(object)
        .or_else(|| {
            object
                .get("data")
                .and_then(Value::as_object)
                .and_then(find_id)
        })
        .ok_or(DecodeError::MissingId)
}

/// Parse raw response bytes, treating an empty body as an empty object.
pub fn parse_body(bytes: &[u8]) -> Result<Value, DecodeError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Object(Default::default()));
    }
    serde_json::from_slice(bytes).map_err(|e| DecodeError::InvalidJson(e.to_string()))
}

/// Decode a fetch response into a snapshot. When the body omits the id the
/// requested id is used.
pub fn decode_snapshot(body: &Value, requested: &RemoteId) -> Result<RemoteSnapshot, DecodeError> {
    let root = body.as_object().ok_or(DecodeError::NotAnObject)?;
    let object = root
        .get("data")
        .and_then(Value::as_object)
        .filter(|_| find_id(root).is_none())
        .unwrap_or(root);

    let remote_id = find_id(object).unwrap_or_else(|| requested.clone());
    let string_field = |names: &[&str]| {
        names
            .iter()
            .find_map(|name| object.get(*name).and_then(Value::as_str))
            .map(str::to_string)
    };
    let training_info = ["training_info", "trainingInfo"]
        .iter()
        .find_map(|name| object.get(*name))
        .filter(|value| !value.is_null())
        .cloned();

    Ok(RemoteSnapshot {
        remote_id: remote_id.into_inner(),
        status: string_field(&["status", "trainingStatus"]),
        training_info,
        name: string_field(&["name"]),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_accepts_every_spelling() {
        for field in REMOTE_ID_FIELDS {
            let mut object = serde_json::Map::new();
            object.insert(field.to_string(), json!("uv_123"));
            let body = Value::Object(object);
            assert_eq!(decode_remote_id(&body), Ok(RemoteId::new("uv_123")), "{}", field);
        }
    }

    #[test]
    fn test_decode_prefers_top_level_then_data() {
        let nested = json!({"data": {"voiceId": "uv_nested"}});
        assert_eq!(decode_remote_id(&nested), Ok(RemoteId::new("uv_nested")));

        let both = json!({"agentId": "uv_top", "data": {"id": "uv_nested"}});
        assert_eq!(decode_remote_id(&both), Ok(RemoteId::new("uv_top")));
    }

    #[test]
    fn test_decode_rejects_missing_or_blank_id() {
        assert_eq!(decode_remote_id(&json!({"name": "x"})), Err(DecodeError::MissingId));
        assert_eq!(decode_remote_id(&json!({"id": "  "})), Err(DecodeError::MissingId));
        assert_eq!(decode_remote_id(&json!({"id": 42})), Err(DecodeError::MissingId));
        assert_eq!(decode_remote_id(&json!(["uv_1"])), Err(DecodeError::NotAnObject));
    }

    #[test]
    fn test_parse_body_empty_is_object() {
        assert_eq!(parse_body(b"  ").unwrap(), json!({}));
        assert!(matches!(parse_body(b"<html>"), Err(DecodeError::InvalidJson(_))));
    }

    #[test]
    fn test_decode_snapshot_fields() {
        let body = json!({
            "voiceId": "uv_1",
            "name": "Clone",
            "status": "ready",
            "training_info": {"progress": 100}
        });
        let snapshot = decode_snapshot(&body, &RemoteId::new("uv_1")).unwrap();
        assert_eq!(snapshot.remote_id, "uv_1");
        assert_eq!(snapshot.status.as_deref(), Some("ready"));
        assert_eq!(snapshot.training_info, Some(json!({"progress": 100})));
        assert_eq!(snapshot.name.as_deref(), Some("Clone"));
    }

    #[test]
    fn test_decode_snapshot_falls_back_to_requested_id() {
        let body = json!({"data": {"name": "Agent"}});
        let snapshot = decode_snapshot(&body, &RemoteId::new("uv_9")).unwrap();
        assert_eq!(snapshot.remote_id, "uv_9");
        assert_eq!(snapshot.name.as_deref(), Some("Agent"));
        assert!(snapshot.status.is_none());
    }
}
