//! The `{code, message, data}` envelope every resolved response is coerced into.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{Error, Result};

pub const SUCCESS_MESSAGE: &str = "success";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
    pub code: i64,
    pub message: String,
    pub data: T,
}

impl<T: DeserializeOwned> ApiEnvelope<T> {
    /// Decode a resolved value. Fails if it is not envelope-shaped or `data` has the wrong type.
    pub fn from_value(value: Value) -> Result<Self> {
        if !is_envelope(&value) {
            return Err(Error::Decode(format!(
                "expected {{code, message, data}}, got {}",
                truncate(&value.to_string(), 120)
            )));
        }
        serde_json::from_value(value).map_err(|e| Error::Decode(e.to_string()))
    }
}

/// True when `value` is an object carrying all of `code`, `message` and `data`.
pub fn is_envelope(value: &Value) -> bool {
    match value.as_object() {
        Some(map) => ["code", "message", "data"].iter().all(|k| map.contains_key(*k)),
        None => false,
    }
}

/// Pass envelopes through untouched; wrap anything else as `{code: status, message: "success", data}`.
pub fn normalize(status: u16, payload: Value) -> Value {
    if is_envelope(&payload) {
        return payload;
    }
    json!({
        "code": status,
        "message": SUCCESS_MESSAGE,
        "data": payload,
    })
}

/// Pull a human-readable message out of an error body (`message`, then `error`).
pub fn error_message(body: &Value) -> Option<String> {
    ["message", "error"]
        .iter()
        .filter_map(|key| body.get(*key))
        .filter_map(Value::as_str)
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}…", &s[..idx]),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_passes_through_unchanged() {
        let payload = json!({"code": 0, "message": "ok", "data": {"id": 7}, "extra": true});
        assert_eq!(normalize(200, payload.clone()), payload);
    }

    #[test]
    fn test_bare_payload_is_wrapped() {
        let payload = json!([{"id": 1}, {"id": 2}]);
        assert_eq!(
            normalize(201, payload.clone()),
            json!({"code": 201, "message": "success", "data": payload})
        );
    }

    #[test]
    fn test_partial_envelope_is_wrapped() {
        let payload = json!({"code": 0, "data": 1});
        let normalized = normalize(200, payload.clone());
        assert_eq!(normalized["data"], payload);
        assert_eq!(normalized["message"], "success");
    }

    #[test]
    fn test_null_body_is_wrapped() {
        assert_eq!(
            normalize(204, Value::Null),
            json!({"code": 204, "message": "success", "data": null})
        );
    }

    #[test]
    fn test_from_value_decodes_typed_data() {
        let env: ApiEnvelope<Vec<i64>> =
            ApiEnvelope::from_value(json!({"code": 200, "message": "success", "data": [1, 2]})).unwrap();
        assert_eq!(env.data, vec![1, 2]);
    }

    #[test]
    fn test_from_value_rejects_non_envelope() {
        let err = ApiEnvelope::<Value>::from_value(json!({"success": true, "data": null})).unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }

    #[test]
    fn test_error_message_prefers_message_then_error() {
        assert_eq!(error_message(&json!({"message": "bad", "error": "worse"})).as_deref(), Some("bad"));
        assert_eq!(error_message(&json!({"message": "", "error": "worse"})).as_deref(), Some("worse"));
        assert_eq!(error_message(&json!({"detail": "x"})), None);
        assert_eq!(error_message(&Value::String("plain".into())), None);
    }
}
