use crate::error::{RedisError, TransportError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Per-command element of a batch response: `{"result": ...}` or `{"error": "..."}`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WireOutcome {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WireOutcome {
    pub fn ok(value: Value) -> Self {
        Self {
            result: Some(value),
            error: None,
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            result: None,
            error: Some(message.into()),
        }
    }

    /// A missing or `null` result is a successful nil reply.
    pub fn into_result(self) -> Result<Value, RedisError> {
        match self.error {
            Some(message) => Err(RedisError::command(message)),
            None => Ok(self.result.unwrap_or(Value::Null)),
        }
    }
}

/// Splits a batch response body into one outcome per submitted command.
///
/// A non-2xx status, a top-level `{"error": ...}` object or a length
/// mismatch fails the whole batch.
pub fn parse_batch_response(
    status: u16,
    body: Value,
    expected: usize,
) -> Result<Vec<WireOutcome>, TransportError> {
    if !(200..300).contains(&status) {
        return Err(TransportError::http(status, top_level_error(&body)));
    }

    let items = match body {
        Value::Array(items) => items,
        other if other.get("error").is_some() => {
            return Err(TransportError::http(status, top_level_error(&other)));
        }
        other => {
            return Err(TransportError::Protocol(format!(
                "expected an array of {} results, got {}",
                expected, other
            )));
        }
    };

    if items.len() != expected {
        return Err(TransportError::Protocol(format!(
            "expected {} results, got {}",
            expected,
            items.len()
        )));
    }

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            serde_json::from_value::<WireOutcome>(item).map_err(|e| {
                TransportError::Protocol(format!("malformed result at index {}: {}", index, e))
            })
        })
        .collect()
}

fn top_level_error(body: &Value) -> String {
    match body.get("error") {
        Some(Value::String(message)) => message.clone(),
        Some(other) => other.to_string(),
        None if body.is_null() => "empty response body".to_string(),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_mixed_outcomes() {
        let body = json!([{"result": "OK"}, {"error": "ERR wrong type"}, {"result": null}, {}]);
        let outcomes = parse_batch_response(200, body, 4).unwrap();

        let results: Vec<_> = outcomes.into_iter().map(WireOutcome::into_result).collect();
        assert_eq!(results[0], Ok(json!("OK")));
        assert_eq!(results[1], Err(RedisError::command("ERR wrong type")));
        assert_eq!(results[2], Ok(Value::Null));
        assert_eq!(results[3], Ok(Value::Null));
    }

    #[test]
    fn test_length_mismatch_is_protocol_error() {
        let err = parse_batch_response(200, json!([{"result": 1}]), 2).unwrap_err();
        assert!(matches!(err, TransportError::Protocol(_)));
    }

    #[test]
    fn test_top_level_error() {
        let err = parse_batch_response(400, json!({"error": "EXECABORT"}), 2).unwrap_err();
        assert_eq!(err, TransportError::http(400, "EXECABORT"));

        let err = parse_batch_response(200, json!({"error": "ERR aborted"}), 1).unwrap_err();
        assert_eq!(err, TransportError::http(200, "ERR aborted"));
    }

    #[test]
    fn test_server_error_status_is_retryable() {
        let err = parse_batch_response(502, Value::Null, 1).unwrap_err();
        assert!(err.is_retryable());
    }

    #[test]
    fn test_outcome_serialization() {
        assert_eq!(
            serde_json::to_value(WireOutcome::ok(json!(1))).unwrap(),
            json!({"result": 1})
        );
        assert_eq!(
            serde_json::to_value(WireOutcome::err("boom")).unwrap(),
            json!({"error": "boom"})
        );
    }
}
