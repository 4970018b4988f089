use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The `error` object a device returns for a command it rejected.
///
/// Codes are passed through untouched; the device decides what they mean.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DeviceError {
    pub code: i64,
    #[serde(default)]
    pub message: String,
}

/// A device's answer to one command, correlated by `id`.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandResponse {
    pub id: u64,
    pub result: Option<Value>,
    pub error: Option<DeviceError>,
    /// The whole object as received.
    pub raw: Value,
}

impl CommandResponse {
    /// Reads the correlation id of a decoded line, if it has a numeric one.
    pub fn correlation_id(value: &Value) -> Option<u64> {
        value.get("id").and_then(Value::as_u64)
    }

    pub fn from_value(raw: Value) -> Option<Self> {
        let id = Self::correlation_id(&raw)?;
        let result = raw.get("result").cloned();
        let error = raw.get("error").map(|error| {
            serde_json::from_value::<DeviceError>(error.clone()).unwrap_or_else(|_| DeviceError {
                code: 0,
                message: error.to_string(),
            })
        });
        Some(CommandResponse {
            id,
            result,
            error,
            raw,
        })
    }

    /// Most commands answer `{"result": ["ok"]}`.
    ///
    /// Use this instead of matching the result by hand; a response counts as ok
    /// when it carries a result and no error.
    pub fn is_ok(&self) -> bool {
        self.error.is_none() && self.result.is_some()
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// The result values as strings, e.g. the answers to `get_prop`.
    pub fn result_strings(&self) -> Vec<String> {
        match &self.result {
            Some(Value::Array(values)) => values
                .iter()
                .map(|value| match value {
                    Value::String(text) => text.clone(),
                    other => other.to_string(),
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ok_response() {
        let response = CommandResponse::from_value(json!({"id": 7, "result": ["ok"]})).unwrap();
        assert_eq!(response.id, 7);
        assert!(response.is_ok());
        assert_eq!(response.result_strings(), vec!["ok".to_string()]);
    }

    #[test]
    fn test_error_response_is_passed_through() {
        let response = CommandResponse::from_value(
            json!({"id": 9, "error": {"code": -1, "message": "unsupported method"}}),
        )
        .unwrap();
        assert!(response.is_error());
        assert_eq!(
            response.error,
            Some(DeviceError {
                code: -1,
                message: "unsupported method".to_string()
            })
        );
    }

    #[test]
    fn test_notification_has_no_correlation_id() {
        let notification = json!({"method": "props", "params": {"power": "on"}});
        assert!(CommandResponse::from_value(notification).is_none());
    }
}
