use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Wire shape shared by every response: exactly one of `data` or `error` is present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl<T> Envelope<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            timestamp: timestamp(),
        }
    }

    pub fn failure(error: ErrorBody) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error),
            timestamp: timestamp(),
        }
    }
}

/// Current time as ISO-8601 UTC with millisecond precision
pub fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use serde_json::json;

    #[test]
    fn success_carries_data_only() {
        let value = serde_json::to_value(Envelope::success(json!({ "idTask": 1 }))).unwrap();
        assert_eq!(value["success"], json!(true));
        assert_eq!(value["data"], json!({ "idTask": 1 }));
        assert!(value.get("error").is_none());
        assert!(DateTime::parse_from_rfc3339(value["timestamp"].as_str().unwrap()).is_ok());
    }

    #[test]
    fn failure_carries_error_only() {
        let envelope = Envelope::<()>::failure(ErrorBody {
            code: "BUSINESS_RULE_VIOLATION".into(),
            message: "Task not found".into(),
            details: None,
        });
        let value = serde_json::to_value(envelope).unwrap();
        assert_eq!(value["success"], json!(false));
        assert!(value.get("data").is_none());
        assert!(value["error"].get("details").is_none());
        assert!(value["timestamp"].as_str().unwrap().ends_with('Z'));
    }
}
