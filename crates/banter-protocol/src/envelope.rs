//! The uniform response envelope.

use serde::{Deserialize, Serialize};

/// Shape every non-streaming server response is normalized into.
///
/// Transport failures, malformed bodies, and server-reported errors all
/// become a `failure` envelope before reaching callers; a raw streaming
/// response is the only thing that bypasses this wrapper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope<T> {
    pub success: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ResponseEnvelope<T> {
    /// Successful envelope carrying a payload.
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            message: String::new(),
            data: Some(data),
        }
    }

    /// Failure envelope carrying a human-readable message and no data.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn failure_has_no_data() {
        let env: ResponseEnvelope<Value> = ResponseEnvelope::failure("bad model id");
        assert!(!env.success);
        assert_eq!(env.message, "bad model id");
        assert!(env.data.is_none());
    }

    #[test]
    fn deserializes_with_missing_fields() {
        // Servers are allowed to omit message and data.
        let env: ResponseEnvelope<Value> = serde_json::from_str(r#"{"success": true}"#).unwrap();
        assert!(env.success);
        assert!(env.message.is_empty());
        assert!(env.data.is_none());
    }

    #[test]
    fn passes_server_message_through() {
        let env: ResponseEnvelope<Value> =
            serde_json::from_str(r#"{"success": false, "message": "bad model id"}"#).unwrap();
        assert!(!env.success);
        assert_eq!(env.message, "bad model id");
    }
}
