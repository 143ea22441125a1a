use chrono::{ SecondsFormat, Utc };
use serde::{ Serialize, Deserialize };
use serde_json::Value;

use crate::error::ApiError;

pub const APOLOGY_RESPONSE: &str =
    "I apologize, but I couldn't generate a response. Please try again.";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: String,
    pub content: String,
}

/// A validated `POST /api/mini-ice` body.
#[derive(Clone, Debug)]
pub struct ChatRequest {
    pub message: String,
    pub conversation_history: Vec<ChatTurn>,
}

impl ChatRequest {
    /// Validates a raw JSON body. Only `message` is mandatory; a malformed
    /// history is dropped rather than failing the request since it never
    /// reaches the generator.
    pub fn from_json(body: &[u8]) -> Result<Self, ApiError> {
        let value: Value = serde_json::from_slice(body)
            .map_err(|e| ApiError::InvalidInput(format!("Invalid JSON body: {}", e)))?;

        let message = match value.get("message") {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            _ => {
                return Err(
                    ApiError::InvalidInput("Message is required and must be a string".into())
                );
            }
        };

        let conversation_history = match value.get("conversation_history") {
            None | Some(Value::Null) => Vec::new(),
            Some(raw) =>
                serde_json::from_value(raw.clone()).unwrap_or_else(|e| {
                    log::warn!("Ignoring malformed conversation_history: {}", e);
                    Vec::new()
                }),
        };

        Ok(Self { message, conversation_history })
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GenerationOutcome {
    pub response: String,
    pub model: String,
    pub timestamp: String,
}

impl GenerationOutcome {
    /// Builds the outcome from raw generator stdout.
    pub fn from_output(raw: &str, model: &str) -> Self {
        let trimmed = raw.trim();
        let response = if trimmed.is_empty() {
            APOLOGY_RESPONSE.to_string()
        } else {
            trimmed.to_string()
        };
        Self {
            response,
            model: model.to_string(),
            timestamp: now_rfc3339(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub model: String,
    pub timestamp: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_is_trimmed() {
        let outcome = GenerationOutcome::from_output("  Hello\n\n", "Mini-ICEBURG");
        assert_eq!(outcome.response, "Hello");
        assert_eq!(outcome.model, "Mini-ICEBURG");
    }

    #[test]
    fn blank_output_becomes_apology() {
        let outcome = GenerationOutcome::from_output(" \n\t", "m");
        assert_eq!(outcome.response, APOLOGY_RESPONSE);
    }

    #[test]
    fn timestamp_is_rfc3339() {
        let outcome = GenerationOutcome::from_output("x", "m");
        assert!(chrono::DateTime::parse_from_rfc3339(&outcome.timestamp).is_ok());
    }

    #[test]
    fn request_requires_string_message() {
        for body in [
            r#"{}"#,
            r#"{"message": 42}"#,
            r#"{"message": null}"#,
            r#"{"message": ""}"#,
            r#"{"message": ["hi"]}"#,
            r#"not json"#,
        ] {
            let err = ChatRequest::from_json(body.as_bytes()).unwrap_err();
            assert!(matches!(err, ApiError::InvalidInput(_)), "body {body} accepted");
        }
    }

    #[test]
    fn request_keeps_history() {
        let body =
            r#"{"message":"hi","conversation_history":[{"role":"user","content":"earlier"}]}"#;
        let req = ChatRequest::from_json(body.as_bytes()).unwrap();
        assert_eq!(req.message, "hi");
        assert_eq!(req.conversation_history, vec![ChatTurn {
            role: "user".into(),
            content: "earlier".into(),
        }]);
    }

    #[test]
    fn malformed_history_is_ignored() {
        let body = r#"{"message":"hi","conversation_history":"nope"}"#;
        let req = ChatRequest::from_json(body.as_bytes()).unwrap();
        assert!(req.conversation_history.is_empty());
    }
}
