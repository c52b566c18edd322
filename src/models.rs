use serde::{Deserialize, Serialize};

use crate::errors::AppError;

pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_MAX_TOKENS: u32 = 2000;
const MAX_TEMPERATURE: f32 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self { role, content: content.into() }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }
}

fn default_temperature() -> f32 {
    DEFAULT_TEMPERATURE
}

fn default_max_tokens() -> u32 {
    DEFAULT_MAX_TOKENS
}

fn default_stream() -> bool {
    true
}

/// Incoming chat turn. `model` falls back to the configured default.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_stream")]
    pub stream: bool,
}

impl ChatRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            model: None,
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            stream: true,
        }
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.messages.is_empty() {
            return Err(AppError::empty_field("messages", "Messages cannot be empty"));
        }
        if !self.temperature.is_finite() || !(0.0..=MAX_TEMPERATURE).contains(&self.temperature) {
            return Err(AppError::invalid_field(
                "temperature",
                format!("must be between 0 and {MAX_TEMPERATURE} (actual: {})", self.temperature),
            ));
        }
        if self.max_tokens == 0 {
            return Err(AppError::invalid_field("max_tokens", "must be a positive integer"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
    pub model: String,
}

/// One unit of the client-facing stream, framed as `data: <json>\n\n`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum OutboundEvent {
    Chunk { content: String, done: bool },
    Error { error: String },
}

impl OutboundEvent {
    pub fn content(content: impl Into<String>) -> Self {
        OutboundEvent::Chunk { content: content.into(), done: false }
    }

    pub fn done() -> Self {
        OutboundEvent::Chunk { content: String::new(), done: true }
    }

    pub fn error(message: impl Into<String>) -> Self {
        OutboundEvent::Error { error: message.into() }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OutboundEvent::Chunk { done: true, .. } | OutboundEvent::Error { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum HealthReport {
    Probed { status: &'static str, ollama: &'static str },
    Failed { status: &'static str, message: String },
}

impl HealthReport {
    pub fn reachable(healthy: bool) -> Self {
        if healthy {
            HealthReport::Probed { status: "healthy", ollama: "running" }
        } else {
            HealthReport::Probed { status: "unhealthy", ollama: "not running" }
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        HealthReport::Failed { status: "error", message: message.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelList {
    pub models: Vec<String>,
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn chat_request_applies_defaults() {
        let req: ChatRequest = serde_json::from_value(json!({
            "messages": [{ "role": "user", "content": "hi" }]
        }))
        .unwrap();
        assert_eq!(req.model, None);
        assert_eq!(req.temperature, DEFAULT_TEMPERATURE);
        assert_eq!(req.max_tokens, DEFAULT_MAX_TOKENS);
        assert!(req.stream);
        assert_eq!(req.messages[0].role, MessageRole::User);
    }

    #[test]
    fn unknown_role_is_rejected() {
        let res = serde_json::from_value::<ChatRequest>(json!({
            "messages": [{ "role": "tool", "content": "hi" }]
        }));
        assert!(res.is_err());
    }

    #[test]
    fn validate_rejects_empty_messages() {
        let err = ChatRequest::new(vec![]).validate().unwrap_err();
        assert!(err.is_validation());
        assert_eq!(err.to_string(), "Messages cannot be empty");
    }

    #[test]
    fn validate_rejects_out_of_range_options() {
        let mut req = ChatRequest::new(vec![ChatMessage::user("hi")]);
        req.temperature = 3.5;
        assert!(req.validate().is_err());

        req.temperature = f32::NAN;
        assert!(req.validate().is_err());

        req.temperature = 0.0;
        req.max_tokens = 0;
        assert!(req.validate().is_err());

        req.max_tokens = 1;
        assert!(req.validate().is_ok());
    }

    #[test]
    fn outbound_events_serialize_to_wire_shape() {
        assert_eq!(
            serde_json::to_value(OutboundEvent::content("a")).unwrap(),
            json!({ "content": "a", "done": false })
        );
        assert_eq!(
            serde_json::to_value(OutboundEvent::done()).unwrap(),
            json!({ "content": "", "done": true })
        );
        assert_eq!(
            serde_json::to_value(OutboundEvent::error("Request timeout")).unwrap(),
            json!({ "error": "Request timeout" })
        );
    }

    #[test]
    fn only_done_and_error_events_are_terminal() {
        assert!(!OutboundEvent::content("x").is_terminal());
        assert!(OutboundEvent::done().is_terminal());
        assert!(OutboundEvent::error("boom").is_terminal());
    }

    #[test]
    fn health_report_shapes() {
        assert_eq!(
            serde_json::to_value(HealthReport::reachable(true)).unwrap(),
            json!({ "status": "healthy", "ollama": "running" })
        );
        assert_eq!(
            serde_json::to_value(HealthReport::reachable(false)).unwrap(),
            json!({ "status": "unhealthy", "ollama": "not running" })
        );
        assert_eq!(
            serde_json::to_value(HealthReport::failed("refused")).unwrap(),
            json!({ "status": "error", "message": "refused" })
        );
    }
}
