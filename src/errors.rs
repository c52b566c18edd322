use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

/// Top-level gateway error.
/// Every variant carries a human-readable message for display/logging.
#[derive(Debug, Error)]
pub enum AppError {
    // ── Validation errors ────────────────────────────────────────────────────
    #[error("{message}")]
    EmptyField { field_name: String, message: String },

    #[error("Field '{field_name}' is invalid: {reason}")]
    InvalidField { field_name: String, reason: String },

    #[error("Invalid request body: {message}")]
    MalformedBody { status: StatusCode, message: String },

    // ── Backend errors ───────────────────────────────────────────────────────
    #[error("Connection error: {message}")]
    BackendUnavailable { host: String, message: String },

    #[error("Request timeout")]
    BackendTimeout { host: String },

    #[error("Ollama error {status}: {body}")]
    BackendStatus { status: StatusCode, body: String },

    #[error("Invalid backend response: {message}")]
    InvalidBackendResponse { message: String },

    #[error("Connection error: stream ended before completion")]
    StreamInterrupted,
}

impl AppError {
    pub fn empty_field(field_name: &str, message: impl Into<String>) -> Self {
        AppError::EmptyField { field_name: field_name.to_string(), message: message.into() }
    }

    pub fn invalid_field(field_name: &str, reason: impl Into<String>) -> Self {
        AppError::InvalidField { field_name: field_name.to_string(), reason: reason.into() }
    }

    /// Classifies a `reqwest` transport failure against `host`.
    pub fn transport(host: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AppError::BackendTimeout { host: host.to_string() }
        } else {
            AppError::BackendUnavailable { host: host.to_string(), message: err.to_string() }
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            AppError::EmptyField { .. }
                | AppError::InvalidField { .. }
                | AppError::MalformedBody { .. }
        )
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, AppError::BackendTimeout { .. })
    }

    /// Text placed in a terminal `{error}` stream event.
    ///
    /// Raw backend bodies stay in the logs; the client only learns that the
    /// backend refused the call.
    pub fn event_message(&self) -> String {
        match self {
            AppError::BackendStatus { .. } => "backend API error".to_string(),
            other => other.to_string(),
        }
    }

    /// Ollama base URL involved in a transport failure.
    pub fn backend_host(&self) -> Option<&str> {
        match self {
            AppError::BackendUnavailable { host, .. } | AppError::BackendTimeout { host } => {
                Some(host.as_str())
            }
            _ => None,
        }
    }

    fn field_name(&self) -> Option<&str> {
        match self {
            AppError::EmptyField { field_name, .. } | AppError::InvalidField { field_name, .. } => {
                Some(field_name.as_str())
            }
            AppError::MalformedBody { .. } => Some("body"),
            _ => None,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        if let AppError::MalformedBody { status, .. } = self {
            *status
        } else if self.is_validation() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if self.is_validation() {
            warn!(field = self.field_name().unwrap_or("-"), error = %self, "rejected request");
        } else {
            error!(error = %self, host = self.backend_host().unwrap_or("-"), "request failed");
        }
        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::MalformedBody { status: rejection.status(), message: rejection.body_text() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_map_to_bad_request() {
        let err = AppError::empty_field("messages", "Messages cannot be empty");
        assert!(err.is_validation());
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "Messages cannot be empty");

        let err = AppError::invalid_field("temperature", "must be between 0 and 2");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);

        let err = AppError::MalformedBody {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            message: "missing field `messages`".into(),
        };
        assert!(err.is_validation());
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn backend_errors_map_to_internal_error() {
        let err = AppError::BackendTimeout { host: "http://localhost:11434".into() };
        assert!(err.is_timeout());
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.event_message(), "Request timeout");

        let err = AppError::BackendUnavailable {
            host: "http://localhost:11434".into(),
            message: "connection refused".into(),
        };
        assert_eq!(err.event_message(), "Connection error: connection refused");
        assert_eq!(err.backend_host(), Some("http://localhost:11434"));
    }

    #[test]
    fn status_errors_hide_backend_body_from_events() {
        let err = AppError::BackendStatus {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: "model 'x' not found".into(),
        };
        assert_eq!(err.event_message(), "backend API error");
        assert!(err.to_string().contains("model 'x' not found"));
    }
}
