use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::errors::AppError;
use crate::models::{HealthReport, ModelList};
use crate::service::chat_service::ChatService;

/// GET `/` — capability descriptor
pub async fn root_handler() -> Json<Value> {
    Json(json!({
        "message": "Code Maestro API",
        "version": env!("CARGO_PKG_VERSION"),
        "features": ["streaming", "clean-output"],
        "endpoints": {
            "/chat": "POST - Send chat messages",
            "/chat/stream": "POST - Send chat messages (streaming)",
            "/health": "GET - Check API health",
            "/models": "GET - List available models"
        }
    }))
}

/// GET `/health` — probes the Ollama model listing
pub async fn health_handler(State(svc): State<ChatService>) -> Json<HealthReport> {
    Json(svc.health().await)
}

/// GET `/models` — models installed in Ollama
pub async fn models_handler(State(svc): State<ChatService>) -> Result<Json<ModelList>, AppError> {
    svc.models().await.map(Json)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn root_lists_every_endpoint() {
        let Json(body) = root_handler().await;
        assert_eq!(body["message"], "Code Maestro API");
        assert!(!body["version"].as_str().unwrap_or("").is_empty());
        for path in ["/chat", "/chat/stream", "/health", "/models"] {
            assert!(body["endpoints"].get(path).is_some(), "{path}");
        }
    }
}
