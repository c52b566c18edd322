pub mod decoder;
pub mod framing;

use std::time::Duration;

use bytes::Bytes;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use serde::Deserialize;
use tracing::{debug, error};

use crate::config::GatewayConfig;
use crate::errors::AppError;
use crate::models::ModelList;
use framing::UpstreamPayload;

/// Raw body of a streaming `/api/chat` call, transport errors already classified.
pub type UpstreamStream = BoxStream<'static, Result<Bytes, AppError>>;

#[derive(Deserialize)]
struct OllamaMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct OllamaChatResponse {
    message: Option<OllamaMessage>,
}

#[derive(Deserialize)]
struct OllamaModel {
    #[serde(default)]
    name: String,
}

#[derive(Deserialize)]
struct OllamaTags {
    #[serde(default)]
    models: Vec<OllamaModel>,
}

/// HTTP client for a local Ollama server. One request per chat turn.
#[derive(Clone)]
pub struct OllamaClient {
    client: reqwest::Client,
    base_url: String,
    request_timeout: Duration,
    probe_timeout: Duration,
}

impl OllamaClient {
    pub fn new(config: &GatewayConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.ollama_base_url.clone(),
            request_timeout: config.upstream_timeout,
            probe_timeout: config.health_timeout,
        }
    }

    fn chat_url(&self) -> String {
        format!("{}/api/chat", self.base_url)
    }

    fn tags_url(&self) -> String {
        format!("{}/api/tags", self.base_url)
    }

    async fn post_chat(&self, payload: &UpstreamPayload) -> Result<reqwest::Response, AppError> {
        debug!(
            model = %payload.model,
            stream = payload.stream,
            messages = payload.messages.len(),
            "sending chat request to Ollama"
        );
        let response = self
            .client
            .post(self.chat_url())
            .timeout(self.request_timeout)
            .json(payload)
            .send()
            .await
            .map_err(|e| {
                error!("Ollama request to {} failed: {e}", self.base_url);
                AppError::transport(&self.base_url, e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(%status, body = %body, "Ollama returned an error status");
            return Err(AppError::BackendStatus { status, body });
        }
        Ok(response)
    }

    /// Buffered call: waits for the whole reply and returns the assistant text.
    pub async fn chat(&self, payload: &UpstreamPayload) -> Result<String, AppError> {
        let response = self.post_chat(payload).await?;
        let parsed: OllamaChatResponse = response
            .json()
            .await
            .map_err(|e| {
                if e.is_decode() {
                    AppError::InvalidBackendResponse { message: e.to_string() }
                } else {
                    AppError::transport(&self.base_url, e)
                }
            })?;

        parsed
            .message
            .and_then(|m| m.content)
            .ok_or_else(|| AppError::InvalidBackendResponse {
                message: "missing message.content".to_string(),
            })
    }

    /// Streaming call: resolves once response headers arrive.
    pub async fn open_chat_stream(
        &self,
        payload: &UpstreamPayload,
    ) -> Result<UpstreamStream, AppError> {
        let response = self.post_chat(payload).await?;
        let host = self.base_url.clone();
        Ok(response
            .bytes_stream()
            .map(move |item| item.map_err(|e| AppError::transport(&host, e)))
            .boxed())
    }

    /// Whether `/api/tags` answers with a success status.
    pub async fn probe(&self) -> Result<bool, AppError> {
        let response = self
            .client
            .get(self.tags_url())
            .timeout(self.probe_timeout)
            .send()
            .await
            .map_err(|e| AppError::transport(&self.base_url, e))?;
        Ok(response.status().is_success())
    }

    pub async fn list_models(&self) -> Result<ModelList, AppError> {
        let response = self
            .client
            .get(self.tags_url())
            .timeout(self.probe_timeout)
            .send()
            .await
            .map_err(|e| AppError::transport(&self.base_url, e))?;

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Ok(ModelList { models: vec![], available: false, error: Some(body) });
        }

        let tags: OllamaTags = response.json().await.map_err(|e| {
            if e.is_decode() {
                AppError::InvalidBackendResponse { message: e.to_string() }
            } else {
                AppError::transport(&self.base_url, e)
            }
        })?;
        Ok(ModelList {
            models: tags.models.into_iter().map(|m| m.name).collect(),
            available: true,
            error: None,
        })
    }
}
