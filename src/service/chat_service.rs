use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, info_span, Instrument};
use uuid::Uuid;

use crate::agent::framing::{FramingOptions, UpstreamPayload};
use crate::agent::OllamaClient;
use crate::config::GatewayConfig;
use crate::errors::AppError;
use crate::models::{ChatRequest, ChatResponse, HealthReport, ModelList, OutboundEvent};
use crate::service::relay::relay;

/// Bounded so a slow client applies backpressure to the upstream read loop.
const EVENT_BUFFER: usize = 32;

#[derive(Clone)]
pub struct ChatService {
    agent: OllamaClient,
    framing: FramingOptions,
    default_model: String,
}

impl ChatService {
    pub fn new(agent: OllamaClient, config: &GatewayConfig) -> Self {
        Self {
            agent,
            framing: FramingOptions {
                policy: config.prompt_policy,
                num_ctx: config.num_ctx,
                top_p: config.top_p,
            },
            default_model: config.default_model.clone(),
        }
    }

    pub fn from_config(config: &GatewayConfig) -> Self {
        Self::new(OllamaClient::new(config), config)
    }

    fn model_for(&self, request: &ChatRequest) -> String {
        request
            .model
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(self.default_model.as_str())
            .to_string()
    }

    pub async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, AppError> {
        request.validate()?;

        let model = self.model_for(&request);
        let turn_id = Uuid::new_v4();
        let span = info_span!("chat", %turn_id, %model, stream = false);

        async {
            log_turn(&request, false);
            let payload = UpstreamPayload::build(&request, &model, &self.framing, false);
            let response = self.agent.chat(&payload).await?;
            Ok::<_, AppError>(ChatResponse { response, model: model.clone() })
        }
        .instrument(span)
        .await
    }

    /// Validates the turn, then spawns its relay task and returns the event stream.
    pub fn stream_chat(
        &self,
        request: ChatRequest,
    ) -> Result<ReceiverStream<OutboundEvent>, AppError> {
        request.validate()?;

        let model = self.model_for(&request);
        let turn_id = Uuid::new_v4();
        let span = info_span!("chat", %turn_id, %model, stream = true);
        span.in_scope(|| log_turn(&request, true));

        let payload = UpstreamPayload::build(&request, &model, &self.framing, true);
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        tokio::spawn(relay(self.agent.clone(), payload, tx).instrument(span));

        Ok(ReceiverStream::new(rx))
    }

    pub async fn health(&self) -> HealthReport {
        match self.agent.probe().await {
            Ok(reachable) => HealthReport::reachable(reachable),
            Err(e) => HealthReport::failed(e.to_string()),
        }
    }

    pub async fn models(&self) -> Result<ModelList, AppError> {
        self.agent.list_models().await
    }
}

/// The endpoint, not the body's `stream` flag, decides the delivery mode.
fn log_turn(request: &ChatRequest, streaming: bool) {
    info!(messages = request.messages.len(), streaming, "received chat request");
    if request.stream != streaming {
        debug!(requested = request.stream, "body stream flag differs from endpoint mode");
    }
}
