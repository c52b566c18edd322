//! Streaming relay between an Ollama `/api/chat` stream and the SSE client.
//!
//! The relay guarantees that every turn ends with exactly one terminal event:
//! `{"content":"","done":true}` on a clean finish or `{"error":...}` on any
//! failure, and that nothing is emitted after it.

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::agent::decoder::{decode_line, LineBuffer};
use crate::agent::framing::UpstreamPayload;
use crate::agent::OllamaClient;
use crate::errors::AppError;
use crate::models::OutboundEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    AwaitingResponseHeaders,
    Streaming,
    Completed,
    Failed,
}

/// Pure state machine: feeds upstream bytes in, gets outbound events out.
#[derive(Debug)]
pub struct StreamRelay {
    state: RelayState,
    lines: LineBuffer,
}

impl Default for StreamRelay {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamRelay {
    pub fn new() -> Self {
        Self { state: RelayState::AwaitingResponseHeaders, lines: LineBuffer::new() }
    }

    pub fn state(&self) -> RelayState {
        self.state
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.state, RelayState::Completed | RelayState::Failed)
    }

    /// The upstream accepted the call with a 2xx status.
    pub fn headers_received(&mut self) {
        if self.state == RelayState::AwaitingResponseHeaders {
            self.state = RelayState::Streaming;
        }
    }

    /// Moves to `Failed`; returns the single error event unless already terminal.
    pub fn fail(&mut self, err: &AppError) -> Option<OutboundEvent> {
        if self.is_terminal() {
            return None;
        }
        warn!(error = %err, timeout = err.is_timeout(), "stream relay failed");
        self.state = RelayState::Failed;
        Some(OutboundEvent::error(err.event_message()))
    }

    pub fn on_bytes(&mut self, bytes: &[u8]) -> Vec<OutboundEvent> {
        if self.state != RelayState::Streaming {
            return Vec::new();
        }
        let mut events = Vec::new();
        for line in self.lines.push(bytes) {
            self.on_line(&line, &mut events);
            if self.is_terminal() {
                break;
            }
        }
        events
    }

    /// Upstream body ended. Without a completion marker this is a failure.
    pub fn on_upstream_closed(&mut self) -> Vec<OutboundEvent> {
        if self.state != RelayState::Streaming {
            return Vec::new();
        }
        let mut events = Vec::new();
        if let Some(tail) = self.lines.finish() {
            self.on_line(&tail, &mut events);
        }
        if !self.is_terminal() {
            events.extend(self.fail(&AppError::StreamInterrupted));
        }
        events
    }

    fn on_line(&mut self, line: &str, events: &mut Vec<OutboundEvent>) {
        let Some(chunk) = decode_line(line) else {
            return;
        };
        if !chunk.content.is_empty() {
            events.push(OutboundEvent::content(chunk.content));
        }
        if chunk.done {
            self.state = RelayState::Completed;
            events.push(OutboundEvent::done());
        }
    }
}

/// Drives one streaming turn, sending every outbound event into `sink`.
///
/// Returns when a terminal event has been sent or the client went away; in
/// both cases the upstream response is dropped, closing its connection.
pub async fn relay(
    client: OllamaClient,
    payload: UpstreamPayload,
    sink: mpsc::Sender<OutboundEvent>,
) {
    let mut relay = StreamRelay::new();

    let opened = tokio::select! {
        _ = sink.closed() => {
            debug!("client disconnected before upstream responded");
            return;
        }
        opened = client.open_chat_stream(&payload) => opened,
    };

    let mut upstream = match opened {
        Ok(upstream) => {
            relay.headers_received();
            upstream
        }
        Err(e) => {
            if let Some(event) = relay.fail(&e) {
                let _ = sink.send(event).await;
            }
            return;
        }
    };

    while !relay.is_terminal() {
        let next = tokio::select! {
            _ = sink.closed() => {
                info!("client disconnected, abandoning upstream stream");
                return;
            }
            next = upstream.next() => next,
        };

        let events = match next {
            Some(Ok(bytes)) => relay.on_bytes(&bytes),
            Some(Err(e)) => relay.fail(&e).into_iter().collect(),
            None => relay.on_upstream_closed(),
        };

        for event in events {
            if sink.send(event).await.is_err() {
                info!("client disconnected, abandoning upstream stream");
                return;
            }
        }
    }

    if relay.state() == RelayState::Completed {
        debug!("streaming completed");
    }
}
