use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{header, HeaderValue};
use axum::response::sse::{Event, Sse};
use axum::response::IntoResponse;
use axum::Json;
use futures_util::StreamExt;

use crate::errors::AppError;
use crate::models::{ChatRequest, ChatResponse};
use crate::service::chat_service::ChatService;

/// POST `/chat` — buffered chat turn, returns the whole reply as JSON
pub async fn chat_handler(
    State(svc): State<ChatService>,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, AppError> {
    let Json(request) = body?;
    svc.chat(request).await.map(Json)
}

/// POST `/chat/stream` — streaming chat turn as Server-Sent Events
///
/// Each event is `data: {"content":"...","done":false}`; the stream ends with
/// either `{"content":"","done":true}` or a single `{"error":"..."}`.
pub async fn chat_stream_handler(
    State(svc): State<ChatService>,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(request) = body?;
    let events = svc
        .stream_chat(request)?
        .map(|event| Event::default().json_data(&event));

    Ok((
        [
            (header::CACHE_CONTROL, HeaderValue::from_static("no-cache")),
            (header::CONNECTION, HeaderValue::from_static("keep-alive")),
        ],
        Sse::new(events),
    ))
}
