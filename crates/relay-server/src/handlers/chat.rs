//! SSE chat streaming handler speaking the UI message stream protocol.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::header::{HeaderName, CACHE_CONTROL},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
    Json,
};
use futures::stream::{self, Stream, StreamExt};
use relay_core::{convert_to_model_messages, UiMessageChunk};
use tracing::{info, warn};

use crate::dto::ChatRequest;
use crate::error::AppError;
use crate::ServerState;

const UI_MESSAGE_STREAM_HEADER: HeaderName = HeaderName::from_static("x-vercel-ai-ui-message-stream");
const ACCEL_BUFFERING_HEADER: HeaderName = HeaderName::from_static("x-accel-buffering");

/// Terminal event of every stream.
const DONE: &str = "[DONE]";

/// Chat streaming endpoint.
pub async fn chat(
    State(state): State<Arc<ServerState>>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(req) = payload.inspect_err(|e| warn!("Rejected chat body: {}", e.body_text()))?;
    let messages = convert_to_model_messages(&req.messages)?;

    info!(
        "Chat request: {} UI messages -> {} model messages",
        req.messages.len(),
        messages.len()
    );

    let chunks = state.relay.clone().spawn(messages, state.settings.max_duration);

    let headers = [
        (UI_MESSAGE_STREAM_HEADER, "v1"),
        (CACHE_CONTROL, "no-cache"),
        (ACCEL_BUFFERING_HEADER, "no"),
    ];

    Ok((headers, Sse::new(to_events(chunks)).keep_alive(KeepAlive::default())))
}

/// Frames chunks as `data:` events and appends the `[DONE]` marker.
fn to_events(
    chunks: impl Stream<Item = UiMessageChunk> + Send + 'static,
) -> impl Stream<Item = Result<Event, Infallible>> {
    chunks
        .map(|chunk| Event::default().data(chunk.to_json_string()))
        .chain(stream::once(async { Event::default().data(DONE) }))
        .map(Ok)
}
