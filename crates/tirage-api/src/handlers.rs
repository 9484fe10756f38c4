//! Route handler functions for all API endpoints.
//!
//! Each handler extracts the JSON body via axum extractors, hands it to the
//! chat pipeline and returns JSON or an SSE stream.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use tokio_stream::{Stream, StreamExt};
use tracing::debug;

use tirage_chat::{BreakerSnapshot, ChatEvent, ChatRequest, PipelineResult, PitchGrid, PitchOutcome};

use crate::error::ApiError;
use crate::state::AppState;

// =============================================================================
// Health
// =============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub breaker: BreakerSnapshot,
    pub languages: Vec<String>,
}

/// GET /health - liveness plus the state of the generative-service breaker.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        breaker: state.pipeline.breaker().snapshot(),
        languages: state
            .pipeline
            .locales()
            .languages()
            .map(str::to_string)
            .collect(),
    })
}

// =============================================================================
// Chat
// =============================================================================

/// POST /chat - answer one message.
pub async fn chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<PipelineResult>, ApiError> {
    let Json(request) = payload?;
    let result = state.pipeline.handle_chat(request).await?;
    Ok(Json(result))
}

/// POST /chat/stream - answer one message as SSE.
///
/// Emits `chunk` events carrying reply text, then one `done` event with
/// `{"source": ...}`. Validation errors are returned before the stream
/// starts.
pub async fn chat_stream(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>> + Send>, ApiError> {
    let Json(request) = payload?;
    let events = state.pipeline.clone().handle_chat_stream(request)?;
    let stream = events.map(|event| {
        Ok(match event {
            ChatEvent::Chunk { text } => Event::default().event("chunk").data(text),
            ChatEvent::Done { source } => {
                debug!(source = %source, "Chat stream finished");
                Event::default()
                    .event("done")
                    .data(serde_json::json!({ "source": source }).to_string())
            }
        })
    });
    Ok(Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15))))
}

// =============================================================================
// Pitch
// =============================================================================

/// Request body for POST /pitch.
#[derive(Debug, Deserialize)]
pub struct PitchRequest {
    pub grids: Vec<PitchGrid>,
    #[serde(default)]
    pub language: String,
}

/// POST /pitch - one short commentary per submitted grid.
///
/// The outcome carries its own status code: 400 for invalid grids, 503
/// when the generative service is unavailable, 502 for an unusable reply.
pub async fn pitch(
    State(state): State<AppState>,
    payload: Result<Json<PitchRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = payload?;
    let outcome: PitchOutcome = state
        .pipeline
        .handle_pitch(&request.grids, &request.language)
        .await;
    let status =
        StatusCode::from_u16(outcome.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    Ok((status, Json(outcome)))
}
