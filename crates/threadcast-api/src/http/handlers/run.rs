//! Posting run handlers: start and stop.

use axum::Json;
use axum::extract::State;
use serde::Deserialize;
use threadcast_core::thread::import::threads_from_value;
use threadcast_types::run::{RunAccepted, StopAccepted, TargetHandle};

use crate::http::error::AppError;
use crate::http::response::{ApiResponse, RequestTimer};
use crate::state::AppState;

/// Body of `POST /api/v1/runs`.
///
/// `threads` accepts the same shapes as a thread file: an array of
/// `{id?, text?, paragraphs?}` entries or `{"threads": [...]}`.
#[derive(Debug, Deserialize)]
pub struct StartRunRequest {
    pub threads: serde_json::Value,
    pub target: String,
    #[serde(default)]
    pub min_delay_ms: Option<u64>,
    #[serde(default)]
    pub max_delay_ms: Option<u64>,
}

/// POST /api/v1/runs - Start a posting run.
pub async fn start_run(
    State(state): State<AppState>,
    Json(body): Json<StartRunRequest>,
) -> Result<Json<ApiResponse<RunAccepted>>, AppError> {
    let timer = RequestTimer::start();

    if body.target.trim().is_empty() {
        return Err(AppError::Validation("target must not be empty".to_string()));
    }
    let items = threads_from_value(body.threads, &state.hasher)
        .map_err(|e| AppError::Validation(e.to_string()))?;
    let window = state.delay_window(body.min_delay_ms, body.max_delay_ms);

    let accepted = state
        .orchestrator
        .start(items, window, TargetHandle::new(body.target))
        .await?;

    Ok(Json(
        timer
            .respond(accepted)
            .with_link("status", "/api/v1/status")
            .with_link("stop", "/api/v1/runs/current")
            .with_link("events", "/ws/events"),
    ))
}

/// DELETE /api/v1/runs/current - Request a user stop of the active run.
///
/// Returns as soon as the stop flag is set; the completion event on
/// `/ws/events` reports the final outcome.
pub async fn stop_run(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<StopAccepted>>, AppError> {
    let timer = RequestTimer::start();
    let accepted = state.orchestrator.stop().await?;
    Ok(Json(timer.respond(accepted).with_link("status", "/api/v1/status")))
}
