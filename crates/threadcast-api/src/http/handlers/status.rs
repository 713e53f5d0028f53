//! Run status handler.

use axum::Json;
use axum::extract::State;
use threadcast_types::run::StatusSnapshot;

use crate::http::response::{ApiResponse, RequestTimer};
use crate::state::AppState;

/// GET /api/v1/status - Point-in-time snapshot of the orchestrator.
pub async fn get_status(State(state): State<AppState>) -> Json<ApiResponse<StatusSnapshot>> {
    let timer = RequestTimer::start();
    let snapshot = state.orchestrator.status().await;
    Json(timer.respond(snapshot).with_link("self", "/api/v1/status"))
}
