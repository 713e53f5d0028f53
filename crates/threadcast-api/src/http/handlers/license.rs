//! License status handler.

use axum::Json;
use axum::extract::State;
use chrono::{DateTime, Utc};
use serde::Serialize;
use threadcast_core::license::Authorizer;
use threadcast_types::license::LicenseStatus;

use crate::http::error::AppError;
use crate::http::response::{ApiResponse, RequestTimer};
use crate::state::AppState;

/// License view exposed over HTTP. Never carries the full key.
#[derive(Debug, Serialize)]
pub struct LicenseView {
    pub activated: bool,
    pub key: Option<String>,
    pub activated_at: Option<DateTime<Utc>>,
    pub last_verified_at: Option<DateTime<Utc>>,
    pub status: LicenseStatus,
}

/// GET /api/v1/license - Stored license and the current policy verdict.
pub async fn get_license(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<LicenseView>>, AppError> {
    let timer = RequestTimer::start();

    let record = state.license_service.record().await?;
    let status = state.license_service.validate().await;

    let view = LicenseView {
        activated: record.is_some(),
        key: record.as_ref().map(|r| r.masked_key()),
        activated_at: record.as_ref().map(|r| r.activated_at),
        last_verified_at: record.as_ref().map(|r| r.last_verified_at),
        status,
    };
    Ok(Json(timer.respond(view).with_link("self", "/api/v1/license")))
}
