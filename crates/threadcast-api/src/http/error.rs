//! Application error type mapping to HTTP status codes and envelope format.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use threadcast_types::error::{StartError, StopError};
use threadcast_types::license::LicenseError;

use super::response::{ApiErrorDetail, ApiMeta, ApiResponse};

/// Application-level error that maps to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    Start(StartError),
    Stop(StopError),
    License(LicenseError),
    Validation(String),
    Internal(String),
}

impl From<StartError> for AppError {
    fn from(e: StartError) -> Self {
        AppError::Start(e)
    }
}

impl From<StopError> for AppError {
    fn from(e: StopError) -> Self {
        AppError::Stop(e)
    }
}

impl From<LicenseError> for AppError {
    fn from(e: LicenseError) -> Self {
        AppError::License(e)
    }
}

impl AppError {
    /// Status code, machine-readable code and message for this error.
    pub fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::Start(StartError::AlreadyRunning) => {
                (StatusCode::CONFLICT, "ALREADY_RUNNING", self.message())
            }
            AppError::Start(StartError::ResumePending) => {
                (StatusCode::CONFLICT, "RESUME_PENDING", self.message())
            }
            AppError::Start(StartError::Unauthorized(_)) => {
                (StatusCode::FORBIDDEN, "UNAUTHORIZED", self.message())
            }
            AppError::Start(StartError::EmptyQueue | StartError::InvalidDelayWindow { .. }) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", self.message())
            }
            AppError::Start(StartError::Storage(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", self.message())
            }
            AppError::Stop(StopError::NoActiveRun) => {
                (StatusCode::NOT_FOUND, "NO_ACTIVE_RUN", self.message())
            }
            AppError::License(LicenseError::Rejected(_)) => {
                (StatusCode::FORBIDDEN, "UNAUTHORIZED", self.message())
            }
            AppError::License(LicenseError::Network(_)) => {
                (StatusCode::BAD_GATEWAY, "LICENSE_SERVER_UNAVAILABLE", self.message())
            }
            AppError::License(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", self.message())
            }
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", self.message()),
            AppError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", self.message())
            }
        }
    }

    fn message(&self) -> String {
        match self {
            AppError::Start(e) => e.to_string(),
            AppError::Stop(e) => e.to_string(),
            AppError::License(e) => e.to_string(),
            AppError::Validation(msg) | AppError::Internal(msg) => msg.clone(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();
        if status.is_server_error() {
            tracing::error!(code, %message, "request failed");
        }

        let body: ApiResponse<()> = ApiResponse {
            data: None,
            meta: ApiMeta::new(String::new(), 0),
            errors: vec![ApiErrorDetail {
                code: code.to_string(),
                message,
            }],
            links: Default::default(),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_errors_map_to_status_codes() {
        let cases = [
            (AppError::from(StartError::AlreadyRunning), StatusCode::CONFLICT, "ALREADY_RUNNING"),
            (AppError::from(StartError::ResumePending), StatusCode::CONFLICT, "RESUME_PENDING"),
            (
                AppError::from(StartError::Unauthorized("expired".into())),
                StatusCode::FORBIDDEN,
                "UNAUTHORIZED",
            ),
            (AppError::from(StartError::EmptyQueue), StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            (
                AppError::from(StartError::InvalidDelayWindow { min_ms: 9, max_ms: 1 }),
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
            ),
            (AppError::from(StopError::NoActiveRun), StatusCode::NOT_FOUND, "NO_ACTIVE_RUN"),
            (
                AppError::Internal("disk full".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
            ),
        ];

        for (err, status, code) in cases {
            let (actual_status, actual_code, _) = err.parts();
            assert_eq!(actual_status, status);
            assert_eq!(actual_code, code);
        }
    }

    #[test]
    fn test_into_response_uses_mapped_status() {
        let response = AppError::from(StopError::NoActiveRun).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
