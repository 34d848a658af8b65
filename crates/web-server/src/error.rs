use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use core_types::CoreError;
use engine::EngineError;
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid request: {0}")]
    BadRequest(#[from] CoreError),
    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) | AppError::Engine(EngineError::Core(_)) => StatusCode::BAD_REQUEST,
            AppError::Engine(EngineError::RepairInProgress(_)) => StatusCode::CONFLICT,
            AppError::Engine(EngineError::QueryFailure { .. } | EngineError::RepairFailed { .. }) => {
                StatusCode::BAD_GATEWAY
            }
            AppError::Engine(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Converts our custom `AppError` into an HTTP response.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = ?self, "Request failed.");
        } else {
            tracing::debug!(error = %self, "Request rejected.");
        }

        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}
