//! Errors surfaced by request handlers.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// Failure of a request handler, mapped onto an HTTP response.
///
/// Converting to a response does not log: each flavour of the service
/// decides what it reports about a failure.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Deliberate failure raised by `/error`.
    #[error("{0}")]
    Simulated(String),

    #[error("request body is not valid JSON: {0}")]
    InvalidJsonBody(#[source] serde_json::Error),

    #[error("failed to read request body: {0}")]
    BodyRead(String),

    #[error("sum of squares below {0} does not fit in 128 bits")]
    ComputeOverflow(i64),

    #[error("blocking task failed: {0}")]
    Blocking(#[from] tokio::task::JoinError),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Simulated(_) | AppError::Blocking(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::InvalidJsonBody(_) | AppError::BodyRead(_) => StatusCode::BAD_REQUEST,
            AppError::ComputeOverflow(_) => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    detail: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            detail: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}
