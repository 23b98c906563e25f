//! Auto-instrumented service.
//!
//! Handlers contain business logic only; spans and request metrics come
//! from [`HttpInstrumentation`] wrapped around the whole router.

use axum::body::Body;
use axum::extract::Query;
use axum::http::Request;
use axum::routing::get;
use axum::{Json, Router};

use super::endpoints::{
    self, ComputeParams, ComputeResponse, EchoResponse, HealthResponse, MessageResponse,
};
use crate::error::AppError;
use crate::observability::http::HttpInstrumentation;

/// Build the auto-instrumented router.
pub fn router(instrumentation: &HttpInstrumentation) -> Router {
    let routes = Router::new()
        .route("/health", get(health))
        .route("/slow", get(slow))
        .route("/error", get(error))
        .route("/compute", get(compute))
        .route(
            "/server_request",
            get(server_request)
                .post(server_request)
                .put(server_request)
                .patch(server_request),
        );
    instrumentation.instrument(routes)
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}

async fn slow() -> Result<Json<MessageResponse>, AppError> {
    endpoints::slow().await.map(Json)
}

async fn error() -> Result<Json<MessageResponse>, AppError> {
    Err(endpoints::simulated_error())
}

async fn compute(Query(params): Query<ComputeParams>) -> Result<Json<ComputeResponse>, AppError> {
    endpoints::compute(params.n()).map(Json)
}

async fn server_request(request: Request<Body>) -> Result<Json<EchoResponse>, AppError> {
    endpoints::echo(request).await.map(Json)
}
