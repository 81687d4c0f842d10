pub mod environments;
pub mod server;

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;

use crate::error::Error;
use crate::orchestrator::Orchestrator;

pub use server::{serve, start_api_server};

#[derive(Clone)]
pub struct ApiState {
    pub orchestrator: Arc<Orchestrator>,
}

pub fn api_router(state: ApiState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route(
            "/api/environments",
            get(environments::list_environments).post(environments::create_environment),
        )
        .route("/api/environments/{name}", get(environments::get_environment))
        .route(
            "/api/environments/{name}/branch",
            post(environments::branch_environment),
        )
        .route(
            "/api/environments/{name}/start",
            post(environments::start_environment),
        )
        .route(
            "/api/environments/{name}/stop",
            post(environments::stop_environment),
        )
        .with_state(state)
}

#[derive(Serialize)]
struct Health {
    status: &'static str,
}

async fn health() -> Json<Health> {
    Json(Health { status: "ok" })
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Lifecycle errors rendered as `{"error": "..."}`.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::Conflict(_) | Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::ExternalService { .. } | Error::Store(_) | Error::Json(_) | Error::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }
        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}
