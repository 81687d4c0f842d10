use std::path::PathBuf;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use super::{ApiError, ApiState};
use crate::store::model::EnvironmentRecord;

#[derive(Debug, Deserialize)]
pub struct CreateRequest {
    pub repo: PathBuf,
    pub branch: String,
}

#[derive(Debug, Deserialize)]
pub struct BranchRequest {
    pub branch: String,
}

pub async fn list_environments(
    State(state): State<ApiState>,
) -> Result<Json<Vec<EnvironmentRecord>>, ApiError> {
    Ok(Json(state.orchestrator.list()?))
}

pub async fn get_environment(
    State(state): State<ApiState>,
    Path(name): Path<String>,
) -> Result<Json<EnvironmentRecord>, ApiError> {
    Ok(Json(state.orchestrator.get(&name)?))
}

pub async fn create_environment(
    State(state): State<ApiState>,
    Json(req): Json<CreateRequest>,
) -> Result<(StatusCode, Json<EnvironmentRecord>), ApiError> {
    let record = state.orchestrator.create(&req.repo, &req.branch).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn branch_environment(
    State(state): State<ApiState>,
    Path(name): Path<String>,
    Json(req): Json<BranchRequest>,
) -> Result<(StatusCode, Json<EnvironmentRecord>), ApiError> {
    let record = state.orchestrator.branch(&name, &req.branch).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn start_environment(
    State(state): State<ApiState>,
    Path(name): Path<String>,
) -> Result<Json<EnvironmentRecord>, ApiError> {
    Ok(Json(state.orchestrator.start(&name).await?))
}

pub async fn stop_environment(
    State(state): State<ApiState>,
    Path(name): Path<String>,
) -> Result<Json<EnvironmentRecord>, ApiError> {
    Ok(Json(state.orchestrator.stop(&name).await?))
}
