//! Workflow stage endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use super::routes::AppState;
use crate::error::Result;
use crate::models::WorkflowStage;

#[derive(Debug, Deserialize)]
pub struct CreateStageRequest {
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStageRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReorderRequest {
    pub ordered_ids: Vec<Uuid>,
}

pub async fn list(State(state): State<Arc<AppState>>) -> Json<Vec<WorkflowStage>> {
    Json(state.stages.list().await)
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateStageRequest>,
) -> Result<(StatusCode, Json<WorkflowStage>)> {
    let stage = state.stages.create(&req.name, req.color).await?;
    Ok((StatusCode::CREATED, Json(stage)))
}

pub async fn update(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateStageRequest>,
) -> Result<Json<WorkflowStage>> {
    state.stages.update(id, req.name, req.color).await.map(Json)
}

pub async fn delete_one(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>> {
    state.stages.delete(id).await?;
    Ok(Json(serde_json::json!({ "message": "Stage deleted" })))
}

pub async fn reorder(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ReorderRequest>,
) -> Result<Json<Vec<WorkflowStage>>> {
    state.stages.reorder(&req.ordered_ids).await.map(Json)
}
