//! Task endpoints: CRUD, stage moves, assignment, subtasks, risk, NLP.
//!
//! Handlers stay thin; every rule lives in [`TaskLifecycle`].

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use super::routes::AppState;
use crate::error::Result;
use crate::models::{AuthUser, Subtask, TaskView};
use crate::tasks::{CreateTaskInput, RiskAssessment, TaskFilter, UpdateTaskInput};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeStageRequest {
    pub workflow_stage_id: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReassignRequest {
    pub assigned_to: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct AddSubtaskRequest {
    pub title: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSubtaskRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub is_done: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct NlpRequest {
    pub text: String,
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(input): Json<CreateTaskInput>,
) -> Result<Json<TaskView>> {
    state.tasks.create(input, &user).await.map(Json)
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<TaskFilter>,
) -> Json<Vec<TaskView>> {
    Json(state.tasks.list(&filter).await)
}

pub async fn get_one(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<TaskView>> {
    state.tasks.get(id).await.map(Json)
}

pub async fn update(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateTaskInput>,
) -> Result<Json<TaskView>> {
    state.tasks.update(id, input, &user).await.map(Json)
}

pub async fn delete_one(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>> {
    state.tasks.delete(id, &user).await?;
    Ok(Json(serde_json::json!({ "message": "Task deleted successfully" })))
}

pub async fn change_stage(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<ChangeStageRequest>,
) -> Result<Json<TaskView>> {
    state
        .tasks
        .change_stage(id, req.workflow_stage_id, &user)
        .await
        .map(Json)
}

pub async fn reassign(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<ReassignRequest>,
) -> Result<Json<TaskView>> {
    state
        .tasks
        .reassign(id, req.assigned_to, &user)
        .await
        .map(Json)
}

pub async fn add_subtask(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<AddSubtaskRequest>,
) -> Result<Json<Vec<Subtask>>> {
    state.tasks.add_subtask(id, &req.title).await.map(Json)
}

pub async fn update_subtask(
    State(state): State<Arc<AppState>>,
    Path((task_id, subtask_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<UpdateSubtaskRequest>,
) -> Result<Json<Vec<Subtask>>> {
    state
        .tasks
        .update_subtask(task_id, subtask_id, req.title, req.is_done)
        .await
        .map(Json)
}

pub async fn delete_subtask(
    State(state): State<Arc<AppState>>,
    Path((task_id, subtask_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Vec<Subtask>>> {
    state
        .tasks
        .delete_subtask(task_id, subtask_id)
        .await
        .map(Json)
}

pub async fn risk(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<RiskAssessment>> {
    state.tasks.risk_report(id).await.map(Json)
}

pub async fn create_from_text(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<NlpRequest>,
) -> Result<Json<TaskView>> {
    state.tasks.create_from_text(&req.text, &user).await.map(Json)
}
