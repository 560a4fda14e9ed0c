//! Comment endpoints.

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use super::routes::AppState;
use crate::error::Result;
use crate::models::{AuthUser, CommentView};

#[derive(Debug, Deserialize)]
pub struct CommentRequest {
    pub content: String,
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<Uuid>,
) -> Json<Vec<CommentView>> {
    Json(state.comments.list(task_id).await)
}

pub async fn add(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(task_id): Path<Uuid>,
    Json(req): Json<CommentRequest>,
) -> Result<(StatusCode, Json<CommentView>)> {
    let comment = state.comments.add(task_id, &req.content, &user).await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

pub async fn update(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<CommentRequest>,
) -> Result<Json<CommentView>> {
    state.comments.update(id, &req.content, &user).await.map(Json)
}

pub async fn delete_one(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>> {
    state.comments.delete(id, &user).await?;
    Ok(Json(serde_json::json!({ "message": "Comment deleted" })))
}
