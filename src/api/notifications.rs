//! Notification endpoints. Each user sees only their own.

use axum::{
    extract::{Extension, Path, State},
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use super::routes::AppState;
use crate::error::Result;
use crate::models::{AuthUser, Notification};
use crate::notify::LIST_LIMIT;

pub async fn list(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Json<Vec<Notification>> {
    Json(state.notifier.list_for(user.id, LIST_LIMIT).await)
}

pub async fn mark_read(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>> {
    state.notifier.mark_read(id).await?;
    Ok(Json(serde_json::json!({ "message": "Notification read" })))
}

pub async fn mark_all_read(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Json<serde_json::Value> {
    let marked = state.notifier.mark_all_read(user.id).await;
    Json(serde_json::json!({ "marked": marked }))
}
