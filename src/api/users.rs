//! User directory and profile endpoints.

use axum::{
    extract::{Extension, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::routes::AppState;
use crate::error::{Error, Result};
use crate::models::{AuthUser, ProfileView, TaskStatus, UserView};

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UserStats {
    pub tasks: usize,
    pub comments: usize,
    pub completed: usize,
}

/// Directory of all users (public projections).
pub async fn list(State(state): State<Arc<AppState>>) -> Json<Vec<UserView>> {
    let mut users = state.store.users.list().await;
    users.sort_by(|a, b| a.name.cmp(&b.name));
    Json(users.iter().map(UserView::from).collect())
}

/// The caller's own profile. The stored password hash is never exposed.
pub async fn me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<ProfileView>> {
    state
        .store
        .users
        .get(user.id)
        .await
        .map(|u| Json(ProfileView::from(&u)))
        .ok_or_else(|| Error::not_found("User not found"))
}

pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<ProfileView>> {
    if let Some(name) = &req.name {
        if name.trim().is_empty() {
            return Err(Error::invalid_input("Name cannot be empty"));
        }
    }
    if let Some(email) = &req.email {
        if email.trim().is_empty() {
            return Err(Error::invalid_input("Email cannot be empty"));
        }
    }

    state
        .store
        .users
        .modify(user.id, |u| {
            if let Some(name) = req.name {
                u.name = name.trim().to_string();
            }
            if let Some(email) = req.email {
                u.email = email.trim().to_lowercase();
            }
            if let Some(bio) = req.bio {
                u.bio = Some(bio);
            }
        })
        .await
        .map(|u| Json(ProfileView::from(&u)))
        .ok_or_else(|| Error::not_found("User not found"))
}

/// Workload counters for the caller.
pub async fn stats(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Json<UserStats> {
    let tasks = state.store.tasks.count(|t| t.assigned_to == user.id).await;
    let completed = state
        .store
        .tasks
        .count(|t| t.assigned_to == user.id && t.status == TaskStatus::Completed)
        .await;
    let comments = state
        .store
        .comments
        .count(|c| c.author_id == user.id)
        .await;

    Json(UserStats {
        tasks,
        comments,
        completed,
    })
}
