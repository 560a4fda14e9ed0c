//! AI assist endpoints: task enhancement and subtask suggestion.
//!
//! A capability failure surfaces as an error; nothing is synthesized in
//! its place.

use axum::{extract::State, Json};
use serde::Deserialize;
use std::sync::Arc;

use super::routes::AppState;
use crate::ai::{Enhancement, SubtaskSuggestions};
use crate::error::{Error, Result};

#[derive(Debug, Deserialize)]
pub struct AssistRequest {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl AssistRequest {
    fn validated(&self) -> Result<(&str, &str)> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(Error::invalid_input("Title is required"));
        }
        Ok((title, self.description.as_deref().unwrap_or("")))
    }
}

pub async fn enhance_task(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AssistRequest>,
) -> Result<Json<Enhancement>> {
    let (title, description) = req.validated()?;
    state.assist.enhance_task(title, description).await.map(Json)
}

pub async fn suggest_subtasks(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AssistRequest>,
) -> Result<Json<SubtaskSuggestions>> {
    let (title, description) = req.validated()?;
    state
        .assist
        .suggest_subtasks(title, description)
        .await
        .map(Json)
}
