//! Global activity feed endpoint.

use axum::{extract::State, Json};
use std::sync::Arc;

use super::routes::AppState;
use crate::activity::FEED_LIMIT;
use crate::models::ActivityView;

pub async fn feed(State(state): State<Arc<AppState>>) -> Json<Vec<ActivityView>> {
    Json(state.activity.feed(FEED_LIMIT).await)
}
