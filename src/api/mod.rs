//! HTTP surface: REST endpoints plus the realtime WebSocket feed.

pub mod auth;
pub mod routes;

mod activity;
mod assist;
mod comments;
mod notifications;
mod stages;
mod stream;
mod tasks;
mod users;

pub use routes::{router, serve, AppState};
