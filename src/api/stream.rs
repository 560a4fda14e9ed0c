//! WebSocket feed for realtime events.
//!
//! The handshake carries the JWT either as a `token` query parameter or in
//! `Sec-WebSocket-Protocol` (browsers cannot set an Authorization header on
//! an upgrade request). An authenticated socket joins its user's room and
//! receives both broadcast events and private notifications; in dev mode
//! unauthenticated sockets are admitted for broadcast events only.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use uuid::Uuid;

use super::auth;
use super::routes::AppState;

/// Subprotocol name clients should offer alongside the token.
const WS_PROTOCOL: &str = "taskflow";

#[derive(Debug, Deserialize)]
pub struct StreamParams {
    #[serde(default)]
    pub token: Option<String>,
}

pub async fn stream_ws(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<StreamParams>,
) -> impl IntoResponse {
    let token = params
        .token
        .or_else(|| token_from_protocols(&headers));

    let user_id = match token.as_deref() {
        Some(token) => match auth::user_for_token(token, &state.config) {
            Some(user) => Some(user.id),
            None if state.config.auth_required() => {
                return (StatusCode::UNAUTHORIZED, "Invalid or expired token").into_response();
            }
            None => None,
        },
        None if state.config.auth_required() => {
            return (StatusCode::UNAUTHORIZED, "Missing websocket token").into_response();
        }
        None => None,
    };

    ws.protocols([WS_PROTOCOL])
        .on_upgrade(move |socket| handle_stream(socket, state, user_id))
}

/// Pull a bearer token out of the offered subprotocols: anything that isn't
/// the known protocol name is treated as the token.
fn token_from_protocols(headers: &HeaderMap) -> Option<String> {
    let offered = headers.get("sec-websocket-protocol")?.to_str().ok()?;
    offered
        .split(',')
        .map(str::trim)
        .find(|p| !p.is_empty() && *p != WS_PROTOCOL)
        .map(str::to_string)
}

async fn handle_stream(socket: WebSocket, state: Arc<AppState>, user_id: Option<Uuid>) {
    let (conn_id, mut feed) = state.hub.subscribe(user_id).await;
    let (mut sink, mut source) = socket.split();

    loop {
        tokio::select! {
            event = feed.recv() => {
                match event {
                    Some(payload) => {
                        if sink.send(Message::Text(payload)).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            incoming = source.next() => {
                match incoming {
                    // Inbound frames are not part of the protocol; answer
                    // pings and otherwise ignore until the peer goes away.
                    Some(Ok(Message::Ping(data))) => {
                        if sink.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    state.hub.disconnect(conn_id).await;
}
