//! The WebSocket transport adapter: upgrades `GET /ws/{club_id}` requests
//! and bridges each socket to the [ClubChannels][crate::notify::ClubChannels]
//! registry through a per-connection channel.
//!
//! Command and query HTTP routing belongs to the outer HTTP layer; this
//! router only carries the push surface, and [AppState] is the mounting
//! point the outer layer builds on.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::command::CommandBus;
use crate::notify::ClubChannels;
use crate::query::PublicReads;

/// Everything the transport layer needs: the fan-out registry for this
/// router's WebSocket endpoint, plus the command bus and read facade that
/// the outer HTTP layer dispatches into.
#[derive(Clone)]
pub struct AppState {
    pub channels: ClubChannels,
    pub command_bus: Arc<CommandBus>,
    pub public_reads: PublicReads,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/ws/:club_id", get(club_updates))
        .with_state(state)
}

async fn club_updates(
    ws: WebSocketUpgrade,
    Path(club_id): Path<String>,
    State(state): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, club_id, state))
}

async fn handle_socket(socket: WebSocket, club_id: String, state: AppState) {
    let (mut sink, mut stream) = socket.split();
    let (sender, mut queue) = mpsc::unbounded_channel::<String>();

    let connection_id = state.channels.register(club_id.clone(), sender);

    tracing::info!(
        %club_id,
        connection_id,
        connections = state.channels.connection_count(&club_id),
        "websocket connection registered",
    );

    // Forward queued notifications to the socket until either side closes.
    let mut forward_task = tokio::spawn(async move {
        while let Some(payload) = queue.recv().await {
            if sink.send(Message::Text(payload)).await.is_err() {
                break;
            }
        }
    });

    let mut receive_task = tokio::spawn(async move {
        while let Some(Ok(message)) = stream.next().await {
            if let Message::Close(_) = message {
                break;
            }
        }
    });

    tokio::select! {
        _ = &mut forward_task => receive_task.abort(),
        _ = &mut receive_task => forward_task.abort(),
    }

    state.channels.unregister(connection_id);

    tracing::info!(%club_id, connection_id, "websocket connection closed");
}
