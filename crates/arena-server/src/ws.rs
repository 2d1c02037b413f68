//! WebSocket live stream for one debate.
//!
//! Each connection joins the debate as a viewer for its lifetime and
//! receives every event published after it subscribed, as JSON text frames.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tracing::{debug, info, warn};

use arena::{SharedDebateArena, Subscription};

use crate::error::ApiResult;
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct StreamQuery {
    #[serde(default)]
    pub viewer_id: Option<String>,
}

/// WebSocket upgrade handler. Unknown debates are refused before upgrading.
pub async fn debate_stream(
    ws: WebSocketUpgrade,
    Path(debate_id): Path<String>,
    Query(query): Query<StreamQuery>,
    State(state): State<AppState>,
) -> ApiResult<Response> {
    let subscription = state.arena.subscribe(&debate_id)?;
    let arena = state.arena.clone();
    Ok(ws.on_upgrade(move |socket| {
        handle_stream(socket, arena, debate_id, query.viewer_id, subscription)
    }))
}

async fn handle_stream(
    socket: WebSocket,
    arena: SharedDebateArena,
    debate_id: String,
    viewer_id: Option<String>,
    mut subscription: Subscription,
) {
    let (mut sender, mut receiver) = socket.split();

    let viewer_id = match arena.join(&debate_id, viewer_id) {
        Ok((viewer_id, viewer_count)) => {
            info!(debate_id = %debate_id, viewer_id = %viewer_id, viewer_count, "Viewer connected");
            viewer_id
        }
        Err(e) => {
            warn!(debate_id = %debate_id, "Could not join debate: {}", e);
            let _ = sender.send(Message::Close(None)).await;
            return;
        }
    };

    let send_task = tokio::spawn(async move {
        while let Some(event) = subscription.recv().await {
            match serde_json::to_string(&event) {
                Ok(json) => {
                    if sender.send(Message::Text(json)).await.is_err() {
                        return;
                    }
                }
                Err(e) => warn!("Failed to serialize event: {}", e),
            }
        }
        // stream ended: the debate was discarded
        let _ = sender.send(Message::Close(None)).await;
    });

    while let Some(result) = receiver.next().await {
        match result {
            Ok(Message::Close(_)) => break,
            Ok(Message::Text(text)) => debug!(debate_id = %debate_id, "Ignoring client message: {}", text),
            Ok(_) => {}
            Err(e) => {
                warn!(debate_id = %debate_id, "WebSocket error: {}", e);
                break;
            }
        }
    }

    send_task.abort();
    match arena.leave(&debate_id, &viewer_id) {
        Ok(viewer_count) => {
            info!(debate_id = %debate_id, viewer_id = %viewer_id, viewer_count, "Viewer disconnected")
        }
        Err(e) if e.is_not_found() => {}
        Err(e) => warn!(debate_id = %debate_id, "Could not remove viewer: {}", e),
    }
}
