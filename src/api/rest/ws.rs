use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use futures::SinkExt;
use futures::StreamExt;
use futures::stream::SplitSink;
use tracing::{info, warn};

use crate::engine::aggregator::StatusSummary;
use crate::engine::watch::watch_summary;
use crate::state::AppState;

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(user_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state, user_id))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, user_id: String) {
    let (mut sender, mut receiver) = socket.split();

    let mut watch = match watch_summary(state.aggregator.clone(), user_id.clone()).await {
        Ok(watch) => watch,
        Err(err) => {
            warn!(user_id = %user_id, error = %err, "failed to start status watch");
            return;
        }
    };

    info!(user_id = %user_id, "websocket client connected");

    let mut send_task = tokio::spawn(async move {
        if !send_summary(&mut sender, &watch.latest()).await {
            return;
        }
        while let Some(summary) = watch.changed().await {
            if !send_summary(&mut sender, &summary).await {
                break;
            }
        }
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(_msg)) = receiver.next().await {}
    });

    // The send task owns the status watch; aborting it drops the watch and
    // its store subscriptions.
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    info!(user_id = %user_id, "websocket client disconnected");
}

async fn send_summary(sender: &mut SplitSink<WebSocket, Message>, summary: &StatusSummary) -> bool {
    let json = match serde_json::to_string(summary) {
        Ok(json) => json,
        Err(err) => {
            warn!(error = %err, "failed to serialize status summary for ws");
            return true;
        }
    };

    sender.send(Message::Text(json)).await.is_ok()
}
