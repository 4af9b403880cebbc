//! WebSocket endpoint.
//!
//! Each socket gets an unbounded channel registered with the [`StateHub`];
//! a send task drains it into the socket while the receive loop routes
//! incoming [`CommandRequest`]s and answers the sender only.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::sync::mpsc;

use crate::hub::{ConnectionSender, HubMessage};
use crate::modules::{CommandRequest, ModuleRegistry};

use super::AppState;

pub async fn websocket_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    // Snapshots and history are queued on `tx` before anything else.
    let id = state.hub.join(tx.clone(), state.registry.as_ref());

    let (mut sender, mut receiver) = socket.split();

    let mut send_task = tokio::spawn(async move {
        while let Some(text) = rx.recv().await {
            if let Err(e) = sender.send(Message::Text(text)).await {
                log::debug!("ws {id}: send failed: {e}");
                break;
            }
        }
    });

    let registry = state.registry.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(frame) = receiver.next().await {
            match frame {
                Ok(Message::Text(text)) => handle_text(&text, &registry, &tx).await,
                Ok(Message::Close(_)) => {
                    log::debug!("ws {id}: closed by client");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    log::debug!("ws {id}: receive error: {e}");
                    break;
                }
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    state.hub.leave(&id);
}

async fn handle_text(text: &str, registry: &ModuleRegistry, reply: &ConnectionSender) {
    let message = match serde_json::from_str::<CommandRequest>(text) {
        Ok(request) => {
            let module = request.module.clone();
            let command = request.command.clone();
            let result = registry.execute(request).await;
            HubMessage::command_result(&module, &command, result)
        }
        Err(e) => {
            log::warn!("ws: ignoring malformed command: {e}");
            HubMessage::new("error", json!({ "error": format!("Invalid command: {e}") }))
        }
    };

    match message.to_json() {
        Ok(json) => {
            let _ = reply.send(json);
        }
        Err(e) => log::error!("ws: could not serialise reply: {e}"),
    }
}
