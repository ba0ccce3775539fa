use async_trait::async_trait;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use opendental_cua::{LogEntry, LogListener, RunStatus, WorkflowKind};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::run_manager::RunManager;
use crate::types::{ApiResponse, ApiResponsePayload, ClientMessage, RunApiPayload, ServerMessage};

/// Forwards run log entries to the socket writer as `api_log` messages.
struct LogForwarder {
    tx: mpsc::UnboundedSender<ServerMessage>,
}

#[async_trait]
impl LogListener for LogForwarder {
    async fn on_log(&self, entry: LogEntry) {
        let _ = self.tx.send(ServerMessage::ApiLog { payload: entry });
    }
}

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(manager): State<Arc<RunManager>>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, manager))
}

async fn handle_socket(socket: WebSocket, manager: Arc<RunManager>) {
    let connection_id = Uuid::new_v4();
    info!("WebSocket connected: {}", connection_id);

    let (mut sender, mut receiver) = socket.split();
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<ServerMessage>();

    loop {
        tokio::select! {
            outgoing = out_rx.recv() => {
                let Some(message) = outgoing else { break };
                let text = match serde_json::to_string(&message) {
                    Ok(text) => text,
                    Err(e) => {
                        error!("Failed to serialize WebSocket message: {}", e);
                        continue;
                    }
                };
                if let Err(e) = sender.send(Message::Text(text.into())).await {
                    warn!("Failed to send WebSocket message: {}", e);
                    break;
                }
            }

            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        if text.as_str() == "ping" {
                            let _ = sender.send(Message::Text("pong".into())).await;
                            continue;
                        }
                        handle_client_message(text.as_str(), &manager, &out_tx).await;
                    }
                    Some(Ok(Message::Close(_))) => {
                        info!("WebSocket close received");
                        break;
                    }
                    Some(Err(e)) => {
                        warn!("WebSocket error: {}", e);
                        break;
                    }
                    None => break,
                    _ => {}
                }
            }
        }
    }

    info!("WebSocket disconnected: {}", connection_id);
}

async fn handle_client_message(
    text: &str,
    manager: &Arc<RunManager>,
    out_tx: &mpsc::UnboundedSender<ServerMessage>,
) {
    let message = match serde_json::from_str::<ClientMessage>(text) {
        Ok(message) => message,
        Err(e) => {
            let _ = out_tx.send(ServerMessage::Error {
                message: format!("Invalid message: {e}"),
            });
            return;
        }
    };

    match message {
        ClientMessage::RunApi { payload } => {
            // Runs in the background so the socket keeps serving pings and stops
            let manager = manager.clone();
            let out_tx = out_tx.clone();
            tokio::spawn(async move {
                let response = run_api(&manager, &payload, &out_tx).await;
                let _ = out_tx.send(ServerMessage::ApiResponse {
                    payload: ApiResponsePayload {
                        endpoint: payload.endpoint,
                        response,
                    },
                });
            });
        }
        ClientMessage::StopAgent => {
            if manager.stop().await.is_none() {
                info!("Stop requested with no active run");
            }
        }
    }
}

async fn run_api(
    manager: &RunManager,
    payload: &RunApiPayload,
    out_tx: &mpsc::UnboundedSender<ServerMessage>,
) -> ApiResponse {
    let failure = |error: String| ApiResponse {
        status: RunStatus::Error,
        data: None,
        error: Some(error),
    };

    let kind = match payload.endpoint.parse::<WorkflowKind>() {
        Ok(kind) => kind,
        Err(e) => return failure(e),
    };

    let listener: Arc<dyn LogListener> = Arc::new(LogForwarder { tx: out_tx.clone() });
    match manager
        .run(kind, payload.patient_name.as_deref(), Some(listener))
        .await
    {
        Ok(result) => ApiResponse::from(&result),
        Err(e) => failure(e),
    }
}
