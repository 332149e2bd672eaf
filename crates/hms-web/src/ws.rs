//! WebSocket 事件通道
//!
//! 每个连接在中继中注册为一个客户端：入站帧解析为指令，出站消息来自该客户端的发送队列。

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use chrono::{DateTime, Utc};
use futures::{sink::SinkExt, stream::StreamExt};
use hms_core::{Result, Store};
use hms_relay::{ClientCommand, ClientConnection, ClientId, EventRelay, RelayMessage};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::server::AppState;

/// 推送给客户端的帧
#[derive(Debug, Serialize)]
pub struct ServerFrame<'a> {
    pub event: &'a str,
    pub data: &'a serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl<'a> From<&'a RelayMessage> for ServerFrame<'a> {
    fn from(message: &'a RelayMessage) -> Self {
        Self {
            event: &message.event,
            data: &message.data,
            timestamp: message.timestamp,
        }
    }
}

pub async fn websocket_handler<S: Store>(
    ws: WebSocketUpgrade,
    State(state): State<AppState<S>>,
) -> Response {
    let relay = state.relay.clone();
    ws.on_upgrade(move |socket| handle_socket(socket, relay))
}

async fn handle_socket(socket: WebSocket, relay: Arc<EventRelay>) {
    let ClientConnection { id, mut receiver } = relay.connect().await;
    let (mut sender, mut stream) = socket.split();

    let mut send_task = tokio::spawn(async move {
        while let Some(message) = receiver.recv().await {
            let text = match serde_json::to_string(&ServerFrame::from(&message)) {
                Ok(text) => text,
                Err(e) => {
                    warn!("Failed to encode {} for client {}: {}", message.event, id, e);
                    continue;
                }
            };
            if sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    let inbound_relay = relay.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(message) = stream.next().await {
            match message {
                Ok(Message::Text(text)) => {
                    if let Err(e) = handle_client_text(&inbound_relay, id, &text).await {
                        warn!("Rejected frame from client {}: {}", id, e);
                    }
                }
                Ok(Message::Close(_)) => {
                    debug!("Client {} sent close", id);
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("WebSocket error for client {}: {}", id, e);
                    break;
                }
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    relay.disconnect(id).await;
    info!("WebSocket connection closed: {}", id);
}

/// 处理一条客户端文本帧
pub async fn handle_client_text(relay: &EventRelay, client: ClientId, text: &str) -> Result<()> {
    match ClientCommand::parse(text)? {
        ClientCommand::JoinRoom(room) => relay.join_room(client, &room).await,
        ClientCommand::LeaveRoom(room) => relay.leave_room(client, &room).await,
        ClientCommand::Publish(event) => {
            relay.publish(Some(client), event).await;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_client_frames_drive_relay() {
        let relay = EventRelay::default();
        let mut manager = relay.connect().await;
        let mut nurse = relay.connect().await;

        handle_client_text(&relay, manager.id, r#"{"event":"join_room","data":"role:OTManager"}"#)
            .await
            .unwrap();
        handle_client_text(
            &relay,
            nurse.id,
            r#"{"event":"EMERGENCY_INITIATED","data":{"ward":"ICU"}}"#,
        )
        .await
        .unwrap();

        let message = manager.receiver.try_recv().unwrap();
        assert_eq!(message.event, "EMERGENCY_INITIATED");
        assert!(nurse.receiver.try_recv().is_err());

        let frame = serde_json::to_value(ServerFrame::from(&message)).unwrap();
        assert_eq!(frame["event"], "EMERGENCY_INITIATED");
        assert_eq!(frame["data"]["ward"], "ICU");
        assert!(frame.get("timestamp").is_some());
        assert!(frame.get("source").is_none());
    }

    #[tokio::test]
    async fn test_invalid_frame_is_rejected() {
        let relay = EventRelay::default();
        let client = relay.connect().await;
        assert!(handle_client_text(&relay, client.id, r#"{"event":"nope"}"#)
            .await
            .is_err());
    }
}
