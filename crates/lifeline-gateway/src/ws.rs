// SPDX-FileCopyrightText: 2026 Lifeline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WebSocket handler for the real-time event surface.
//!
//! Client -> Server (JSON, tagged by `type`):
//! ```json
//! {"type": "join_chat_room", "target_user_id": "vol1"}
//! {"type": "send_message", "room_id": "private_v1_vol1", "message": "hello"}
//! {"type": "typing", "room_id": "private_v1_vol1", "is_typing": true}
//! ```
//!
//! Server -> Client: any [`ServerEvent`], e.g.
//! ```json
//! {"type": "presence_changed", "user_id": "vol1", "username": "Vol", "role": "volunteer", "online": true}
//! {"type": "error", "message": "forbidden: ..."}
//! ```

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;

use lifeline_core::{ClientEvent, Identity, ServerEvent};

use crate::error::{public_message, ApiError};
use crate::server::GatewayState;

/// Handshake credentials. Browsers cannot set headers on a WebSocket
/// upgrade, so the token and user id travel in the query string.
#[derive(Debug, Default, Deserialize)]
pub struct WsAuthQuery {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

/// WebSocket upgrade handler.
///
/// Authenticates before upgrading; a rejected handshake gets a plain HTTP
/// error response.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<GatewayState>,
    Query(query): Query<WsAuthQuery>,
) -> Response {
    if let Err(e) = state.auth.verify(query.token.as_deref()) {
        return ApiError(e).into_response();
    }
    let identity = match state
        .hub
        .identify(query.user_id.as_deref().unwrap_or_default())
        .await
    {
        Ok(identity) => identity,
        Err(e) => return ApiError(e).into_response(),
    };
    ws.on_upgrade(move |socket| handle_socket(socket, state, identity))
}

/// Handle an individual WebSocket connection.
///
/// Spawns a sender task that forwards the session's outbound events to the
/// socket, then runs the receive loop until the client goes away.
async fn handle_socket(socket: WebSocket, state: GatewayState, identity: Identity) {
    let connection = match state.hub.connect(&identity).await {
        Ok(connection) => connection,
        Err(e) => {
            tracing::error!(user_id = %identity.user_id, error = %e, "failed to register session");
            return;
        }
    };
    let session_id = connection.session_id;
    let mut events = connection.events;
    let (mut ws_sender, mut ws_receiver) = socket.split();

    let sender_task = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(e) => {
                    tracing::error!(error = %e, event = event.name(), "failed to encode event");
                    continue;
                }
            };
            if ws_sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(msg)) = ws_receiver.next().await {
        match msg {
            Message::Text(text) => {
                let text_str: &str = &text;
                let outcome = match serde_json::from_str::<ClientEvent>(text_str) {
                    Ok(event) => state
                        .hub
                        .handle_client_event(&identity, &session_id, event)
                        .await
                        .map_err(|e| public_message(&e)),
                    Err(e) => {
                        tracing::warn!(session_id = %session_id, "invalid WebSocket frame: {e}");
                        Err(format!("invalid frame: {e}"))
                    }
                };
                if let Err(message) = outcome {
                    state
                        .hub
                        .transport()
                        .deliver(&session_id, ServerEvent::Error { message });
                }
            }
            Message::Close(_) => break,
            _ => {} // Ignore binary, ping (handled by tungstenite layer)
        }
    }

    if let Err(e) = state.hub.disconnect(&identity, &session_id).await {
        tracing::error!(user_id = %identity.user_id, error = %e, "failed to unregister session");
    }
    sender_task.abort();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::{bind, serve, ServerConfig};
    use crate::test_support::{gateway_state, TOKEN};
    use serde_json::{json, Value};
    use std::time::Duration;
    use tokio::time::timeout;
    use tokio_tungstenite::connect_async;
    use tokio_tungstenite::tungstenite::Message as WsMessage;
    use tokio_util::sync::CancellationToken;

    const TIMEOUT: Duration = Duration::from_secs(5);

    type WsStream = tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >;

    async fn boot() -> (String, CancellationToken, tempfile::TempDir) {
        let (state, dir) = gateway_state(Some(TOKEN)).await;
        let listener = bind(&ServerConfig {
            host: "127.0.0.1".into(),
            port: 0,
        })
        .await
        .unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = CancellationToken::new();
        tokio::spawn(serve(listener, state, shutdown.clone()));
        (format!("ws://{addr}/ws"), shutdown, dir)
    }

    async fn connect(base: &str, user: &str) -> WsStream {
        let (ws, _) = connect_async(format!("{base}?token={TOKEN}&user_id={user}"))
            .await
            .unwrap();
        ws
    }

    /// Read frames until one with the given `type` arrives.
    async fn read_until(ws: &mut WsStream, kind: &str) -> Value {
        loop {
            let msg = timeout(TIMEOUT, ws.next())
                .await
                .expect("timeout waiting for message")
                .expect("stream closed")
                .expect("ws error");
            if let WsMessage::Text(text) = msg {
                let value: Value = serde_json::from_str(&text).unwrap();
                if value["type"] == kind {
                    return value;
                }
            }
        }
    }

    #[test]
    fn query_deserializes_partial() {
        let q: WsAuthQuery = serde_json::from_str(r#"{"user_id": "v1"}"#).unwrap();
        assert_eq!(q.user_id.as_deref(), Some("v1"));
        assert!(q.token.is_none());
    }

    #[tokio::test]
    async fn handshake_requires_token() {
        let (base, shutdown, _dir) = boot().await;
        assert!(connect_async(format!("{base}?user_id=v1")).await.is_err());
        assert!(connect_async(format!("{base}?token={TOKEN}&user_id=ghost"))
            .await
            .is_err());
        shutdown.cancel();
    }

    #[tokio::test]
    async fn chat_round_trip_over_websocket() {
        let (base, shutdown, _dir) = boot().await;
        let mut victim = connect(&base, "v1").await;
        read_until(&mut victim, "presence_changed").await;
        let mut vol = connect(&base, "vol1").await;

        let online = read_until(&mut victim, "presence_changed").await;
        assert_eq!(online["user_id"], "vol1");
        assert_eq!(online["online"], true);

        victim
            .send(WsMessage::text(
                json!({"type": "join_chat_room", "target_user_id": "vol1"}).to_string(),
            ))
            .await
            .unwrap();
        let joined = read_until(&mut victim, "room_joined").await;
        assert_eq!(joined["room_id"], "private_v1_vol1");

        victim
            .send(WsMessage::text(
                json!({"type": "send_message", "room_id": "private_v1_vol1", "message": "help"})
                    .to_string(),
            ))
            .await
            .unwrap();
        let received = read_until(&mut vol, "new_message").await;
        assert_eq!(received["message"], "help");
        assert_eq!(received["sender_id"], "v1");
        assert_eq!(received["sender_role"], "victim");

        vol.close(None).await.unwrap();
        let offline = read_until(&mut victim, "presence_changed").await;
        assert_eq!(offline["user_id"], "vol1");
        assert_eq!(offline["online"], false);

        shutdown.cancel();
    }

    #[tokio::test]
    async fn rejected_frames_produce_error_events() {
        let (base, shutdown, _dir) = boot().await;
        let mut outsider = connect(&base, "vol2").await;

        outsider
            .send(WsMessage::text("not json"))
            .await
            .unwrap();
        let err = read_until(&mut outsider, "error").await;
        assert!(err["message"].as_str().unwrap().contains("invalid frame"));

        outsider
            .send(WsMessage::text(
                json!({"type": "send_message", "room_id": "private_v1_vol1", "message": "hi"})
                    .to_string(),
            ))
            .await
            .unwrap();
        let err = read_until(&mut outsider, "error").await;
        assert!(err["message"].as_str().unwrap().contains("forbidden"));

        shutdown.cancel();
    }
}
