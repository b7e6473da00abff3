use axum::{
    extract::{
        Query, State, WebSocketUpgrade,
        ws::{CloseFrame, Message, WebSocket, close_code},
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::debug;

use crate::middleware::auth::verify_token;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub token: Option<String>,
}

/// Real-time subscriber channel. The bearer credential travels as a query
/// parameter because browsers cannot set headers on WebSocket upgrades; an
/// invalid or missing token closes the fresh connection with close code 1008.
pub async fn ws_handler(
    State(state): State<AppState>,
    Query(params): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(state, params.token, socket))
}

async fn handle_socket(state: AppState, token: Option<String>, mut socket: WebSocket) {
    let authorized = token
        .as_deref()
        .is_some_and(|t| verify_token(&state.config.jwt_secret, t).is_ok());

    if !authorized {
        debug!("closing unauthorized websocket connection");
        let _ = socket
            .send(Message::Close(Some(CloseFrame {
                code: close_code::POLICY,
                reason: "Unauthorized".into(),
            })))
            .await;
        return;
    }

    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let conn_id = state.hub.subscribe(tx).await;

    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            update = rx.recv() => match update {
                Some(payload) => {
                    if sink.send(Message::Text(payload.into())).await.is_err() {
                        break;
                    }
                }
                None => break,
            },
            frame = stream.next() => match frame {
                // Inbound client messages are accepted but not acted upon.
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    state.hub.unsubscribe(conn_id).await;
    debug!("websocket connection closed");
}
