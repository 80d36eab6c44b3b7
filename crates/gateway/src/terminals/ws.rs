//! WebSocket endpoint shared by terminals and monitors.
//!
//! Flow:
//! 1. Client connects; the peer address is captured from `ConnectInfo`.
//! 2. The connection is announced to the session loop with an outbound
//!    channel.
//! 3. A writer task drains that channel into the socket while the reader
//!    loop forwards every text frame to the session loop.
//! 4. When either side ends, the loop is told the connection is gone.

use std::net::SocketAddr;

use axum::extract::ws::{close_code, CloseFrame, Message, WebSocket};
use axum::extract::{ConnectInfo, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use super::event_loop::LoopEvent;
use super::registry::OutboundFrame;
use crate::state::AppState;

/// GET `<ws_path>`: upgrade to WebSocket.
pub async fn session_ws(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, peer))
}

async fn handle_socket(socket: WebSocket, state: AppState, peer: SocketAddr) {
    let connection = state.next_connection_id();
    let (mut ws_sink, mut ws_stream) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<OutboundFrame>(state.config.server.outbound_queue);

    let announced = state
        .events
        .send(LoopEvent::Connected {
            connection,
            peer: peer.ip(),
            sink: outbound_tx,
        })
        .await;
    if announced.is_err() {
        tracing::warn!(%peer, "session loop not running, dropping connection");
        return;
    }
    tracing::info!(%connection, %peer, "client connected");

    // Writer task: forwards outbound frames to the WS sink.
    let writer = tokio::spawn(async move {
        while let Some(frame) = outbound_rx.recv().await {
            match frame {
                OutboundFrame::Text(text) => {
                    if ws_sink.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                OutboundFrame::Close(reason) => {
                    let close = CloseFrame {
                        code: close_code::POLICY,
                        reason: reason.into(),
                    };
                    let _ = ws_sink.send(Message::Close(Some(close))).await;
                    break;
                }
            }
        }
    });

    // Reader loop: every text frame goes to the session loop as-is.
    while let Some(Ok(msg)) = ws_stream.next().await {
        match msg {
            Message::Text(text) => {
                if state.events.send(LoopEvent::Frame { connection, text }).await.is_err() {
                    break;
                }
            }
            Message::Close(_) => break,
            // axum answers pings itself.
            _ => {}
        }
    }

    writer.abort();
    let _ = state.events.send(LoopEvent::Disconnected { connection }).await;
    tracing::info!(%connection, %peer, "client disconnected");
}
