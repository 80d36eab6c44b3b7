//! Integration test: boots the real session loop and WebSocket endpoint on
//! an ephemeral port, connects a terminal and a monitor console with
//! tokio-tungstenite, and walks a guest session end to end:
//! - terminal `init` is answered with the venue and terminal credential
//! - monitors see connect, session start, billing ticks and disconnect
//! - a peer with no provisioned terminal is closed with a reason

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use sn_domain::config::Config;
use sn_gateway::bootstrap::{self, Runtime};
use sn_gateway::terminals::LoopEvent;
use sn_store::{JsonStore, TerminalRecord};

type Ws = WebSocketStream<MaybeTlsStream<TcpStream>>;

const FRAME_TIMEOUT: Duration = Duration::from_secs(5);

// ── Harness ─────────────────────────────────────────────────────────────

/// Boot a server whose only terminal lives at `terminal_host`.
async fn boot(terminal_host: &str) -> (SocketAddr, Runtime, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();

    let mut config = Config::default();
    config.store.path = dir.path().join("store.json");
    config.session.tick_seconds = 1;
    config.terminal.password_env = "SN_E2E_PASSWORD_NOT_SET".into();
    config.company.name = "E2E Cafe".into();

    let store = JsonStore::open(&config.store.path).unwrap();
    store
        .insert_terminal(TerminalRecord {
            id: 1,
            host_address: terminal_host.into(),
            mac_address: String::new(),
        })
        .unwrap();
    store
        .insert_voucher("E2E001", 5, Utc::now() + chrono::Duration::days(1))
        .unwrap();

    let runtime = bootstrap::start(Arc::new(config), Arc::new(store)).unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = bootstrap::app(runtime.state.clone());
    tokio::spawn(async move {
        axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
            .await
            .unwrap();
    });

    (addr, runtime, dir)
}

async fn connect(addr: SocketAddr) -> Ws {
    let (ws, _response) = tokio_tungstenite::connect_async(format!("ws://{addr}/"))
        .await
        .unwrap();
    ws
}

async fn send(ws: &mut Ws, frame: Value) {
    ws.send(Message::Text(frame.to_string())).await.unwrap();
}

/// Next text frame as JSON.
async fn next_frame(ws: &mut Ws) -> Value {
    loop {
        let msg = tokio::time::timeout(FRAME_TIMEOUT, ws.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("stream ended")
            .unwrap();
        match msg {
            Message::Text(text) => return serde_json::from_str(&text).unwrap(),
            Message::Close(frame) => panic!("unexpected close: {frame:?}"),
            _ => {}
        }
    }
}

/// Skip frames until one of `message_type` arrives.
async fn until(ws: &mut Ws, message_type: &str) -> Value {
    loop {
        let frame = next_frame(ws).await;
        if frame[0] == message_type {
            return frame;
        }
    }
}

async fn close_reason(ws: &mut Ws) -> String {
    loop {
        let msg = tokio::time::timeout(FRAME_TIMEOUT, ws.next())
            .await
            .expect("timed out waiting for close")
            .expect("stream ended without a close frame")
            .unwrap();
        if let Message::Close(frame) = msg {
            return frame.map(|f| f.reason.to_string()).unwrap_or_default();
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn guest_session_over_websocket() {
    let (addr, runtime, _dir) = boot("127.0.0.1").await;

    let mut monitor = connect(addr).await;
    send(&mut monitor, json!(["monitor", "init", null])).await;
    let init = next_frame(&mut monitor).await;
    assert_eq!(init[0], "init");
    assert_eq!(init[1]["company"]["name"], "E2E Cafe");
    assert_eq!(init[1]["clients"][0]["state"], "offline");

    let mut terminal = connect(addr).await;
    send(&mut terminal, json!(["terminal", "init", null])).await;
    let init = next_frame(&mut terminal).await;
    assert_eq!(init[0], "init");
    assert_eq!(init[1]["client"]["id"], 1);
    assert_eq!(init[1]["client"]["password"], hex::encode(Sha256::digest(b"")));
    let connected = until(&mut monitor, "client-connected").await;
    assert_eq!(connected[1]["state"], "ready");

    send(&mut terminal, json!(["terminal", "guest-login", "E2E001"])).await;
    let start = next_frame(&mut terminal).await;
    assert_eq!(start, json!(["session-start", {"username": "Guest", "duration": 5}]));
    let started = until(&mut monitor, "client-session-start").await;
    assert_eq!(started[1]["id"], 1);

    // One tick per second, one minute billed per tick.
    let sync = next_frame(&mut terminal).await;
    assert_eq!(sync, json!(["session-sync", 4]));
    let synced = until(&mut monitor, "client-session-sync").await;
    assert_eq!(synced[1]["duration"], 4);

    terminal.close(None).await.unwrap();
    let gone = until(&mut monitor, "client-disconnected").await;
    assert_eq!(gone[1]["state"], "offline");

    runtime.state.events.send(LoopEvent::Shutdown).await.unwrap();
    assert_eq!(close_reason(&mut monitor).await, "Server shutting down");
}

#[tokio::test]
async fn unregistered_peer_is_closed_with_reason() {
    let (addr, runtime, _dir) = boot("10.0.0.5").await;

    let mut terminal = connect(addr).await;
    send(&mut terminal, json!(["terminal", "init", null])).await;
    assert_eq!(close_reason(&mut terminal).await, "Client not registered");

    runtime.state.events.send(LoopEvent::Shutdown).await.unwrap();
}

#[tokio::test]
async fn malformed_frame_is_closed_with_reason() {
    let (addr, runtime, _dir) = boot("127.0.0.1").await;

    let mut client = connect(addr).await;
    client.send(Message::Text("[\"terminal\"".into())).await.unwrap();
    assert_eq!(close_reason(&mut client).await, "Invalid json format.");

    runtime.state.events.send(LoopEvent::Shutdown).await.unwrap();
}
