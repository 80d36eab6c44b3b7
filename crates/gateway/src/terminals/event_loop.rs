//! The single task that owns every session.
//!
//! Socket readers and tick timers only post [`LoopEvent`]s; each event is
//! handled to completion before the next one is taken, so the router
//! never needs a lock.

use std::net::IpAddr;

use tokio::sync::mpsc;

use sn_domain::TerminalId;
use sn_sessions::ConnectionId;

use super::registry::ConnectionSink;
use super::router::SessionRouter;

#[derive(Debug)]
pub enum LoopEvent {
    /// A WebSocket was accepted.
    Connected {
        connection: ConnectionId,
        peer: IpAddr,
        sink: ConnectionSink,
    },
    /// A text frame arrived.
    Frame {
        connection: ConnectionId,
        text: String,
    },
    /// The socket is gone.
    Disconnected { connection: ConnectionId },
    /// A billing minute elapsed for `terminal`.
    Tick { terminal: TerminalId, epoch: u64 },
    /// Close every connection and stop the loop.
    Shutdown,
}

/// Drive `router` until [`LoopEvent::Shutdown`] arrives or every sender is
/// gone.
pub async fn run(mut router: SessionRouter, mut events: mpsc::Receiver<LoopEvent>) {
    tracing::info!(terminals = router.session_count(), "session loop started");

    while let Some(event) = events.recv().await {
        if matches!(event, LoopEvent::Shutdown) {
            router.shutdown();
            break;
        }
        router.handle(event);
    }

    tracing::info!("session loop stopped");
}
