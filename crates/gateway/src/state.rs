use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

use sn_domain::config::Config;
use sn_sessions::ConnectionId;

use crate::terminals::LoopEvent;

/// Shared state handed to every WebSocket handler.
///
/// Sessions are not here: they belong to the session loop, reachable only
/// through `events`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// Inbox of the session loop.
    pub events: mpsc::Sender<LoopEvent>,
    next_connection: Arc<AtomicU64>,
}

impl AppState {
    pub fn new(config: Arc<Config>, events: mpsc::Sender<LoopEvent>) -> Self {
        Self {
            config,
            events,
            next_connection: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn next_connection_id(&self) -> ConnectionId {
        ConnectionId(self.next_connection.fetch_add(1, Ordering::Relaxed))
    }
}
