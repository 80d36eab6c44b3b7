//! Connection table owned by the session router.

use std::collections::HashMap;
use std::net::IpAddr;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use sn_domain::TerminalId;
use sn_protocol::Role;
use sn_sessions::ConnectionId;

/// A frame queued for a connection's WebSocket writer task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundFrame {
    Text(String),
    /// Close the socket with the given reason.  Nothing after this is sent.
    Close(String),
}

pub type ConnectionSink = mpsc::Sender<OutboundFrame>;

/// One live transport connection.
pub struct Connection {
    pub id: ConnectionId,
    pub peer: IpAddr,
    /// Latched from the first envelope.
    pub role: Option<Role>,
    /// The terminal this connection drives, once resolved.
    pub session: Option<TerminalId>,
    /// Set once a close has been queued; later frames are ignored.
    pub closing: bool,
    pub connected_at: DateTime<Utc>,
    sink: ConnectionSink,
}

impl Connection {
    pub fn new(id: ConnectionId, peer: IpAddr, sink: ConnectionSink) -> Self {
        Self {
            id,
            peer,
            role: None,
            session: None,
            closing: false,
            connected_at: Utc::now(),
            sink,
        }
    }

    pub fn is_monitor(&self) -> bool {
        self.role == Some(Role::Monitor)
    }

    /// Queue a frame without waiting.  A full queue drops the frame: the
    /// event loop never blocks on a slow client.
    pub fn send(&self, frame: OutboundFrame) -> bool {
        match self.sink.try_send(frame) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::warn!(connection = %self.id, peer = %self.peer, "outbound queue full, dropping frame");
                false
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!(connection = %self.id, "writer gone, dropping frame");
                false
            }
        }
    }

    /// Queue a close frame and stop accepting input from this connection.
    pub fn close(&mut self, reason: &str) {
        if !self.closing {
            self.closing = true;
            self.send(OutboundFrame::Close(reason.to_owned()));
        }
    }
}

#[derive(Default)]
pub struct ConnectionRegistry {
    connections: HashMap<ConnectionId, Connection>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, connection: Connection) {
        tracing::debug!(connection = %connection.id, peer = %connection.peer, "connection registered");
        self.connections.insert(connection.id, connection);
    }

    pub fn remove(&mut self, id: ConnectionId) -> Option<Connection> {
        self.connections.remove(&id)
    }

    pub fn get(&self, id: ConnectionId) -> Option<&Connection> {
        self.connections.get(&id)
    }

    pub fn get_mut(&mut self, id: ConnectionId) -> Option<&mut Connection> {
        self.connections.get_mut(&id)
    }

    pub fn monitors(&self) -> impl Iterator<Item = &Connection> {
        self.connections.values().filter(|c| c.is_monitor() && !c.closing)
    }

    pub fn ids(&self) -> Vec<ConnectionId> {
        self.connections.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn connection(id: u64, capacity: usize) -> (Connection, mpsc::Receiver<OutboundFrame>) {
        let (tx, rx) = mpsc::channel(capacity);
        (
            Connection::new(ConnectionId(id), IpAddr::V4(Ipv4Addr::LOCALHOST), tx),
            rx,
        )
    }

    #[test]
    fn full_queue_drops_instead_of_blocking() {
        let (conn, mut rx) = connection(1, 1);
        assert!(conn.send(OutboundFrame::Text("a".into())));
        assert!(!conn.send(OutboundFrame::Text("b".into())));
        assert_eq!(rx.try_recv().unwrap(), OutboundFrame::Text("a".into()));
    }

    #[test]
    fn close_is_sent_once() {
        let (mut conn, mut rx) = connection(1, 4);
        conn.close("bye");
        conn.close("bye again");
        assert!(conn.closing);
        assert_eq!(rx.try_recv().unwrap(), OutboundFrame::Close("bye".into()));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn monitors_exclude_terminals_and_unlatched() {
        let mut registry = ConnectionRegistry::new();
        let (mut a, _ra) = connection(1, 1);
        a.role = Some(Role::Monitor);
        let (mut b, _rb) = connection(2, 1);
        b.role = Some(Role::Terminal);
        let (c, _rc) = connection(3, 1);
        registry.register(a);
        registry.register(b);
        registry.register(c);

        let monitors: Vec<_> = registry.monitors().map(|c| c.id).collect();
        assert_eq!(monitors, vec![ConnectionId(1)]);
        assert_eq!(registry.len(), 3);
    }
}
