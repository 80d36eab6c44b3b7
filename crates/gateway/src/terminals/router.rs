//! Session router: owns the sessions and the connection table, decodes
//! envelopes, and turns session events into store writes and frames.
//!
//! Terminal and monitor message handlers live in `terminal.rs` and
//! `monitor.rs` as further `impl SessionRouter` blocks.

use std::collections::{BTreeMap, HashMap};
use std::net::IpAddr;
use std::sync::Arc;

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use sn_domain::config::CompanyConfig;
use sn_domain::error::Result;
use sn_domain::trace::TraceEvent;
use sn_domain::{TerminalId, User};
use sn_protocol::{decode_envelope, ProtocolError, Role, ServerMessage, SessionSnapshot};
use sn_sessions::{ConnectionId, Session, SessionEvent};
use sn_store::{BillingStore, TerminalRecord};

use super::event_loop::LoopEvent;
use super::registry::{Connection, ConnectionRegistry, ConnectionSink, OutboundFrame};
use super::ticker::Ticker;

/// Reply text for any failure caused by the store rather than the user.
pub(crate) const SERVER_ERROR: &str = "Server error, please contact the operator.";

const SUPERSEDED: &str = "Replaced by a newer connection";
const SHUTTING_DOWN: &str = "Server shutting down";

/// Constant-time string comparison via SHA-256 digest.
/// Hashing normalizes lengths so ct_eq always compares 32 bytes.
pub(crate) fn secret_eq(a: &str, b: &str) -> bool {
    let ha = Sha256::digest(a.as_bytes());
    let hb = Sha256::digest(b.as_bytes());
    ha.ct_eq(&hb).into()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Router
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct SessionRouter {
    pub(crate) sessions: BTreeMap<TerminalId, Session>,
    by_host: HashMap<String, TerminalId>,
    pub(crate) connections: ConnectionRegistry,
    pub(crate) store: Arc<dyn BillingStore>,
    ticker: Box<dyn Ticker>,
    /// Epoch each running timer was started under.
    timers: HashMap<TerminalId, u64>,
    pub(crate) company: CompanyConfig,
    /// Hex SHA-256 of the shared terminal password, sent in `init`.
    pub(crate) terminal_password_hash: String,
}

impl SessionRouter {
    pub fn new(
        terminals: Vec<TerminalRecord>,
        store: Arc<dyn BillingStore>,
        ticker: Box<dyn Ticker>,
        company: CompanyConfig,
        terminal_password: &str,
    ) -> Self {
        let mut sessions = BTreeMap::new();
        let mut by_host = HashMap::new();
        for t in terminals {
            if let Some(other) = by_host.insert(t.host_address.clone(), t.id) {
                tracing::warn!(
                    host = %t.host_address,
                    terminal = t.id,
                    shadowed = other,
                    "duplicate terminal host address, last one wins"
                );
            }
            sessions.insert(t.id, Session::new(t.id, t.host_address, t.mac_address));
        }

        Self {
            sessions,
            by_host,
            connections: ConnectionRegistry::new(),
            store,
            ticker,
            timers: HashMap::new(),
            company,
            terminal_password_hash: hex::encode(Sha256::digest(terminal_password.as_bytes())),
        }
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn session(&self, id: TerminalId) -> Option<&Session> {
        self.sessions.get(&id)
    }

    /// Handle one loop event to completion.
    pub fn handle(&mut self, event: LoopEvent) {
        match event {
            LoopEvent::Connected {
                connection,
                peer,
                sink,
            } => self.on_connected(connection, peer, sink),
            LoopEvent::Frame { connection, text } => self.on_frame(connection, &text),
            LoopEvent::Disconnected { connection } => self.on_disconnected(connection),
            LoopEvent::Tick { terminal, epoch } => self.on_tick(terminal, epoch),
            LoopEvent::Shutdown => self.shutdown(),
        }
    }

    /// Close every connection.  Bindings are left for the next startup to
    /// clear.
    pub fn shutdown(&mut self) {
        for id in self.connections.ids() {
            if let Some(conn) = self.connections.get_mut(id) {
                conn.close(SHUTTING_DOWN);
            }
        }
        let running: Vec<TerminalId> = self.timers.keys().copied().collect();
        for terminal in running {
            self.timers.remove(&terminal);
            self.ticker.stop(terminal);
        }
    }

    // ── Transport ────────────────────────────────────────────────────

    /// Dual-stack listeners report IPv4 peers as `::ffff:a.b.c.d`; the
    /// roster stores plain IPv4, so the peer is canonicalized here.
    fn on_connected(&mut self, connection: ConnectionId, peer: IpAddr, sink: ConnectionSink) {
        self.connections
            .register(Connection::new(connection, peer.to_canonical(), sink));
    }

    fn on_frame(&mut self, connection: ConnectionId, text: &str) {
        let Some(conn) = self.connections.get(connection) else {
            tracing::debug!(%connection, "frame for unknown connection");
            return;
        };
        if conn.closing {
            return;
        }
        let (latched, peer, bound) = (conn.role, conn.peer, conn.session);

        let envelope = match decode_envelope(text) {
            Ok(envelope) => envelope,
            Err(e) => return self.reject(connection, e),
        };

        match latched {
            Some(role) if role != envelope.role => {
                return self.reject(
                    connection,
                    ProtocolError::RoleMismatch {
                        latched: role,
                        got: envelope.role,
                    },
                );
            }
            Some(_) => {}
            None => {
                if let Some(conn) = self.connections.get_mut(connection) {
                    conn.role = Some(envelope.role);
                }
            }
        }

        match envelope.role {
            Role::Terminal => {
                let terminal = match bound {
                    Some(id) => id,
                    None => match self.by_host.get(&peer.to_string()).copied() {
                        Some(id) => {
                            self.attach_terminal(connection, id);
                            id
                        }
                        None => {
                            tracing::warn!(%connection, %peer, "no terminal registered for peer");
                            return self.reject(connection, ProtocolError::NotRegistered);
                        }
                    },
                };
                self.on_terminal_message(connection, terminal, &envelope.message_type, &envelope.payload);
                self.sync_timer(terminal);
            }
            Role::Monitor => {
                self.on_monitor_message(connection, &envelope.message_type, &envelope.payload);
            }
        }
    }

    fn on_disconnected(&mut self, connection: ConnectionId) {
        let Some(conn) = self.connections.remove(connection) else {
            return;
        };
        tracing::debug!(%connection, peer = %conn.peer, "connection removed");

        let Some(terminal) = conn.session else {
            return;
        };
        self.detach_terminal(terminal, "disconnected");
        self.sync_timer(terminal);

        TraceEvent::TerminalDisconnected {
            terminal_id: terminal,
        }
        .emit();
        if let Some(snapshot) = self.snapshot(terminal) {
            self.broadcast(&ServerMessage::ClientDisconnected(snapshot));
        }
    }

    /// Close `connection` for a protocol violation.  No session is touched.
    fn reject(&mut self, connection: ConnectionId, error: ProtocolError) {
        tracing::warn!(%connection, error = %error, "protocol error, closing connection");
        if let Some(conn) = self.connections.get_mut(connection) {
            conn.close(&error.to_string());
        }
    }

    /// Bind `connection` to terminal `id`, superseding any connection the
    /// session already holds.
    fn attach_terminal(&mut self, connection: ConnectionId, id: TerminalId) {
        let stale = self.sessions.get(&id).and_then(Session::connection);
        if let Some(stale) = stale.filter(|&s| s != connection) {
            tracing::warn!(terminal = id, %stale, new = %connection, "terminal reconnected, superseding stale connection");
            self.detach_terminal(id, "superseded");
            if let Some(old) = self.connections.get_mut(stale) {
                old.session = None;
                old.close(SUPERSEDED);
            }
            TraceEvent::ConnectionSuperseded {
                terminal_id: id,
                stale_connection: stale.0,
                new_connection: connection.0,
            }
            .emit();
            if let Some(snapshot) = self.snapshot(id) {
                self.broadcast(&ServerMessage::ClientDisconnected(snapshot));
            }
        }

        let peer = match self.connections.get_mut(connection) {
            Some(conn) => {
                conn.session = Some(id);
                conn.peer
            }
            None => return,
        };
        if let Some(session) = self.sessions.get_mut(&id) {
            session.attach_connection(connection);
        }

        TraceEvent::TerminalConnected {
            terminal_id: id,
            peer: peer.to_string(),
        }
        .emit();
        if let Some(snapshot) = self.snapshot(id) {
            self.broadcast(&ServerMessage::ClientConnected(snapshot));
        }
    }

    /// Release store bindings and take the session offline.  Store
    /// failures are logged; the session goes offline regardless.
    fn detach_terminal(&mut self, id: TerminalId, reason: &str) {
        let Some(user) = self.sessions.get(&id).map(|s| s.user().clone()) else {
            return;
        };
        if let Err(e) = self.release_bindings(id, &user) {
            tracing::error!(terminal = id, error = %e, "failed to release bindings on detach");
        }
        if let Some(session) = self.sessions.get_mut(&id) {
            session.detach_connection();
        }
        if user.is_member() || user.is_guest() {
            TraceEvent::SessionStopped {
                terminal_id: id,
                username: user.username,
                group: user.group,
                reason: reason.to_owned(),
            }
            .emit();
        }
    }

    // ── Store helpers ────────────────────────────────────────────────

    /// Undo what signing `user` in on terminal `id` wrote to the store.
    pub(crate) fn release_bindings(&self, id: TerminalId, user: &User) -> Result<()> {
        if user.is_member() {
            self.store.release_member_binding(user.id)
        } else if user.is_guest() {
            self.store.release_voucher_binding(id)
        } else {
            Ok(())
        }
    }

    // ── Timers ───────────────────────────────────────────────────────

    fn on_tick(&mut self, id: TerminalId, epoch: u64) {
        let Some(session) = self.sessions.get_mut(&id) else {
            return;
        };
        if !session.is_ticking() || session.timer_epoch() != epoch {
            tracing::debug!(terminal = id, epoch, "discarding stale tick");
            return;
        }

        let events = session.tick();
        for event in events {
            self.apply_tick_event(id, event);
        }
        self.sync_timer(id);
    }

    fn apply_tick_event(&mut self, id: TerminalId, event: SessionEvent) {
        tracing::trace!(terminal = id, event = event.name(), "session event");
        match event {
            SessionEvent::Updated {
                user,
                active_voucher,
            } => {
                let persisted = if user.is_member() {
                    self.store.update_member_duration(user.id, user.duration_minutes)
                } else if user.is_guest() {
                    self.store
                        .update_voucher_duration(&active_voucher.code, active_voucher.duration_minutes)
                } else {
                    Ok(())
                };
                if let Err(e) = persisted {
                    tracing::error!(terminal = id, error = %e, "failed to persist remaining time");
                }

                self.send_to_terminal(
                    id,
                    &ServerMessage::SessionSync {
                        duration: user.duration_minutes,
                    },
                );
                if let Some(snapshot) = self.snapshot_of(id, &user) {
                    self.broadcast(&ServerMessage::ClientSessionSync(snapshot));
                }
            }
            SessionEvent::TimedOut { user, .. } => {
                if let Err(e) = self.release_bindings(id, &user) {
                    tracing::error!(terminal = id, error = %e, "failed to release bindings on timeout");
                }
                tracing::info!(terminal = id, username = %user.username, "session timed out");
                TraceEvent::SessionTimedOut {
                    terminal_id: id,
                    username: user.username.clone(),
                    group: user.group,
                }
                .emit();

                self.send_to_terminal(id, &ServerMessage::SessionTimeout);
                if let Some(snapshot) = self.snapshot(id) {
                    self.broadcast(&ServerMessage::ClientSessionTimeout(snapshot));
                }
            }
            SessionEvent::VoucherExhausted { code } => {
                if let Err(e) = self.store.delete_voucher(&code) {
                    tracing::error!(terminal = id, voucher = %code, error = %e, "failed to delete spent voucher");
                }
                TraceEvent::VoucherExhausted {
                    terminal_id: id,
                    voucher_code: code,
                }
                .emit();
            }
        }
    }

    /// Start or stop the timer of `id` so it matches the session.
    pub(crate) fn sync_timer(&mut self, id: TerminalId) {
        let Some(session) = self.sessions.get(&id) else {
            return;
        };
        let (ticking, epoch) = (session.is_ticking(), session.timer_epoch());
        match (ticking, self.timers.get(&id).copied()) {
            (true, Some(running)) if running == epoch => {}
            (true, _) => {
                self.timers.insert(id, epoch);
                self.ticker.start(id, epoch);
            }
            (false, Some(_)) => {
                self.timers.remove(&id);
                self.ticker.stop(id);
            }
            (false, None) => {}
        }
    }

    // ── Outbound ─────────────────────────────────────────────────────

    pub(crate) fn send(&self, connection: ConnectionId, message: &ServerMessage) {
        if let Some(conn) = self.connections.get(connection) {
            conn.send(OutboundFrame::Text(message.to_frame()));
        }
    }

    pub(crate) fn send_to_terminal(&self, id: TerminalId, message: &ServerMessage) {
        if let Some(connection) = self.sessions.get(&id).and_then(Session::connection) {
            self.send(connection, message);
        }
    }

    /// Send `message` to every monitor.
    pub(crate) fn broadcast(&self, message: &ServerMessage) {
        let frame = message.to_frame();
        for monitor in self.connections.monitors() {
            monitor.send(OutboundFrame::Text(frame.clone()));
        }
    }

    pub(crate) fn snapshot(&self, id: TerminalId) -> Option<SessionSnapshot> {
        let session = self.sessions.get(&id)?;
        self.snapshot_of(id, session.user())
    }

    /// Snapshot of `id` with `user` standing in for the current occupant.
    fn snapshot_of(&self, id: TerminalId, user: &User) -> Option<SessionSnapshot> {
        let session = self.sessions.get(&id)?;
        Some(SessionSnapshot {
            id,
            state: session.state().as_str().to_owned(),
            connected: session.connection().is_some(),
            username: user.username.clone(),
            group: user.group,
            duration: user.duration_minutes,
        })
    }

    pub(crate) fn snapshots(&self) -> Vec<SessionSnapshot> {
        self.sessions
            .keys()
            .filter_map(|&id| self.snapshot(id))
            .collect()
    }
}
