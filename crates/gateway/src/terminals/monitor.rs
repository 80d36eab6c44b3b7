//! Handlers for messages sent by monitor consoles.

use serde_json::Value;

use sn_domain::TerminalId;
use sn_protocol::{MonitorRequest, ServerMessage};
use sn_sessions::{ConnectionId, Session};

use super::router::SessionRouter;

impl SessionRouter {
    pub(crate) fn on_monitor_message(&mut self, connection: ConnectionId, message_type: &str, payload: &Value) {
        let request = match MonitorRequest::parse(message_type, payload) {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!(%connection, error = %e, "dropping monitor message");
                return;
            }
        };

        match request {
            MonitorRequest::Init => {
                self.send(
                    connection,
                    &ServerMessage::MonitorInit {
                        company: self.company.clone(),
                        clients: self.snapshots(),
                    },
                );
            }
            MonitorRequest::StopSessions(ids) => {
                for id in ids {
                    self.stop_from_monitor(id);
                }
            }
            MonitorRequest::ShutdownClients(ids) => self.command_terminals(&ids, &ServerMessage::SystemShutdown),
            MonitorRequest::RestartClients(ids) => self.command_terminals(&ids, &ServerMessage::SystemRestart),
        }
    }

    fn stop_from_monitor(&mut self, id: TerminalId) {
        let Some(terminal) = self.sessions.get(&id).and_then(Session::connection) else {
            tracing::warn!(terminal = id, "stop requested for unknown or offline terminal");
            return;
        };
        self.session_stop(terminal, id);
        self.sync_timer(id);
    }

    /// One-way commands; offline terminals are skipped.
    fn command_terminals(&self, ids: &[TerminalId], message: &ServerMessage) {
        for &id in ids {
            match self.sessions.get(&id).and_then(Session::connection) {
                Some(connection) => {
                    tracing::info!(terminal = id, command = message.message_type(), "sending command to terminal");
                    self.send(connection, message);
                }
                None => tracing::debug!(terminal = id, "terminal offline, command skipped"),
            }
        }
    }
}
