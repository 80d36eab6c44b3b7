//! Handlers for messages sent by terminals.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;

use sn_domain::trace::TraceEvent;
use sn_domain::{TerminalId, User};
use sn_protocol::{LoginField, ServerMessage, TerminalCredential, TerminalRequest};
use sn_sessions::{ConnectionId, SessionEvent, SessionState};
use sn_store::{transaction, validate, VoucherRejection};

use super::router::{secret_eq, SessionRouter, SERVER_ERROR};

impl SessionRouter {
    pub(crate) fn on_terminal_message(
        &mut self,
        connection: ConnectionId,
        id: TerminalId,
        message_type: &str,
        payload: &Value,
    ) {
        let request = match TerminalRequest::parse(message_type, payload) {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!(terminal = id, error = %e, "dropping terminal message");
                return;
            }
        };

        match request {
            TerminalRequest::Init { maintenance } => self.terminal_init(connection, id, maintenance),
            TerminalRequest::GuestLogin { code } => {
                if self.require_state(id, SessionState::Ready, message_type) {
                    self.guest_login(connection, id, &code);
                }
            }
            TerminalRequest::MemberLogin {
                username,
                password,
                voucher_code,
            } => {
                if self.require_state(id, SessionState::Ready, message_type) {
                    self.member_login(connection, id, &username, &password, voucher_code.as_deref());
                }
            }
            TerminalRequest::UserTopup { code } => {
                if self.require_state(id, SessionState::Used, message_type) {
                    self.user_topup(connection, id, &code);
                }
            }
            TerminalRequest::SessionStop => self.session_stop(connection, id),
            TerminalRequest::MaintenanceStart => {
                if self.require_state(id, SessionState::Ready, message_type) {
                    self.maintenance_start(id);
                }
            }
            TerminalRequest::MaintenanceStop => {
                if self.require_state(id, SessionState::Maintenance, message_type) {
                    self.maintenance_stop(id);
                }
            }
        }
    }

    /// Requests arriving in the wrong state are logged and dropped.
    fn require_state(&self, id: TerminalId, expected: SessionState, message_type: &str) -> bool {
        let actual = self.sessions.get(&id).map(|s| s.state());
        if actual == Some(expected) {
            return true;
        }
        tracing::warn!(
            terminal = id,
            message_type,
            expected = %expected,
            actual = ?actual,
            "request not valid in current state, ignoring"
        );
        false
    }

    // ── init ─────────────────────────────────────────────────────────

    fn terminal_init(&mut self, connection: ConnectionId, id: TerminalId, maintenance: bool) {
        self.end_occupancy(id, "reinitialized");

        if maintenance {
            self.maintenance_start(id);
        }

        self.send(
            connection,
            &ServerMessage::Init {
                company: self.company.clone(),
                client: TerminalCredential {
                    id,
                    password: self.terminal_password_hash.clone(),
                },
            },
        );
    }

    /// Drop whoever occupies terminal `id`, releasing their store
    /// bindings.  Monitors see the matching stop event.
    fn end_occupancy(&mut self, id: TerminalId, reason: &str) {
        let Some(session) = self.sessions.get(&id) else {
            return;
        };
        let state = session.state();
        let user = session.user().clone();
        if !matches!(state, SessionState::Used | SessionState::Maintenance) {
            return;
        }

        if let Err(e) = self.release_bindings(id, &user) {
            tracing::error!(terminal = id, error = %e, "failed to release bindings");
        }
        if let Some(session) = self.sessions.get_mut(&id) {
            session.reset_session();
        }

        let Some(snapshot) = self.snapshot(id) else {
            return;
        };
        if state == SessionState::Maintenance {
            TraceEvent::MaintenanceFinished { terminal_id: id }.emit();
            self.broadcast(&ServerMessage::ClientMaintenanceFinished(snapshot));
        } else {
            TraceEvent::SessionStopped {
                terminal_id: id,
                username: user.username,
                group: user.group,
                reason: reason.to_owned(),
            }
            .emit();
            self.broadcast(&ServerMessage::ClientSessionStop(snapshot));
        }
    }

    // ── guest-login ──────────────────────────────────────────────────

    fn guest_login(&mut self, connection: ConnectionId, id: TerminalId, code: &str) {
        let store = Arc::clone(&self.store);

        let voucher = match validate(store.as_ref(), code, false, Utc::now()) {
            Ok(voucher) => voucher,
            Err(rejection) => {
                self.log_rejection(id, User::GUEST_USERNAME, &rejection);
                return self.send(
                    connection,
                    &ServerMessage::GuestLoginFailed {
                        reason: rejection.to_string(),
                    },
                );
            }
        };

        if let Err(e) = store.bind_voucher_to_terminal(&voucher.code, id, User::GUEST_USERNAME) {
            tracing::error!(terminal = id, voucher = %voucher.code, error = %e, "failed to bind voucher");
            return self.send(
                connection,
                &ServerMessage::GuestLoginFailed {
                    reason: SERVER_ERROR.into(),
                },
            );
        }

        let code = voucher.code.clone();
        if let Some(session) = self.sessions.get_mut(&id) {
            session.start_guest_session(voucher);
        }
        tracing::info!(terminal = id, voucher = %code, "guest login");
        self.announce_session_start(connection, id, Some(code));
    }

    // ── member-login ─────────────────────────────────────────────────

    fn member_login(
        &mut self,
        connection: ConnectionId,
        id: TerminalId,
        username: &str,
        password: &str,
        voucher_code: Option<&str>,
    ) {
        let store = Arc::clone(&self.store);
        let fail = |router: &Self, field: LoginField, reason: String| {
            TraceEvent::LoginRejected {
                terminal_id: id,
                username: username.to_owned(),
                reason: reason.clone(),
            }
            .emit();
            router.send(connection, &ServerMessage::MemberLoginFailed { field, reason });
        };

        let member = match store.find_member_by_username(username) {
            Ok(Some(member)) => member,
            Ok(None) => return fail(self, LoginField::Username, "Username not found.".into()),
            Err(e) => {
                tracing::error!(terminal = id, error = %e, "member lookup failed");
                return fail(self, LoginField::Username, SERVER_ERROR.into());
            }
        };

        if !secret_eq(&member.password, password) {
            return fail(self, LoginField::Password, "Wrong password.".into());
        }
        if !member.active {
            return fail(
                self,
                LoginField::Username,
                "This account is inactive, please contact the operator.".into(),
            );
        }
        if let Some(bound) = member.active_terminal {
            return fail(
                self,
                LoginField::Username,
                format!("This account is already signed in on client {bound}."),
            );
        }

        let mut user = User::member(member.id, member.username.clone(), member.remaining_minutes);

        if let Some(code) = voucher_code {
            let voucher = match validate(store.as_ref(), code, true, Utc::now()) {
                Ok(voucher) => voucher,
                Err(rejection) => {
                    if let VoucherRejection::StoreFailure(detail) = &rejection {
                        tracing::error!(terminal = id, error = %detail, "voucher lookup failed");
                    }
                    return fail(self, LoginField::VoucherCode, rejection.to_string());
                }
            };

            let total = user.duration_minutes + voucher.duration_minutes;
            let applied = transaction(store.as_ref(), |s| {
                s.update_member_duration(member.id, total)?;
                s.delete_voucher(&voucher.code)
            });
            if let Err(e) = applied {
                tracing::error!(terminal = id, voucher = %voucher.code, error = %e, "login top-up failed, rolled back");
                return fail(self, LoginField::VoucherCode, SERVER_ERROR.into());
            }

            user.add_duration(voucher.duration_minutes);
            TraceEvent::TopupApplied {
                terminal_id: id,
                username: user.username.clone(),
                voucher_code: voucher.code,
                added_minutes: voucher.duration_minutes,
            }
            .emit();
        }

        if user.duration_minutes <= 0 {
            return fail(
                self,
                LoginField::VoucherCode,
                "No time left, please redeem a voucher.".into(),
            );
        }

        if let Err(e) = store.bind_member_to_terminal(member.id, id) {
            tracing::error!(terminal = id, member = member.id, error = %e, "failed to bind member");
            return fail(self, LoginField::Username, SERVER_ERROR.into());
        }
        TraceEvent::MemberBound {
            terminal_id: id,
            member_id: member.id,
        }
        .emit();

        if let Some(session) = self.sessions.get_mut(&id) {
            session.start_member_session(user);
        }
        tracing::info!(terminal = id, username = %member.username, "member login");
        self.announce_session_start(connection, id, None);
    }

    fn announce_session_start(&self, connection: ConnectionId, id: TerminalId, voucher_code: Option<String>) {
        let Some(session) = self.sessions.get(&id) else {
            return;
        };
        let user = session.user();
        TraceEvent::SessionStarted {
            terminal_id: id,
            username: user.username.clone(),
            group: user.group,
            duration_minutes: user.duration_minutes,
            voucher_code,
        }
        .emit();

        self.send(
            connection,
            &ServerMessage::SessionStart {
                username: user.username.clone(),
                duration: user.duration_minutes,
            },
        );
        if let Some(snapshot) = self.snapshot(id) {
            self.broadcast(&ServerMessage::ClientSessionStart(snapshot));
        }
    }

    // ── user-topup ───────────────────────────────────────────────────

    fn user_topup(&mut self, connection: ConnectionId, id: TerminalId, code: &str) {
        let store = Arc::clone(&self.store);
        let Some(user) = self.sessions.get(&id).map(|s| s.user().clone()) else {
            return;
        };

        let voucher = match validate(store.as_ref(), code, user.is_member(), Utc::now()) {
            Ok(voucher) => voucher,
            Err(rejection) => {
                self.log_rejection(id, &user.username, &rejection);
                return self.send(
                    connection,
                    &ServerMessage::UserTopupFailed {
                        reason: rejection.to_string(),
                    },
                );
            }
        };

        let persisted = if user.is_member() {
            let total = user.duration_minutes + voucher.duration_minutes;
            transaction(store.as_ref(), |s| {
                s.update_member_duration(user.id, total)?;
                s.delete_voucher(&voucher.code)
            })
        } else {
            store.bind_voucher_to_terminal(&voucher.code, id, &user.username)
        };
        if let Err(e) = persisted {
            tracing::error!(terminal = id, voucher = %voucher.code, error = %e, "top-up failed, rolled back");
            return self.send(
                connection,
                &ServerMessage::UserTopupFailed {
                    reason: SERVER_ERROR.into(),
                },
            );
        }

        let added = voucher.duration_minutes;
        let code = voucher.code.clone();
        let events = match self.sessions.get_mut(&id) {
            Some(session) => session.topup_voucher(voucher),
            None => return,
        };
        let remaining = events.iter().find_map(|event| match event {
            SessionEvent::Updated { user, .. } => Some(user.duration_minutes),
            _ => None,
        });
        tracing::info!(terminal = id, voucher = %code, added, remaining, "top-up applied");

        TraceEvent::TopupApplied {
            terminal_id: id,
            username: user.username,
            voucher_code: code,
            added_minutes: added,
        }
        .emit();

        self.send(connection, &ServerMessage::UserTopupSuccess { duration: added });
        if let Some(snapshot) = self.snapshot(id) {
            self.broadcast(&ServerMessage::ClientUserTopup {
                client: snapshot,
                added,
            });
        }
    }

    // ── session-stop ─────────────────────────────────────────────────

    /// Stop whatever runs on terminal `id`.  Also used by monitors.
    pub(crate) fn session_stop(&mut self, connection: ConnectionId, id: TerminalId) {
        let Some(user) = self.sessions.get(&id).map(|s| s.user().clone()) else {
            return;
        };

        if let Err(e) = self.release_bindings(id, &user) {
            tracing::error!(terminal = id, error = %e, "failed to release bindings on stop");
            return self.send(
                connection,
                &ServerMessage::SessionStopFailed {
                    reason: SERVER_ERROR.into(),
                },
            );
        }

        if let Some(session) = self.sessions.get_mut(&id) {
            session.reset_session();
        }
        if user.is_member() || user.is_guest() {
            TraceEvent::SessionStopped {
                terminal_id: id,
                username: user.username,
                group: user.group,
                reason: "stopped".into(),
            }
            .emit();
        }

        self.send(connection, &ServerMessage::SessionStop);
        if let Some(snapshot) = self.snapshot(id) {
            self.broadcast(&ServerMessage::ClientSessionStop(snapshot));
        }
    }

    // ── maintenance ──────────────────────────────────────────────────

    fn maintenance_start(&mut self, id: TerminalId) {
        if let Some(session) = self.sessions.get_mut(&id) {
            session.start_administrator_session();
        }
        TraceEvent::MaintenanceStarted { terminal_id: id }.emit();
        if let Some(snapshot) = self.snapshot(id) {
            self.broadcast(&ServerMessage::ClientMaintenanceStarted(snapshot));
        }
    }

    fn maintenance_stop(&mut self, id: TerminalId) {
        if let Some(session) = self.sessions.get_mut(&id) {
            session.reset_session();
        }
        TraceEvent::MaintenanceFinished { terminal_id: id }.emit();
        if let Some(snapshot) = self.snapshot(id) {
            self.broadcast(&ServerMessage::ClientMaintenanceFinished(snapshot));
        }
    }

    fn log_rejection(&self, id: TerminalId, username: &str, rejection: &VoucherRejection) {
        match rejection {
            VoucherRejection::StoreFailure(detail) => {
                tracing::error!(terminal = id, error = %detail, "voucher lookup failed");
            }
            other => {
                TraceEvent::LoginRejected {
                    terminal_id: id,
                    username: username.to_owned(),
                    reason: other.to_string(),
                }
                .emit();
            }
        }
    }
}
