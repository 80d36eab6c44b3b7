use serde::Serialize;
use serde_json::{json, Value};

use sn_domain::config::CompanyConfig;
use sn_domain::{TerminalId, UserGroup};

/// Point-in-time view of one terminal's session, broadcast to monitors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub id: TerminalId,
    /// `offline`, `ready`, `used` or `maintenance`.
    pub state: String,
    pub connected: bool,
    pub username: String,
    pub group: UserGroup,
    /// Remaining minutes of the current occupant.
    pub duration: i64,
}

/// Credential block of the terminal `init` reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TerminalCredential {
    pub id: TerminalId,
    /// Hex SHA-256 digest of the shared terminal password.
    pub password: String,
}

/// Form field a member-login rejection refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginField {
    Username,
    Password,
    VoucherCode,
}

impl LoginField {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Username => "username",
            Self::Password => "password",
            Self::VoucherCode => "voucherCode",
        }
    }
}

/// Everything the server sends.  Terminal-bound and monitor-bound
/// messages share one enum so the router has a single send path.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    // ── Server → terminal ─────────────────────────────────────────────
    Init {
        company: CompanyConfig,
        client: TerminalCredential,
    },
    SessionStart {
        username: String,
        duration: i64,
    },
    SessionSync {
        duration: i64,
    },
    SessionTimeout,
    SessionStop,
    GuestLoginFailed {
        reason: String,
    },
    MemberLoginFailed {
        field: LoginField,
        reason: String,
    },
    UserTopupSuccess {
        duration: i64,
    },
    UserTopupFailed {
        reason: String,
    },
    SessionStopFailed {
        reason: String,
    },
    SystemShutdown,
    SystemRestart,

    // ── Server → monitor ──────────────────────────────────────────────
    MonitorInit {
        company: CompanyConfig,
        clients: Vec<SessionSnapshot>,
    },
    ClientConnected(SessionSnapshot),
    ClientDisconnected(SessionSnapshot),
    ClientSessionStart(SessionSnapshot),
    ClientSessionSync(SessionSnapshot),
    ClientSessionStop(SessionSnapshot),
    ClientSessionTimeout(SessionSnapshot),
    ClientUserTopup {
        client: SessionSnapshot,
        added: i64,
    },
    ClientMaintenanceStarted(SessionSnapshot),
    ClientMaintenanceFinished(SessionSnapshot),
}

impl ServerMessage {
    pub fn message_type(&self) -> &'static str {
        match self {
            Self::Init { .. } | Self::MonitorInit { .. } => "init",
            Self::SessionStart { .. } => "session-start",
            Self::SessionSync { .. } => "session-sync",
            Self::SessionTimeout => "session-timeout",
            Self::SessionStop => "session-stop",
            Self::GuestLoginFailed { .. } => "guest-login-failed",
            Self::MemberLoginFailed { .. } => "member-login-failed",
            Self::UserTopupSuccess { .. } => "user-topup-success",
            Self::UserTopupFailed { .. } => "user-topup-failed",
            Self::SessionStopFailed { .. } => "session-stop-failed",
            Self::SystemShutdown => "system-shutdown",
            Self::SystemRestart => "system-restart",
            Self::ClientConnected(_) => "client-connected",
            Self::ClientDisconnected(_) => "client-disconnected",
            Self::ClientSessionStart(_) => "client-session-start",
            Self::ClientSessionSync(_) => "client-session-sync",
            Self::ClientSessionStop(_) => "client-session-stop",
            Self::ClientSessionTimeout(_) => "client-session-timeout",
            Self::ClientUserTopup { .. } => "client-user-topup",
            Self::ClientMaintenanceStarted(_) => "client-maintenance-started",
            Self::ClientMaintenanceFinished(_) => "client-maintenance-finished",
        }
    }

    pub fn payload(&self) -> Value {
        match self {
            Self::Init { company, client } => json!({ "company": company, "client": client }),
            Self::SessionStart { username, duration } => {
                json!({ "username": username, "duration": duration })
            }
            Self::SessionSync { duration } | Self::UserTopupSuccess { duration } => json!(duration),
            Self::SessionTimeout
            | Self::SessionStop
            | Self::SystemShutdown
            | Self::SystemRestart => Value::Null,
            Self::GuestLoginFailed { reason }
            | Self::UserTopupFailed { reason }
            | Self::SessionStopFailed { reason } => json!(reason),
            Self::MemberLoginFailed { field, reason } => json!([field.as_str(), reason]),
            Self::MonitorInit { company, clients } => {
                json!({ "company": company, "clients": clients })
            }
            Self::ClientConnected(s)
            | Self::ClientDisconnected(s)
            | Self::ClientSessionStart(s)
            | Self::ClientSessionSync(s)
            | Self::ClientSessionStop(s)
            | Self::ClientSessionTimeout(s)
            | Self::ClientMaintenanceStarted(s)
            | Self::ClientMaintenanceFinished(s) => json!(s),
            Self::ClientUserTopup { client, added } => {
                let mut value = json!(client);
                if let Value::Object(map) = &mut value {
                    map.insert("added".into(), json!(added));
                }
                value
            }
        }
    }

    /// Render as the compact `[messageType, payload]` text frame.
    pub fn to_frame(&self) -> String {
        Value::Array(vec![Value::String(self.message_type().into()), self.payload()]).to_string()
    }
}
