use serde_json::Value;

use sn_domain::TerminalId;

/// Requests a terminal can send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalRequest {
    /// Sent on every (re)connect.  `maintenance` asks to resume an
    /// administrator session instead of a fresh lock screen.
    Init { maintenance: bool },
    GuestLogin { code: String },
    MemberLogin {
        username: String,
        password: String,
        voucher_code: Option<String>,
    },
    SessionStop,
    UserTopup { code: String },
    MaintenanceStart,
    MaintenanceStop,
}

/// Requests a monitor console can send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorRequest {
    Init,
    StopSessions(Vec<TerminalId>),
    ShutdownClients(Vec<TerminalId>),
    RestartClients(Vec<TerminalId>),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    #[error("unknown message type: {0}")]
    UnknownType(String),
    #[error("malformed {message_type} payload: {reason}")]
    BadPayload {
        message_type: String,
        reason: &'static str,
    },
}

impl TerminalRequest {
    pub fn parse(message_type: &str, payload: &Value) -> Result<Self, RequestError> {
        let bad = |reason| RequestError::BadPayload {
            message_type: message_type.to_owned(),
            reason,
        };

        match message_type {
            "init" => Ok(Self::Init {
                maintenance: payload.as_str() == Some("maintenance"),
            }),
            "guest-login" => {
                let code = payload.as_str().ok_or_else(|| bad("expected voucher code"))?;
                Ok(Self::GuestLogin {
                    code: code.trim().to_owned(),
                })
            }
            "member-login" => {
                let fields = payload
                    .as_array()
                    .ok_or_else(|| bad("expected [username, password, voucherCode]"))?;
                let field = |i: usize| fields.get(i).and_then(Value::as_str).map(str::trim);
                let username = field(0).ok_or_else(|| bad("missing username"))?;
                let password = fields
                    .get(1)
                    .and_then(Value::as_str)
                    .ok_or_else(|| bad("missing password"))?;
                let voucher_code = field(2).filter(|c| !c.is_empty()).map(str::to_owned);
                Ok(Self::MemberLogin {
                    username: username.to_owned(),
                    password: password.to_owned(),
                    voucher_code,
                })
            }
            "session-stop" => Ok(Self::SessionStop),
            "user-topup" => {
                let code = payload.as_str().ok_or_else(|| bad("expected voucher code"))?;
                Ok(Self::UserTopup {
                    code: code.trim().to_owned(),
                })
            }
            "maintenance-start" => Ok(Self::MaintenanceStart),
            "maintenance-stop" => Ok(Self::MaintenanceStop),
            other => Err(RequestError::UnknownType(other.to_owned())),
        }
    }
}

impl MonitorRequest {
    pub fn parse(message_type: &str, payload: &Value) -> Result<Self, RequestError> {
        let ids = || {
            terminal_ids(payload).ok_or_else(|| RequestError::BadPayload {
                message_type: message_type.to_owned(),
                reason: "expected a list of terminal ids",
            })
        };

        match message_type {
            "init" => Ok(Self::Init),
            "stop-sessions" => Ok(Self::StopSessions(ids()?)),
            "shutdown-clients" => Ok(Self::ShutdownClients(ids()?)),
            "restart-clients" => Ok(Self::RestartClients(ids()?)),
            other => Err(RequestError::UnknownType(other.to_owned())),
        }
    }
}

/// Terminal ids arrive as numbers, but older consoles send them as
/// numeric strings.
fn terminal_ids(payload: &Value) -> Option<Vec<TerminalId>> {
    payload
        .as_array()?
        .iter()
        .map(|v| match v {
            Value::Number(n) => n.as_u64().and_then(|n| TerminalId::try_from(n).ok()),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
        .collect()
}
