use std::fmt;
use std::str::FromStr;

use serde_json::Value;

/// Which side of the venue a connection belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// A billable terminal, identified by its peer address.
    Terminal,
    /// An operator console observing and controlling terminals.
    Monitor,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Terminal => "terminal",
            Self::Monitor => "monitor",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "terminal" => Ok(Self::Terminal),
            "monitor" => Ok(Self::Monitor),
            other => Err(ProtocolError::UnknownRole(other.to_owned())),
        }
    }
}

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub role: Role,
    pub message_type: String,
    pub payload: Value,
}

/// Envelope-level failures.  Each one closes the connection; the
/// `Display` text is sent as the close reason.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("Invalid json format.")]
    InvalidJson,
    #[error("Invalid json format.")]
    NotAnEnvelope,
    #[error("Unknown client type: {0}")]
    UnknownRole(String),
    #[error("Client type changed from {latched} to {got}")]
    RoleMismatch { latched: Role, got: Role },
    #[error("Client not registered")]
    NotRegistered,
}

/// Decode one text frame into an [`Envelope`].
///
/// The frame must be a JSON array of exactly three elements whose first
/// two are strings.
pub fn decode_envelope(text: &str) -> Result<Envelope, ProtocolError> {
    let value: Value = serde_json::from_str(text).map_err(|_| ProtocolError::InvalidJson)?;
    let Value::Array(mut items) = value else {
        return Err(ProtocolError::NotAnEnvelope);
    };
    if items.len() != 3 {
        return Err(ProtocolError::NotAnEnvelope);
    }

    let payload = items.pop().unwrap_or(Value::Null);
    let message_type = match items.pop() {
        Some(Value::String(s)) => s,
        _ => return Err(ProtocolError::NotAnEnvelope),
    };
    let role = match items.pop() {
        Some(Value::String(s)) => s.parse::<Role>()?,
        _ => return Err(ProtocolError::NotAnEnvelope),
    };

    Ok(Envelope {
        role,
        message_type,
        payload,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_terminal_frame() {
        let env = decode_envelope(r#"["terminal","guest-login","6JNOFP"]"#).unwrap();
        assert_eq!(env.role, Role::Terminal);
        assert_eq!(env.message_type, "guest-login");
        assert_eq!(env.payload, Value::String("6JNOFP".into()));
    }

    #[test]
    fn null_payload_is_kept() {
        let env = decode_envelope(r#"["monitor","init",null]"#).unwrap();
        assert_eq!(env.role, Role::Monitor);
        assert!(env.payload.is_null());
    }

    #[test]
    fn rejects_non_json() {
        assert_eq!(decode_envelope("hello"), Err(ProtocolError::InvalidJson));
    }

    #[test]
    fn rejects_wrong_arity() {
        assert_eq!(
            decode_envelope(r#"["terminal","init"]"#),
            Err(ProtocolError::NotAnEnvelope)
        );
        assert_eq!(
            decode_envelope(r#"["terminal","init",null,1]"#),
            Err(ProtocolError::NotAnEnvelope)
        );
        assert_eq!(
            decode_envelope(r#"{"role":"terminal"}"#),
            Err(ProtocolError::NotAnEnvelope)
        );
    }

    #[test]
    fn rejects_unknown_role() {
        assert_eq!(
            decode_envelope(r#"["printer","init",null]"#),
            Err(ProtocolError::UnknownRole("printer".into()))
        );
    }

    #[test]
    fn rejects_non_string_type() {
        assert_eq!(
            decode_envelope(r#"["terminal",5,null]"#),
            Err(ProtocolError::NotAnEnvelope)
        );
    }

    #[test]
    fn close_reasons_are_human_readable() {
        assert_eq!(ProtocolError::NotRegistered.to_string(), "Client not registered");
        let mismatch = ProtocolError::RoleMismatch {
            latched: Role::Terminal,
            got: Role::Monitor,
        };
        assert_eq!(mismatch.to_string(), "Client type changed from terminal to monitor");
    }
}
