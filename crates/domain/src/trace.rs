use serde::Serialize;

use crate::{MemberId, TerminalId, UserGroup};

/// Structured activity events emitted across all shiftnet crates.
///
/// These replace a dedicated activity table: every billable transition is
/// logged once, as JSON, under the `sn_event` message.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    TerminalConnected {
        terminal_id: TerminalId,
        peer: String,
    },
    TerminalDisconnected {
        terminal_id: TerminalId,
    },
    ConnectionSuperseded {
        terminal_id: TerminalId,
        stale_connection: u64,
        new_connection: u64,
    },
    SessionStarted {
        terminal_id: TerminalId,
        username: String,
        group: UserGroup,
        duration_minutes: i64,
        #[serde(skip_serializing_if = "Option::is_none")]
        voucher_code: Option<String>,
    },
    SessionStopped {
        terminal_id: TerminalId,
        username: String,
        group: UserGroup,
        reason: String,
    },
    SessionTimedOut {
        terminal_id: TerminalId,
        username: String,
        group: UserGroup,
    },
    TopupApplied {
        terminal_id: TerminalId,
        username: String,
        voucher_code: String,
        added_minutes: i64,
    },
    VoucherExhausted {
        terminal_id: TerminalId,
        voucher_code: String,
    },
    LoginRejected {
        terminal_id: TerminalId,
        username: String,
        reason: String,
    },
    MemberBound {
        terminal_id: TerminalId,
        member_id: MemberId,
    },
    MaintenanceStarted {
        terminal_id: TerminalId,
    },
    MaintenanceFinished {
        terminal_id: TerminalId,
    },
    StorePrepared {
        terminals: usize,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "sn_event");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_event_tag() {
        let event = TraceEvent::SessionStarted {
            terminal_id: 3,
            username: "Guest".into(),
            group: UserGroup::Guest,
            duration_minutes: 60,
            voucher_code: Some("6JNOFP".into()),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], "SessionStarted");
        assert_eq!(value["group"], "guest");
        assert_eq!(value["voucher_code"], "6JNOFP");
    }

    #[test]
    fn absent_voucher_code_is_omitted() {
        let event = TraceEvent::SessionStarted {
            terminal_id: 1,
            username: "alice".into(),
            group: UserGroup::Member,
            duration_minutes: 10,
            voucher_code: None,
        };
        let value = serde_json::to_value(&event).unwrap();
        assert!(value.get("voucher_code").is_none());
    }
}
