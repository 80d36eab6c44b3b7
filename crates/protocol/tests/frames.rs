//! Outbound frame shapes, checked against what terminal and monitor
//! clients parse.

use serde_json::{json, Value};
use sn_domain::config::CompanyConfig;
use sn_domain::UserGroup;
use sn_protocol::{LoginField, ServerMessage, SessionSnapshot, TerminalCredential};

fn parse(frame: &str) -> Value {
    serde_json::from_str(frame).unwrap()
}

fn snapshot() -> SessionSnapshot {
    SessionSnapshot {
        id: 4,
        state: "used".into(),
        connected: true,
        username: "alice".into(),
        group: UserGroup::Member,
        duration: 42,
    }
}

#[test]
fn terminal_init_carries_company_and_credential() {
    let msg = ServerMessage::Init {
        company: CompanyConfig {
            name: "Shift Net".into(),
            address: "Jl. Merdeka 1".into(),
        },
        client: TerminalCredential {
            id: 4,
            password: "abc123".into(),
        },
    };
    assert_eq!(
        parse(&msg.to_frame()),
        json!(["init", {
            "company": { "name": "Shift Net", "address": "Jl. Merdeka 1" },
            "client": { "id": 4, "password": "abc123" }
        }])
    );
}

#[test]
fn member_login_failure_names_the_field() {
    let msg = ServerMessage::MemberLoginFailed {
        field: LoginField::VoucherCode,
        reason: "Voucher not found.".into(),
    };
    assert_eq!(
        parse(&msg.to_frame()),
        json!(["member-login-failed", ["voucherCode", "Voucher not found."]])
    );
}

#[test]
fn payload_less_messages_send_null() {
    assert_eq!(parse(&ServerMessage::SessionTimeout.to_frame()), json!(["session-timeout", null]));
    assert_eq!(parse(&ServerMessage::SystemRestart.to_frame()), json!(["system-restart", null]));
}

#[test]
fn session_sync_is_a_bare_number() {
    assert_eq!(
        parse(&ServerMessage::SessionSync { duration: 17 }.to_frame()),
        json!(["session-sync", 17])
    );
}

#[test]
fn monitor_notifications_carry_the_snapshot() {
    let frame = parse(&ServerMessage::ClientSessionSync(snapshot()).to_frame());
    assert_eq!(frame[0], "client-session-sync");
    assert_eq!(
        frame[1],
        json!({
            "id": 4, "state": "used", "connected": true,
            "username": "alice", "group": "member", "duration": 42
        })
    );
}

#[test]
fn topup_notification_adds_minutes_to_snapshot() {
    let frame = parse(
        &ServerMessage::ClientUserTopup {
            client: snapshot(),
            added: 30,
        }
        .to_frame(),
    );
    assert_eq!(frame[0], "client-user-topup");
    assert_eq!(frame[1]["added"], 30);
    assert_eq!(frame[1]["id"], 4);
}

#[test]
fn monitor_init_lists_roster() {
    let msg = ServerMessage::MonitorInit {
        company: CompanyConfig::default(),
        clients: vec![snapshot()],
    };
    let frame = parse(&msg.to_frame());
    assert_eq!(frame[0], "init");
    assert_eq!(frame[1]["clients"].as_array().unwrap().len(), 1);
}
