use sn_domain::{User, Voucher};
use sn_sessions::{ConnectionId, Session, SessionEvent, SessionState};

fn used_by_guest(voucher: Voucher) -> Session {
    let mut session = Session::new(7, "10.0.0.17", "aa:bb:cc:dd:ee:07");
    session.attach_connection(ConnectionId(42));
    session.start_guest_session(voucher);
    session
}

#[test]
fn ten_minute_voucher_times_out_exactly_once() {
    let mut session = used_by_guest(Voucher::new("TENMIN", 10, 1));

    let mut timeouts = 0;
    let mut last_updated = None;
    for _ in 0..10 {
        for event in session.tick() {
            match event {
                SessionEvent::Updated {
                    user,
                    active_voucher,
                } => last_updated = Some((user.duration_minutes, active_voucher.duration_minutes)),
                SessionEvent::TimedOut {
                    user,
                    active_voucher,
                } => {
                    timeouts += 1;
                    assert!(user.is_guest());
                    assert_eq!(user.duration_minutes, 0);
                    assert_eq!(active_voucher.code, "TENMIN");
                }
                SessionEvent::VoucherExhausted { code } => assert_eq!(code, "TENMIN"),
            }
        }
    }

    assert_eq!(timeouts, 1);
    assert_eq!(last_updated, Some((0, 0)));
    assert_eq!(session.state(), SessionState::Ready);
    assert!(!session.is_ticking());

    // Nothing left to bill.
    assert!(session.tick().is_empty());
}

#[test]
fn timeout_after_disconnect_lands_offline() {
    let mut session = used_by_guest(Voucher::new("ONE", 1, 1));
    session.detach_connection();
    assert_eq!(session.state(), SessionState::Offline);
    assert!(session.tick().is_empty());
}

#[test]
fn backlog_rotates_in_fifo_order() {
    let mut session = used_by_guest(Voucher::new("C", 2, 3));
    session.topup_voucher(Voucher::new("A", 5, 1));
    session.topup_voucher(Voucher::new("B", 7, 2));
    assert_eq!(session.user().duration_minutes, 14);

    let first = session.tick();
    assert_eq!(first.len(), 1);
    assert_eq!(session.active_voucher().code, "C");

    let second = session.tick();
    assert_eq!(
        second.iter().map(SessionEvent::name).collect::<Vec<_>>(),
        ["updated", "voucher_exhausted"]
    );
    assert!(matches!(
        &second[1],
        SessionEvent::VoucherExhausted { code } if code == "C"
    ));

    assert_eq!(session.active_voucher().code, "A");
    assert_eq!(session.active_voucher().duration_minutes, 5);
    let queued: Vec<_> = session.voucher_backlog().map(|v| v.code.as_str()).collect();
    assert_eq!(queued, ["B"]);
    assert_eq!(session.user().duration_minutes, 12);
    assert_eq!(session.state(), SessionState::Used);
}

#[test]
fn timeout_and_exhaustion_fire_in_one_tick() {
    let mut session = used_by_guest(Voucher::new("LAST", 1, 9));
    let events = session.tick();
    assert_eq!(
        events.iter().map(SessionEvent::name).collect::<Vec<_>>(),
        ["updated", "timed_out", "voucher_exhausted"]
    );
    assert_eq!(session.state(), SessionState::Ready);
    assert!(session.active_voucher().is_empty());
}

#[test]
fn member_runs_out() {
    let mut session = Session::new(2, "10.0.0.12", "");
    session.attach_connection(ConnectionId(1));
    session.start_member_session(User::member(5, "alice", 2));

    assert_eq!(session.tick().len(), 1);
    let events = session.tick();
    assert!(matches!(
        events.as_slice(),
        [SessionEvent::Updated { .. }, SessionEvent::TimedOut { user, .. }]
            if user.username == "alice"
    ));
    assert!(session.user().is_unknown());
}

#[test]
fn maintenance_round_trip() {
    let mut session = Session::new(4, "10.0.0.14", "");
    session.attach_connection(ConnectionId(3));
    session.start_administrator_session();
    assert_eq!(session.state(), SessionState::Maintenance);
    assert!(session.user().is_administrator());

    session.reset_session();
    assert_eq!(session.state(), SessionState::Ready);
    assert!(session.user().is_unknown());
}
