//! The session entity and its state machine.
//!
//! ```text
//!            attach                start_guest / start_member
//! Offline ─────────────▶ Ready ─────────────────────────────▶ Used
//!    ▲                    │  ▲                                 │
//!    │ detach (any)       │  └──────── reset / timeout ────────┘
//!    │                    │ start_administrator
//!    │                    ▼
//!    └─────────────── Maintenance ── reset ──▶ Ready
//! ```

use std::collections::VecDeque;
use std::fmt;

use sn_domain::{TerminalId, User, Voucher};

use crate::event::SessionEvent;

/// Opaque handle of a live transport connection.
///
/// The session only remembers which connection it belongs to; the router
/// owns the connection table and is the only one that can close it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Wire name is [`SessionState::as_str`]; the monitor feed writes it as a
/// plain string.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// No transport attached.
    #[default]
    Offline,
    /// Transport attached, nobody signed in.
    Ready,
    /// A billable session is running.
    Used,
    /// An administrator occupies the terminal; not billed.
    Maintenance,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Offline => "offline",
            Self::Ready => "ready",
            Self::Used => "used",
            Self::Maintenance => "maintenance",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One provisioned terminal.  Created once from the roster and never
/// destroyed while the process runs.
#[derive(Debug, Clone)]
pub struct Session {
    id: TerminalId,
    host_address: String,
    mac_address: String,
    state: SessionState,
    connection: Option<ConnectionId>,
    user: User,
    active_voucher: Voucher,
    voucher_backlog: VecDeque<Voucher>,
    ticking: bool,
    timer_epoch: u64,
}

impl Session {
    pub fn new(id: TerminalId, host_address: impl Into<String>, mac_address: impl Into<String>) -> Self {
        Self {
            id,
            host_address: host_address.into(),
            mac_address: mac_address.into(),
            state: SessionState::Offline,
            connection: None,
            user: User::default(),
            active_voucher: Voucher::default(),
            voucher_backlog: VecDeque::new(),
            ticking: false,
            timer_epoch: 0,
        }
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn id(&self) -> TerminalId {
        self.id
    }

    pub fn host_address(&self) -> &str {
        &self.host_address
    }

    pub fn mac_address(&self) -> &str {
        &self.mac_address
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn connection(&self) -> Option<ConnectionId> {
        self.connection
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn active_voucher(&self) -> &Voucher {
        &self.active_voucher
    }

    pub fn voucher_backlog(&self) -> impl ExactSizeIterator<Item = &Voucher> {
        self.voucher_backlog.iter()
    }

    /// Whether the per-minute timer should be running.
    pub fn is_ticking(&self) -> bool {
        self.ticking
    }

    /// Bumped every time the timer starts.  A tick scheduled under an
    /// older epoch belongs to a session that has since been reset.
    pub fn timer_epoch(&self) -> u64 {
        self.timer_epoch
    }

    // ── Transport ────────────────────────────────────────────────────

    /// Offline → Ready.
    pub fn attach_connection(&mut self, connection: ConnectionId) {
        self.connection = Some(connection);
        if self.state == SessionState::Offline {
            self.state = SessionState::Ready;
        }
    }

    /// Any → Offline, dropping the occupant.
    pub fn detach_connection(&mut self) {
        self.connection = None;
        self.reset_session();
    }

    // ── Occupancy ────────────────────────────────────────────────────

    /// Ready → Used, billed against `voucher`.
    pub fn start_guest_session(&mut self, voucher: Voucher) {
        self.voucher_backlog.clear();
        self.user = User::guest(voucher.duration_minutes);
        self.active_voucher = voucher;
        self.state = SessionState::Used;
        self.start_timer();
    }

    /// Ready → Used, billed against the member's balance.
    pub fn start_member_session(&mut self, user: User) {
        self.voucher_backlog.clear();
        self.active_voucher = Voucher::default();
        self.user = user;
        self.state = SessionState::Used;
        self.start_timer();
    }

    /// Ready → Maintenance.  Not billed, so no timer.
    pub fn start_administrator_session(&mut self) {
        self.voucher_backlog.clear();
        self.active_voucher = Voucher::default();
        self.user = User::administrator();
        self.state = SessionState::Maintenance;
        self.ticking = false;
    }

    /// Add a voucher's time to the running session.
    ///
    /// Guests queue the voucher behind the active one; members only gain
    /// the minutes (the voucher itself is consumed by the store).
    pub fn topup_voucher(&mut self, voucher: Voucher) -> Vec<SessionEvent> {
        self.user.add_duration(voucher.duration_minutes);
        if self.user.is_guest() {
            self.voucher_backlog.push_back(voucher);
        }
        vec![self.updated()]
    }

    /// Any → Ready (connection attached) or Offline.  Idempotent.
    pub fn reset_session(&mut self) {
        self.ticking = false;
        self.user = User::default();
        self.active_voucher = Voucher::default();
        self.voucher_backlog.clear();
        self.state = if self.connection.is_some() {
            SessionState::Ready
        } else {
            SessionState::Offline
        };
    }

    // ── Billing ──────────────────────────────────────────────────────

    /// Bill one minute.
    ///
    /// Events, in order: `Updated` always; `TimedOut` once the occupant's
    /// time is at or below zero; `VoucherExhausted` once a guest's active voucher
    /// reaches zero, after which the backlog head (if any) becomes
    /// active.  A timeout resets the session before returning.
    pub fn tick(&mut self) -> Vec<SessionEvent> {
        if self.state != SessionState::Used || !self.ticking {
            return Vec::new();
        }

        let guest = self.user.is_guest();
        self.user.add_duration(-1);
        if guest {
            self.active_voucher.duration_minutes -= 1;
        }

        let mut events = vec![self.updated()];

        let timed_out = self.user.duration_minutes <= 0;
        if timed_out {
            events.push(SessionEvent::TimedOut {
                user: self.user.clone(),
                active_voucher: self.active_voucher.clone(),
            });
        }

        if guest && self.active_voucher.is_exhausted() {
            events.push(SessionEvent::VoucherExhausted {
                code: self.active_voucher.code.clone(),
            });
            if let Some(next) = self.voucher_backlog.pop_front() {
                self.active_voucher = next;
            }
        }

        if timed_out {
            self.reset_session();
        }

        events
    }

    fn start_timer(&mut self) {
        self.ticking = true;
        self.timer_epoch += 1;
    }

    fn updated(&self) -> SessionEvent {
        SessionEvent::Updated {
            user: self.user.clone(),
            active_voucher: self.active_voucher.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sn_domain::UserGroup;

    fn ready() -> Session {
        let mut s = Session::new(1, "10.0.0.11", "aa:bb:cc:dd:ee:01");
        s.attach_connection(ConnectionId(1));
        s
    }

    fn assert_invariants(s: &Session) {
        assert_eq!(s.state() == SessionState::Offline, s.connection().is_none());
        assert_eq!(
            s.state() == SessionState::Used,
            matches!(s.user().group, UserGroup::Member | UserGroup::Guest)
        );
        assert_eq!(
            s.state() == SessionState::Maintenance,
            s.user().group == UserGroup::Administrator
        );
        if s.voucher_backlog().len() > 0 {
            assert!(s.user().is_guest());
        }
    }

    #[test]
    fn starts_offline() {
        let s = Session::new(3, "10.0.0.13", "");
        assert_eq!(s.state(), SessionState::Offline);
        assert!(s.connection().is_none());
        assert!(!s.is_ticking());
        assert_invariants(&s);
    }

    #[test]
    fn attach_then_detach() {
        let mut s = ready();
        assert_eq!(s.state(), SessionState::Ready);
        assert_invariants(&s);

        s.start_member_session(User::member(9, "alice", 30));
        s.detach_connection();
        assert_eq!(s.state(), SessionState::Offline);
        assert!(s.user().is_unknown());
        assert!(!s.is_ticking());
        assert_invariants(&s);
    }

    #[test]
    fn guest_session_bills_the_voucher() {
        let mut s = ready();
        s.start_guest_session(Voucher::new("C", 10, 5));
        assert_eq!(s.state(), SessionState::Used);
        assert!(s.user().is_guest());
        assert_eq!(s.user().duration_minutes, 10);
        assert_eq!(s.active_voucher().code, "C");
        assert!(s.is_ticking());
        assert_invariants(&s);
    }

    #[test]
    fn member_session_has_no_voucher() {
        let mut s = ready();
        s.start_member_session(User::member(9, "alice", 30));
        assert_eq!(s.state(), SessionState::Used);
        assert!(s.active_voucher().is_empty());
        assert_invariants(&s);
    }

    #[test]
    fn administrator_session_does_not_tick() {
        let mut s = ready();
        s.start_administrator_session();
        assert_eq!(s.state(), SessionState::Maintenance);
        assert!(!s.is_ticking());
        assert!(s.tick().is_empty());
        assert_invariants(&s);
    }

    #[test]
    fn member_topup_adds_minutes_only() {
        let mut s = ready();
        s.start_member_session(User::member(9, "alice", 30));
        let events = s.topup_voucher(Voucher::new("X", 60, 0));
        assert_eq!(s.user().duration_minutes, 90);
        assert_eq!(s.voucher_backlog().len(), 0);
        assert!(matches!(
            events.as_slice(),
            [SessionEvent::Updated { user, .. }] if user.duration_minutes == 90
        ));
    }

    #[test]
    fn guest_topup_queues_voucher() {
        let mut s = ready();
        s.start_guest_session(Voucher::new("C", 2, 0));
        s.topup_voucher(Voucher::new("A", 5, 0));
        assert_eq!(s.user().duration_minutes, 7);
        assert_eq!(s.voucher_backlog().len(), 1);
        assert_eq!(s.active_voucher().code, "C");
        assert_invariants(&s);
    }

    #[test]
    fn new_guest_session_clears_backlog() {
        let mut s = ready();
        s.start_guest_session(Voucher::new("C", 2, 0));
        s.topup_voucher(Voucher::new("A", 5, 0));
        s.reset_session();
        s.start_guest_session(Voucher::new("D", 3, 0));
        assert_eq!(s.voucher_backlog().len(), 0);
    }

    #[test]
    fn reset_is_idempotent() {
        let mut s = ready();
        s.start_guest_session(Voucher::new("C", 2, 0));
        s.topup_voucher(Voucher::new("A", 5, 0));

        s.reset_session();
        let once = (
            s.state(),
            s.user().clone(),
            s.active_voucher().clone(),
            s.voucher_backlog().len(),
            s.is_ticking(),
        );
        s.reset_session();
        let twice = (
            s.state(),
            s.user().clone(),
            s.active_voucher().clone(),
            s.voucher_backlog().len(),
            s.is_ticking(),
        );
        assert_eq!(once, twice);
        assert_eq!(once.0, SessionState::Ready);
    }

    #[test]
    fn tick_decrements_member_without_touching_voucher() {
        let mut s = ready();
        s.start_member_session(User::member(9, "alice", 3));
        let events = s.tick();
        assert_eq!(events.len(), 1);
        assert_eq!(s.user().duration_minutes, 2);
        assert!(s.active_voucher().is_empty());
    }

    #[test]
    fn member_without_minutes_times_out_on_first_tick() {
        let mut s = ready();
        s.start_member_session(User::member(9, "alice", 0));
        let events = s.tick();
        assert_eq!(events.len(), 2);
        match &events[1] {
            SessionEvent::TimedOut { user, .. } => assert_eq!(user.duration_minutes, -1),
            other => panic!("expected a timeout, got {other:?}"),
        }
        assert_eq!(s.state(), SessionState::Ready);
    }

    #[test]
    fn tick_on_idle_session_is_a_no_op() {
        let mut s = ready();
        assert!(s.tick().is_empty());
        assert_eq!(s.state(), SessionState::Ready);
    }

    #[test]
    fn state_names_are_lowercase() {
        let names: Vec<String> = [
            SessionState::Offline,
            SessionState::Ready,
            SessionState::Used,
            SessionState::Maintenance,
        ]
        .iter()
        .map(|state| state.to_string())
        .collect();
        assert_eq!(names, ["offline", "ready", "used", "maintenance"]);
    }

    #[test]
    fn timer_epoch_advances_per_start() {
        let mut s = ready();
        s.start_member_session(User::member(9, "alice", 3));
        let first = s.timer_epoch();
        s.reset_session();
        s.start_guest_session(Voucher::new("C", 2, 0));
        assert_eq!(s.timer_epoch(), first + 1);
    }
}
