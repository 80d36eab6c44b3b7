//! Per-terminal session state for the shiftnet billing server.
//!
//! A [`Session`] is a pure state container: it owns the occupant, the
//! active voucher and the voucher backlog of one terminal, and exposes
//! transitions plus a per-minute [`Session::tick`].  Transitions never
//! fail; callers check preconditions first.  Anything the caller must
//! react to comes back as a list of [`SessionEvent`]s, in order.

pub mod event;
pub mod session;

pub use event::SessionEvent;
pub use session::{ConnectionId, Session, SessionState};
