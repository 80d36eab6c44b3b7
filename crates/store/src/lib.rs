//! Persistent billing store for the shiftnet server.
//!
//! The server only ever talks to a [`BillingStore`].  [`JsonStore`] is the
//! shipped implementation: a single JSON document kept in memory and
//! rewritten on every committed change.

pub mod json;
pub mod record;
pub mod store;
pub mod validator;

pub use json::{lock_path, JsonStore};
pub use record::{MemberRecord, StartupReport, TerminalRecord, VoucherRecord};
pub use store::{transaction, BillingStore};
pub use validator::{validate, VoucherRejection};
