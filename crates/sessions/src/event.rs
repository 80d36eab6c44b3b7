use sn_domain::{User, Voucher};

/// Something a session transition wants the caller to persist or announce.
///
/// Payloads are snapshots taken when the event fired, so a caller still
/// sees the prior occupant after a timeout has reset the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Remaining time changed (tick or topup).
    Updated { user: User, active_voucher: Voucher },
    /// The occupant ran out of time; the session has been reset.
    TimedOut { user: User, active_voucher: Voucher },
    /// The active guest voucher hit zero.  If the backlog was non-empty its
    /// head is now active.
    VoucherExhausted { code: String },
}

impl SessionEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Updated { .. } => "updated",
            Self::TimedOut { .. } => "timed_out",
            Self::VoucherExhausted { .. } => "voucher_exhausted",
        }
    }
}
