use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use sn_domain::{MemberId, TerminalId};

/// A registered member account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberRecord {
    pub id: MemberId,
    pub username: String,
    pub password: String,
    #[serde(default = "d_true")]
    pub active: bool,
    #[serde(default)]
    pub remaining_minutes: i64,
    /// Terminal the member is currently signed in on.
    #[serde(default)]
    pub active_terminal: Option<TerminalId>,
}

/// A prepaid voucher that has not been fully spent yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoucherRecord {
    pub id: u64,
    pub code: String,
    pub remaining_minutes: i64,
    pub expires_at: DateTime<Utc>,
    /// Terminal the voucher is currently bound to.
    #[serde(default)]
    pub active_terminal: Option<TerminalId>,
    /// Set the first time the voucher is redeemed.  A voucher with a last
    /// user counts as used and cannot be topped up onto a member.
    #[serde(default)]
    pub last_active_username: Option<String>,
}

impl VoucherRecord {
    pub fn is_used(&self) -> bool {
        self.last_active_username
            .as_deref()
            .is_some_and(|name| !name.is_empty())
    }
}

/// A provisioned terminal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalRecord {
    pub id: TerminalId,
    pub host_address: String,
    #[serde(default)]
    pub mac_address: String,
}

/// What [`crate::BillingStore::prepare_for_startup`] cleaned up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StartupReport {
    pub members_released: usize,
    pub vouchers_deleted: usize,
    pub vouchers_released: usize,
}

fn d_true() -> bool {
    true
}
