use chrono::{DateTime, Utc};

use sn_domain::error::Result;
use sn_domain::{MemberId, TerminalId};

use crate::record::{MemberRecord, StartupReport, TerminalRecord, VoucherRecord};

/// Persistent store consumed by the session router.
///
/// Calls are synchronous.  Every write outside an open transaction is
/// durable when it returns; inside a transaction nothing is durable until
/// [`commit`](Self::commit), and [`rollback`](Self::rollback) restores the
/// state seen by [`begin_transaction`](Self::begin_transaction).
pub trait BillingStore: Send + Sync {
    fn find_member_by_username(&self, username: &str) -> Result<Option<MemberRecord>>;

    fn find_voucher_by_code(&self, code: &str) -> Result<Option<VoucherRecord>>;

    fn update_member_duration(&self, member_id: MemberId, minutes: i64) -> Result<()>;

    fn update_voucher_duration(&self, code: &str, minutes: i64) -> Result<()>;

    /// Bind a voucher to a terminal and mark it used by `username`.
    fn bind_voucher_to_terminal(&self, code: &str, terminal: TerminalId, username: &str) -> Result<()>;

    fn bind_member_to_terminal(&self, member_id: MemberId, terminal: TerminalId) -> Result<()>;

    /// Unbind every voucher bound to `terminal`.  Releasing nothing is not
    /// an error.
    fn release_voucher_binding(&self, terminal: TerminalId) -> Result<()>;

    fn release_member_binding(&self, member_id: MemberId) -> Result<()>;

    fn delete_voucher(&self, code: &str) -> Result<()>;

    fn list_terminals(&self) -> Result<Vec<TerminalRecord>>;

    fn begin_transaction(&self) -> Result<()>;

    fn commit(&self) -> Result<()>;

    fn rollback(&self) -> Result<()>;

    /// Undo whatever a previous run left behind: clear member and voucher
    /// bindings and drop spent or expired vouchers.  Runs as one
    /// transaction.
    fn prepare_for_startup(&self, now: DateTime<Utc>) -> Result<StartupReport>;
}

/// Run `f` inside a transaction, committing on success and rolling back on
/// any error.
pub fn transaction<S, T, F>(store: &S, f: F) -> Result<T>
where
    S: BillingStore + ?Sized,
    F: FnOnce(&S) -> Result<T>,
{
    store.begin_transaction()?;
    match f(store).and_then(|value| store.commit().map(|()| value)) {
        Ok(value) => Ok(value),
        Err(e) => {
            if let Err(rollback_err) = store.rollback() {
                tracing::error!(error = %rollback_err, "rollback failed");
            }
            Err(e)
        }
    }
}
