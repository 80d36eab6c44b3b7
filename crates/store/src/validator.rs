use chrono::{DateTime, Utc};

use sn_domain::{TerminalId, Voucher};

use crate::store::BillingStore;

/// Why a voucher code cannot be redeemed.  The `Display` text is shown to
/// the person at the terminal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VoucherRejection {
    #[error("Voucher code not found.")]
    NotFound,
    #[error("Voucher expired on {}.", .0.format("%A, %d %B %Y %H:%M:%S"))]
    Expired(DateTime<Utc>),
    #[error("A used voucher cannot be redeemed again.")]
    AlreadyUsed,
    #[error("Voucher is in use on client {0}.")]
    InUse(TerminalId),
    #[error("No time left on this voucher.")]
    Depleted,
    /// The store could not be read.  The detail is for the log only.
    #[error("Server error, please contact the operator.")]
    StoreFailure(String),
}

/// Check that `code` can be redeemed right now.
///
/// Checks run in a fixed order and the first failure wins: existence,
/// expiry, prior use (only when `require_unused`), binding to another
/// terminal, remaining time.
pub fn validate<S>(
    store: &S,
    code: &str,
    require_unused: bool,
    now: DateTime<Utc>,
) -> Result<Voucher, VoucherRejection>
where
    S: BillingStore + ?Sized,
{
    let record = store
        .find_voucher_by_code(code)
        .map_err(|e| VoucherRejection::StoreFailure(e.to_string()))?
        .ok_or(VoucherRejection::NotFound)?;

    if record.expires_at < now {
        return Err(VoucherRejection::Expired(record.expires_at));
    }
    if require_unused && record.is_used() {
        return Err(VoucherRejection::AlreadyUsed);
    }
    if let Some(terminal) = record.active_terminal {
        return Err(VoucherRejection::InUse(terminal));
    }
    if record.remaining_minutes <= 0 {
        return Err(VoucherRejection::Depleted);
    }

    Ok(Voucher::new(record.code, record.remaining_minutes, record.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::JsonStore;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 9, 12, 0, 0).unwrap()
    }

    #[test]
    fn valid_voucher_carries_store_id() {
        let store = JsonStore::in_memory();
        let rec = store.insert_voucher("GOOD01", 45, now() + Duration::hours(1)).unwrap();

        let voucher = validate(&store, "GOOD01", true, now()).unwrap();
        assert_eq!(voucher, Voucher::new("GOOD01", 45, rec.id));
    }

    #[test]
    fn missing_code() {
        let store = JsonStore::in_memory();
        assert_eq!(
            validate(&store, "NOPE00", false, now()),
            Err(VoucherRejection::NotFound)
        );
    }

    #[test]
    fn expired_message_names_the_timestamp() {
        let expired = Utc.with_ymd_and_hms(2024, 3, 8, 18, 30, 0).unwrap();
        let msg = VoucherRejection::Expired(expired).to_string();
        assert_eq!(msg, "Voucher expired on Friday, 08 March 2024 18:30:00.");
    }

    #[test]
    fn expiry_equal_to_now_is_still_valid() {
        let store = JsonStore::in_memory();
        store.insert_voucher("EDGE01", 5, now()).unwrap();
        assert!(validate(&store, "EDGE01", false, now()).is_ok());
    }

    #[test]
    fn used_only_matters_when_required() {
        let store = JsonStore::in_memory();
        store.insert_voucher("USED01", 30, now() + Duration::days(1)).unwrap();
        store.bind_voucher_to_terminal("USED01", 2, "Guest").unwrap();
        store.release_voucher_binding(2).unwrap();

        assert_eq!(
            validate(&store, "USED01", true, now()),
            Err(VoucherRejection::AlreadyUsed)
        );
        assert!(validate(&store, "USED01", false, now()).is_ok());
    }

    #[test]
    fn in_use_names_the_terminal() {
        let store = JsonStore::in_memory();
        store.insert_voucher("BUSY01", 30, now() + Duration::days(1)).unwrap();
        store.bind_voucher_to_terminal("BUSY01", 6, "Guest").unwrap();

        let err = validate(&store, "BUSY01", false, now()).unwrap_err();
        assert_eq!(err, VoucherRejection::InUse(6));
        assert_eq!(err.to_string(), "Voucher is in use on client 6.");
    }

    #[test]
    fn depleted() {
        let store = JsonStore::in_memory();
        store.insert_voucher("ZERO01", 0, now() + Duration::days(1)).unwrap();
        assert_eq!(
            validate(&store, "ZERO01", false, now()),
            Err(VoucherRejection::Depleted)
        );
    }
}
