use chrono::{Datelike, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// A block of purchasable time identified by a unique code.
///
/// `duration_minutes` counts down while the voucher is active; any value
/// `<= 0` means the voucher is exhausted and must be replaced or the
/// session ended.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voucher {
    pub code: String,
    pub duration_minutes: i64,
    /// Reference to the persisted voucher record, `0` if none.
    #[serde(default)]
    pub store_id: u64,
}

impl Voucher {
    pub fn new(code: impl Into<String>, duration_minutes: i64, store_id: u64) -> Self {
        Self {
            code: code.into(),
            duration_minutes,
            store_id,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    pub fn is_exhausted(&self) -> bool {
        self.duration_minutes <= 0
    }

    /// Remaining time rendered as `HH:MM`.
    pub fn duration_label(&self) -> String {
        let minutes = self.duration_minutes.max(0);
        format!("{:02}:{:02}", minutes / 60, minutes % 60)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Code generation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

const DAY_SYMBOLS: &[u8; 31] = b"6Y2ENJ3T9Z8QBUDGX5HWKCMPA7FVL4R";
const MONTH_SYMBOLS: [&[u8; 12]; 3] = [b"HBJGMDAFKCEL", b"RQNSPVYXTZUW", b"I183O4927650"];
const BASE36_SCRAMBLED: &[u8; 36] = b"nofpid60e2v38u9b1zchj5klm7r4syqagwtx";

/// Length of every generated voucher code.
pub const CODE_LEN: usize = 6;

/// Generate a voucher code for the instant `at`.
///
/// Layout: one symbol for the day of month, one for the month (drawn
/// from one of three alphabets selected by `alphabet`), then the last
/// four base-36 digits of the timestamp in deciseconds, scrambled through
/// a fixed substitution table.  Two codes generated within the same
/// decisecond on the same alphabet collide; callers issuing batches
/// advance `at` between codes.
pub fn generate_code(at: NaiveDateTime, alphabet: usize) -> String {
    let mut code = String::with_capacity(CODE_LEN);
    code.push(DAY_SYMBOLS[(at.day0() as usize) % DAY_SYMBOLS.len()] as char);
    code.push(MONTH_SYMBOLS[alphabet % MONTH_SYMBOLS.len()][at.month0() as usize] as char);

    let deciseconds = at.and_utc().timestamp_millis().max(0) as u64 / 100;
    let mut digits = [0u8; 4];
    let mut rest = deciseconds;
    for slot in digits.iter_mut().rev() {
        *slot = (rest % 36) as u8;
        rest /= 36;
    }
    for digit in digits {
        code.push(BASE36_SCRAMBLED[digit as usize] as char);
    }

    code.to_ascii_uppercase()
}

/// Pick one of the month alphabets using fresh randomness.
pub fn random_alphabet() -> usize {
    uuid::Uuid::new_v4().as_bytes()[0] as usize % MONTH_SYMBOLS.len()
}
