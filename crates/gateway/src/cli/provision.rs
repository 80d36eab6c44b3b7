//! `voucher issue` and `terminal add`.

use std::time::Duration as StdDuration;

use anyhow::Context;
use chrono::{Duration, Local, Utc};

use sn_domain::voucher::{generate_code, random_alphabet};
use sn_domain::{TerminalId, Voucher};
use sn_store::{BillingStore, JsonStore, TerminalRecord, VoucherRecord};

/// Attempts per voucher before giving up on finding a free code.
const MAX_CODE_ATTEMPTS: usize = 50;

/// Issue `count` vouchers worth `minutes` each, valid for `valid_days`.
///
/// Codes encode the current time to the decisecond, so consecutive codes
/// in a batch wait out the clock when they collide.
pub fn issue_vouchers(
    store: &JsonStore,
    minutes: i64,
    valid_days: i64,
    count: usize,
) -> anyhow::Result<Vec<VoucherRecord>> {
    if minutes <= 0 {
        anyhow::bail!("--minutes must be greater than 0");
    }
    if valid_days <= 0 {
        anyhow::bail!("--valid-days must be greater than 0");
    }

    let expires_at = Utc::now() + Duration::days(valid_days);
    let mut issued = Vec::with_capacity(count);

    for _ in 0..count {
        let mut attempt = 0;
        let record = loop {
            attempt += 1;
            let code = generate_code(Local::now().naive_local(), random_alphabet());
            if store.find_voucher_by_code(&code)?.is_none() {
                break store
                    .insert_voucher(&code, minutes, expires_at)
                    .with_context(|| format!("inserting voucher {code}"))?;
            }
            if attempt >= MAX_CODE_ATTEMPTS {
                anyhow::bail!("could not find a free voucher code after {attempt} attempts");
            }
            std::thread::sleep(StdDuration::from_millis(100));
        };
        issued.push(record);
    }

    Ok(issued)
}

pub fn print_vouchers(vouchers: &[VoucherRecord]) {
    println!("{:<8} {:>8}  expires", "code", "time");
    for v in vouchers {
        let label = Voucher::new(v.code.clone(), v.remaining_minutes, v.id).duration_label();
        println!(
            "{:<8} {:>8}  {}",
            v.code,
            label,
            v.expires_at.with_timezone(&Local).format("%Y-%m-%d %H:%M")
        );
    }
}

pub fn add_terminal(store: &JsonStore, id: TerminalId, host: &str, mac: &str) -> anyhow::Result<()> {
    let host: std::net::IpAddr = host
        .trim()
        .parse()
        .with_context(|| format!("--host {host} is not an IP address"))?;
    let host = host.to_canonical();
    store
        .insert_terminal(TerminalRecord {
            id,
            host_address: host.to_string(),
            mac_address: mac.trim().to_owned(),
        })
        .context("adding terminal")?;
    println!("terminal {id} -> {host}");
    Ok(())
}
