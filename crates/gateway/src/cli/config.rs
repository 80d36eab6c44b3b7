use anyhow::Context;

use sn_domain::config::{Config, ConfigSeverity};
use sn_store::{BillingStore, JsonStore};

/// Parse and validate the config, then look at what it points to: the
/// terminal password variable and the store file.  Prints every finding.
///
/// Returns `false` when the server would refuse to start.
pub fn validate(config: &Config, config_path: &str) -> bool {
    let issues = config.validate();

    let error_count = issues
        .iter()
        .filter(|e| e.severity == ConfigSeverity::Error)
        .count();
    let mut warning_count = issues.len() - error_count;

    for issue in &issues {
        println!("{issue}");
    }

    if std::env::var(&config.terminal.password_env).is_err() {
        warning_count += 1;
        println!(
            "[WARN] terminal.password_env: ${} is not set; terminals will unlock with an empty password",
            config.terminal.password_env
        );
    }

    let mut store_ok = true;
    if config.store.path.exists() {
        match JsonStore::snapshot(&config.store.path).and_then(|s| s.list_terminals()) {
            Ok(terminals) if terminals.is_empty() => {
                warning_count += 1;
                println!("[WARN] store.path: no terminals provisioned");
            }
            Ok(terminals) => println!("store: {} terminal(s) provisioned", terminals.len()),
            Err(e) => {
                store_ok = false;
                println!("[ERROR] store.path: {e}");
            }
        }
    } else {
        println!(
            "store: {} does not exist yet and will be created",
            config.store.path.display()
        );
    }

    if store_ok && store_in_use(&config.store.path) {
        println!(
            "store: held by a running server; `voucher issue` and `terminal add` will refuse to run"
        );
    }

    let total_errors = error_count + usize::from(!store_ok);
    if total_errors == 0 && warning_count == 0 {
        println!("Config OK ({config_path})");
    } else {
        println!("\n{total_errors} error(s), {warning_count} warning(s) in {config_path}");
    }

    total_errors == 0
}

/// Whether another process currently owns the store at `path`.
fn store_in_use(path: &std::path::Path) -> bool {
    sn_store::lock_path(path).exists() && JsonStore::open(path).is_err()
}

/// Dump the resolved config (with all defaults filled in) as TOML.
pub fn show(config: &Config) -> anyhow::Result<()> {
    let output = toml::to_string_pretty(config).context("serializing config")?;
    print!("{output}");
    Ok(())
}
