pub mod config;
pub mod provision;

use clap::{Parser, Subcommand};

/// shiftnet: billing server for pay-per-use terminals.
#[derive(Debug, Parser)]
#[command(name = "shiftnet-server", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the billing server (default when no subcommand is given).
    Serve,
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Voucher administration.
    #[command(subcommand)]
    Voucher(VoucherCommand),
    /// Terminal provisioning.
    #[command(subcommand)]
    Terminal(TerminalCommand),
    /// Print version information.
    Version,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Parse the config file and report any errors.
    Validate,
    /// Dump the resolved configuration (with defaults) as TOML.
    Show,
}

#[derive(Debug, Subcommand)]
pub enum VoucherCommand {
    /// Generate new voucher codes and add them to the store.
    Issue {
        /// Minutes of terminal time each voucher grants.
        #[arg(long)]
        minutes: i64,
        /// Days until the vouchers expire.
        #[arg(long, default_value_t = 30)]
        valid_days: i64,
        /// Number of vouchers to issue.
        #[arg(long, default_value_t = 1)]
        count: usize,
    },
}

#[derive(Debug, Subcommand)]
pub enum TerminalCommand {
    /// Add a terminal, or update the one with the same id.
    Add {
        /// Terminal number shown to operators.
        #[arg(long)]
        id: u32,
        /// IP address the terminal connects from.
        #[arg(long)]
        host: String,
        /// MAC address, used for wake-on-LAN by external tooling.
        #[arg(long, default_value = "")]
        mac: String,
    },
}

// ── Config loading helper ─────────────────────────────────────────────

/// Load the configuration from the path specified by `SN_CONFIG` (or
/// `config.toml` by default).  Returns the parsed [`Config`] and the
/// path that was used.
///
/// [`Config`]: sn_domain::config::Config
pub fn load_config() -> anyhow::Result<(sn_domain::config::Config, String)> {
    let config_path = std::env::var("SN_CONFIG").unwrap_or_else(|_| "config.toml".into());

    let config = if std::path::Path::new(&config_path).exists() {
        let raw = std::fs::read_to_string(&config_path)
            .map_err(|e| anyhow::anyhow!("reading {config_path}: {e}"))?;
        toml::from_str(&raw).map_err(|e| anyhow::anyhow!("parsing {config_path}: {e}"))?
    } else {
        sn_domain::config::Config::default()
    };

    Ok((config, config_path))
}
