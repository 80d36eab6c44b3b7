//! Store opening, session-loop spawning and router construction extracted
//! from `main.rs`, so integration tests can boot the same server without
//! the CLI.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::routing::get;
use chrono::Utc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;

use sn_domain::config::{Config, ConfigSeverity};
use sn_domain::trace::TraceEvent;
use sn_store::{BillingStore, JsonStore};

use crate::state::AppState;
use crate::terminals::{event_loop, ws, SessionRouter, TokioTicker};

/// Capacity of the session loop's inbox.
const LOOP_QUEUE: usize = 1024;

/// A booted server: the state axum handlers need plus the session loop.
pub struct Runtime {
    pub state: AppState,
    pub store: Arc<JsonStore>,
    pub session_loop: JoinHandle<()>,
}

/// Log config issues and refuse to start on errors.
pub fn check_config(config: &Config) -> anyhow::Result<()> {
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    let errors = issues
        .iter()
        .filter(|i| i.severity == ConfigSeverity::Error)
        .count();
    if errors > 0 {
        anyhow::bail!("config validation failed with {errors} error(s)");
    }
    Ok(())
}

pub fn open_store(config: &Config) -> anyhow::Result<Arc<JsonStore>> {
    let store = JsonStore::open(&config.store.path)
        .with_context(|| format!("opening store {}", config.store.path.display()))?;
    Ok(Arc::new(store))
}

/// Prepare the store, build every session from the terminal roster and
/// spawn the session loop.  Must run inside a tokio runtime.
pub fn start(config: Arc<Config>, store: Arc<JsonStore>) -> anyhow::Result<Runtime> {
    let report = store
        .prepare_for_startup(Utc::now())
        .context("preparing store for startup")?;
    tracing::info!(
        members_released = report.members_released,
        vouchers_deleted = report.vouchers_deleted,
        vouchers_released = report.vouchers_released,
        "store prepared"
    );

    let terminals = store.list_terminals().context("listing terminals")?;
    if terminals.is_empty() {
        tracing::warn!("no terminals provisioned; add some with `shiftnet-server terminal add`");
    }
    TraceEvent::StorePrepared {
        terminals: terminals.len(),
    }
    .emit();

    let password = std::env::var(&config.terminal.password_env).unwrap_or_else(|_| {
        tracing::warn!(
            var = %config.terminal.password_env,
            "terminal password not set, terminals will unlock with an empty password"
        );
        String::new()
    });

    let (events_tx, events_rx) = mpsc::channel(LOOP_QUEUE);
    let ticker = TokioTicker::new(
        Duration::from_secs(config.session.tick_seconds),
        events_tx.clone(),
    );
    let router = SessionRouter::new(
        terminals,
        store.clone() as Arc<dyn BillingStore>,
        Box::new(ticker),
        config.company.clone(),
        &password,
    );
    let session_loop = tokio::spawn(event_loop::run(router, events_rx));

    Ok(Runtime {
        state: AppState::new(config, events_tx),
        store,
        session_loop,
    })
}

/// The axum application: one WebSocket route.
pub fn app(state: AppState) -> axum::Router {
    let path = state.config.server.ws_path.clone();
    axum::Router::new()
        .route(&path, get(ws::session_ws))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
