use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Server
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "d_7890")]
    pub port: u16,
    /// Terminals connect from the venue LAN, so the default binds every
    /// interface.
    #[serde(default = "d_host")]
    pub host: String,
    /// HTTP path upgraded to the session WebSocket.
    #[serde(default = "d_ws_path")]
    pub ws_path: String,
    /// Capacity of the per-connection outbound queue.  A connection whose
    /// queue is full drops frames (and logs) instead of stalling the loop.
    #[serde(default = "d_outbound_queue")]
    pub outbound_queue: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: d_7890(),
            host: d_host(),
            ws_path: d_ws_path(),
            outbound_queue: d_outbound_queue(),
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_7890() -> u16 {
    7890
}
fn d_host() -> String {
    "0.0.0.0".into()
}
fn d_ws_path() -> String {
    "/".into()
}
fn d_outbound_queue() -> usize {
    64
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
