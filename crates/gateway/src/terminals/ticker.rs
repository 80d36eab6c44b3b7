//! Per-session billing timers.
//!
//! A timer never touches a session.  It only posts
//! [`LoopEvent::Tick`] into the event loop, tagged with the epoch it was
//! started under so the loop can drop ticks from a timer that has since
//! been replaced.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use sn_domain::TerminalId;

use super::event_loop::LoopEvent;

/// Starts and stops the once-per-minute tick of each session.
pub trait Ticker: Send {
    fn start(&mut self, terminal: TerminalId, epoch: u64);
    fn stop(&mut self, terminal: TerminalId);
}

/// Ticker backed by one tokio interval task per running session.
pub struct TokioTicker {
    period: Duration,
    events: mpsc::Sender<LoopEvent>,
    tasks: HashMap<TerminalId, JoinHandle<()>>,
}

impl TokioTicker {
    pub fn new(period: Duration, events: mpsc::Sender<LoopEvent>) -> Self {
        Self {
            period,
            events,
            tasks: HashMap::new(),
        }
    }
}

impl Ticker for TokioTicker {
    fn start(&mut self, terminal: TerminalId, epoch: u64) {
        self.stop(terminal);

        let period = self.period;
        let events = self.events.clone();
        let task = tokio::spawn(async move {
            // First tick one full period after start, not immediately.
            let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            loop {
                interval.tick().await;
                if events.send(LoopEvent::Tick { terminal, epoch }).await.is_err() {
                    break;
                }
            }
        });
        tracing::debug!(terminal, epoch, "tick timer started");
        self.tasks.insert(terminal, task);
    }

    fn stop(&mut self, terminal: TerminalId) {
        if let Some(task) = self.tasks.remove(&terminal) {
            task.abort();
            tracing::debug!(terminal, "tick timer stopped");
        }
    }
}

impl Drop for TokioTicker {
    fn drop(&mut self) {
        for (_, task) in self.tasks.drain() {
            task.abort();
        }
    }
}
