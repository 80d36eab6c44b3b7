//! The shiftnet billing server: WebSocket transport, session router and
//! the single event loop that owns all terminal sessions.

pub mod bootstrap;
pub mod cli;
pub mod state;
pub mod terminals;
