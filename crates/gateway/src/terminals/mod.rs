pub mod event_loop;
mod monitor;
pub mod registry;
pub mod router;
mod terminal;
pub mod ticker;
pub mod ws;


pub use event_loop::LoopEvent;
pub use router::SessionRouter;
pub use ticker::{Ticker, TokioTicker};
