//! Shared types for the shiftnet billing server.
//!
//! Everything here is plain data: the occupant of a terminal ([`user::User`]),
//! a block of purchasable time ([`voucher::Voucher`]), the server
//! configuration, the shared error type and structured trace events.

pub mod config;
pub mod error;
pub mod trace;
pub mod user;
pub mod voucher;

/// Identifier of a provisioned terminal (stable for the process lifetime).
pub type TerminalId = u32;

/// Identifier of a persisted member account.
pub type MemberId = u64;

pub use user::{User, UserGroup};
pub use voucher::Voucher;
