//! Session protocol: JSON envelopes exchanged with terminals and monitor
//! consoles over a WebSocket.
//!
//! Inbound frames are `[role, messageType, payload]` arrays; the role is
//! latched by the server on the first frame of a connection.  Outbound
//! frames are `[messageType, payload]` arrays.

mod envelope;
mod message;
mod request;

pub use envelope::{decode_envelope, Envelope, ProtocolError, Role};
pub use message::{LoginField, ServerMessage, SessionSnapshot, TerminalCredential};
pub use request::{MonitorRequest, RequestError, TerminalRequest};
