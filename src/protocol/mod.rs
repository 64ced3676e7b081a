//! Protocol module - Defines the messages exchanged between detectors and the controller
//!
//! Requests follow the `{action, ...params}` shape; responses are plain
//! objects or absent. On the TCP transport each message is framed as:
//! - 4 bytes magic
//! - 1 byte message type
//! - 4 bytes payload length (big-endian)
//! - 4 bytes sequence number (big-endian)
//! - JSON payload

mod codec;
mod message;

pub use codec::*;
pub use message::*;

/// Protocol version for compatibility checking
pub const PROTOCOL_VERSION: u32 = 1;

/// Default port for the controller service
pub const DEFAULT_PORT: u16 = 24870;

/// Magic bytes for protocol identification
pub const MAGIC_BYTES: [u8; 4] = [0x45, 0x44, 0x47, 0x45]; // "EDGE"
