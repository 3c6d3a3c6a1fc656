//! Source RCON protocol client
//!
//! Framing lives in `packet`, the session logic (auth handshake, command
//! dispatch with fragmentation sentinel, close) in `client`.

pub mod client;
pub mod packet;

pub use client::{RconClient, SessionState};
pub use packet::{Origin, Packet, PacketType};
