//! Relay transports: a WebSocket client and an in-process relay.

mod client;
mod connection;
mod memory;
mod types;

pub use client::{WsConnector, WsSignalingConfig};
pub use memory::MemoryRelay;
pub use types::{SignalingChannel, SignalingConnector, SignalingLink};
