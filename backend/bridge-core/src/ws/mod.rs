//! WebSocket transport for the content surface.
//!
//! The surface connects to a localhost WebSocket; each connection is one
//! bridge session with its own [`BridgeController`](crate::controller::BridgeController).
//!
//! # Protocol
//!
//! - Text frames inbound are command envelopes
//! - Text frames outbound are push envelopes, acks and responses
//!
//! # Security
//!
//! - Binds to `127.0.0.1` only
//! - Non-loopback peers are dropped before the WebSocket upgrade

mod handle;
mod server;
mod transport;

pub use handle::BridgeServerHandle;
pub use server::start_bridge_server;
pub use transport::WsTransport;
