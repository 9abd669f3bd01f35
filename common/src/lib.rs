//! Wire-level data model shared by the bridge crates.
//!
//! This crate contains the pure data structures exchanged between the native
//! process and the content surface. There is no I/O and no async here; the
//! types only know how to (de)serialize themselves.
//!
//! ## Architecture
//!
//! - **common** (this crate): wire types and error location tracking
//! - **bridge-core**: push pipeline, command router, session controller
//! - **bridge-host**: binary wiring config, logging and the WebSocket server

pub mod error;
pub mod wire;

#[cfg(test)]
mod tests;

pub use error::error_location::ErrorLocation;
pub use error::wire_error::WireError;
