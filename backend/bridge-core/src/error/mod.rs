pub mod config;
pub mod envelope;
pub mod handler;
pub mod push;
pub mod server;
pub mod transport;
