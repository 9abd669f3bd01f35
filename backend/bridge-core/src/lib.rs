pub mod config;
pub mod controller;
pub mod error;
pub mod push;
pub mod router;
pub mod ws;

#[cfg(test)]
mod tests;

pub use config::BridgeConfig;
pub use controller::{BridgeController, BridgeControllerBuilder};
pub use error::envelope::EnvelopeError;
pub use error::handler::HandlerError;
pub use router::{CommandRouter, DispatchOutcome, NoParams};
