use common::ErrorLocation;

use bridge_core::error::config::ConfigError;
use bridge_core::error::server::ServerError;

use std::panic::Location;

use serde::Serialize;
use thiserror::Error;

/// Errors raised while bringing the bridge host up.
///
/// Serializable so a supervising process can report them verbatim.
#[derive(Debug, Error, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum HostError {
    /// Error from the host itself (logging, directories, signals)
    #[error("Host Error: {message} {location}")]
    Host {
        message: String,
        location: ErrorLocation,
    },

    /// Bridge configuration could not be loaded
    #[error("Config Error: {message} {location}")]
    Config {
        message: String,
        location: ErrorLocation,
    },

    /// The bridge server failed to start
    #[error("Server Error: {message} {location}")]
    Server {
        message: String,
        location: ErrorLocation,
    },
}

impl From<ConfigError> for HostError {
    #[track_caller]
    fn from(error: ConfigError) -> Self {
        HostError::Config {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<ServerError> for HostError {
    #[track_caller]
    fn from(error: ServerError) -> Self {
        HostError::Server {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}
