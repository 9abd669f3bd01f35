use std::path::PathBuf;

use common::ErrorLocation;
use thiserror::Error;

/// Failures loading, validating or saving `bridge.toml`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read bridge.toml at {path}: {source} {location}")]
    ReadError {
        location: ErrorLocation,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed bridge.toml at {path}: {reason} {location}")]
    ParseError {
        location: ErrorLocation,
        path: PathBuf,
        reason: String,
    },

    #[error("Cannot write bridge.toml at {path}: {source} {location}")]
    WriteError {
        location: ErrorLocation,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No platform config directory to hold bridge.toml {location}")]
    DirectoryNotFound { location: ErrorLocation },

    #[error("Cannot encode bridge config as TOML: {reason} {location}")]
    SerializeError {
        location: ErrorLocation,
        reason: String,
    },

    #[error("Rejected bridge config value: {reason} {location}")]
    ValidationError {
        location: ErrorLocation,
        reason: String,
    },
}
