use common::ErrorLocation;

use std::panic::Location;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum PushError {
    #[error("Serialize Error: {message} {location}")]
    Serialize {
        message: String,
        location: ErrorLocation,
    },

    #[error("Ledger Error: {message} {location}")]
    Ledger {
        message: String,
        location: ErrorLocation,
    },
}

impl From<serde_json::Error> for PushError {
    #[track_caller]
    fn from(error: serde_json::Error) -> Self {
        PushError::Serialize {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}
