use common::ErrorLocation;

use thiserror::Error as ThisError;

/// Failure reported by a [`PushTransport`](crate::push::PushTransport).
#[derive(Debug, Clone, ThisError)]
pub enum TransportError {
    #[error("Transport Closed Error: {message} {location}")]
    Closed {
        message: String,
        location: ErrorLocation,
    },

    #[error("Transport Send Error: {message} {location}")]
    Send {
        message: String,
        location: ErrorLocation,
    },
}

impl TransportError {
    #[track_caller]
    pub fn closed(message: impl Into<String>) -> Self {
        TransportError::Closed {
            message: message.into(),
            location: ErrorLocation::caller(),
        }
    }

    #[track_caller]
    pub fn send(message: impl Into<String>) -> Self {
        TransportError::Send {
            message: message.into(),
            location: ErrorLocation::caller(),
        }
    }
}
