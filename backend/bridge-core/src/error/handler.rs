use common::ErrorLocation;
use common::wire::error_codes;

use thiserror::Error as ThisError;

/// Failure returned by a command handler.
#[derive(Debug, Clone, ThisError)]
pub enum HandlerError {
    /// The caller sent parameters the handler cannot use.
    #[error("Invalid Params Error: {message} {location}")]
    InvalidParams {
        message: String,
        location: ErrorLocation,
    },

    /// The handler itself failed.
    #[error("Handler Error: {message} {location}")]
    Failed {
        message: String,
        location: ErrorLocation,
    },
}

impl HandlerError {
    #[track_caller]
    pub fn invalid_params(message: impl Into<String>) -> Self {
        HandlerError::InvalidParams {
            message: message.into(),
            location: ErrorLocation::caller(),
        }
    }

    #[track_caller]
    pub fn failed(message: impl Into<String>) -> Self {
        HandlerError::Failed {
            message: message.into(),
            location: ErrorLocation::caller(),
        }
    }

    pub fn code(&self) -> i64 {
        match self {
            HandlerError::InvalidParams { .. } => error_codes::INVALID_PARAMS,
            HandlerError::Failed { .. } => error_codes::INTERNAL_ERROR,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            HandlerError::InvalidParams { message, .. } | HandlerError::Failed { message, .. } => {
                message
            }
        }
    }

    /// Reason string carried by a rejection ack.
    pub fn reason(&self) -> String {
        match self {
            HandlerError::InvalidParams { message, .. } => format!("invalid_params: {message}"),
            HandlerError::Failed { message, .. } => format!("handler_failed: {message}"),
        }
    }
}
