use common::ErrorLocation;
use common::wire::RpcId;

use thiserror::Error as ThisError;

/// Envelope-level failure: the command never reached a handler.
#[derive(Debug, Clone, ThisError)]
#[error("Envelope Error ({code}): {message} {location}")]
pub struct EnvelopeError {
    pub code: i64,
    pub message: String,
    pub id: Option<RpcId>,
    pub method: Option<String>,
    pub location: ErrorLocation,
}
