//! Messages crossing the bridge.
//!
//! - [`push`]: outbound state pushes (native → surface)
//! - [`delta`]: keyed change sets carried inside entity pushes
//! - [`command`]: inbound command envelopes and their replies

pub mod command;
pub mod delta;
pub mod push;
pub mod store;

pub use command::{
    AckFrame, AckStatus, CommandAck, RpcErrorObject, RpcId, RpcResponse, error_codes,
};
pub use delta::EntityDelta;
pub use push::{PUSH_ENVELOPE_VERSION, PushEnvelope, PushLevel, PushOp};
pub use store::StoreKey;
