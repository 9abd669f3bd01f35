use crate::wire::StoreKey;

use std::fmt::{Display, Formatter, Result as FormatResult};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

/// Version stamped into every push envelope as `__v`.
pub const PUSH_ENVELOPE_VERSION: u8 = 1;

const WARM_DEBOUNCE: Duration = Duration::from_millis(12);
const COLD_DEBOUNCE: Duration = Duration::from_millis(32);

/// Debounce class of a slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PushLevel {
    /// Every observed mutation is pushed.
    Hot,
    Warm,
    Cold,
}

impl PushLevel {
    /// Trailing-edge debounce applied before sampling.
    pub const fn debounce(&self) -> Duration {
        match self {
            PushLevel::Hot => Duration::ZERO,
            PushLevel::Warm => WARM_DEBOUNCE,
            PushLevel::Cold => COLD_DEBOUNCE,
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            PushLevel::Hot => "hot",
            PushLevel::Warm => "warm",
            PushLevel::Cold => "cold",
        }
    }
}

impl Display for PushLevel {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FormatResult {
        formatter.write_str(self.as_str())
    }
}

/// How the receiver applies a payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PushOp {
    #[default]
    Merge,
    Replace,
}

impl PushOp {
    pub const fn as_str(&self) -> &'static str {
        match self {
            PushOp::Merge => "merge",
            PushOp::Replace => "replace",
        }
    }
}

impl Display for PushOp {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FormatResult {
        formatter.write_str(self.as_str())
    }
}

/// Outbound push envelope.
///
/// The payload is already-serialized JSON and is embedded verbatim.
#[derive(Debug, Serialize)]
pub struct PushEnvelope<'a> {
    #[serde(rename = "__v")]
    pub version: u8,
    #[serde(rename = "__revision")]
    pub revision: u64,
    #[serde(rename = "__epoch")]
    pub epoch: u64,
    #[serde(rename = "__pushId")]
    pub push_id: &'a str,
    pub store: StoreKey,
    pub op: PushOp,
    pub level: PushLevel,
    pub payload: &'a RawValue,
}

impl PushEnvelope<'_> {
    pub fn to_bytes(&self) -> Result<Vec<u8>, crate::WireError> {
        Ok(serde_json::to_vec(self)?)
    }
}
