use std::fmt::{Display, Formatter, Result as FormatResult};

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

/// JSON-RPC version string accepted on inbound envelopes.
pub const JSONRPC_VERSION: &str = "2.0";

pub mod error_codes {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;
    /// A command other than the ready handshake arrived before the handshake.
    pub const BRIDGE_NOT_READY: i64 = -32002;
}

/// Request correlation id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RpcId {
    Number(Number),
    String(String),
    Null,
}

impl RpcId {
    /// Returns `None` when the value is not a legal id (object, array or bool).
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(RpcId::Null),
            Value::Number(number) => Some(RpcId::Number(number.clone())),
            Value::String(string) => Some(RpcId::String(string.clone())),
            _ => None,
        }
    }
}

impl Display for RpcId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FormatResult {
        match self {
            RpcId::Number(number) => write!(formatter, "{number}"),
            RpcId::String(string) => formatter.write_str(string),
            RpcId::Null => formatter.write_str("null"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcErrorObject {
    pub code: i64,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RpcOutcome {
    #[serde(rename = "result")]
    Result(Value),
    #[serde(rename = "error")]
    Error(RpcErrorObject),
}

/// Reply to an inbound envelope that carried an `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcResponse {
    pub jsonrpc: String,
    pub id: RpcId,
    #[serde(flatten)]
    pub outcome: RpcOutcome,
}

impl RpcResponse {
    pub fn success(id: RpcId, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            outcome: RpcOutcome::Result(result),
        }
    }

    pub fn failure(id: RpcId, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            outcome: RpcOutcome::Error(RpcErrorObject {
                code,
                message: message.into(),
            }),
        }
    }

    pub fn error_code(&self) -> Option<i64> {
        match &self.outcome {
            RpcOutcome::Error(error) => Some(error.code),
            RpcOutcome::Result(_) => None,
        }
    }

    pub fn result(&self) -> Option<&Value> {
        match &self.outcome {
            RpcOutcome::Result(value) => Some(value),
            RpcOutcome::Error(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AckStatus {
    Ok,
    Rejected,
}

/// Acknowledgement for an envelope carrying a command id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandAck {
    pub command_id: String,
    pub method: String,
    pub status: AckStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canonical_id: Option<String>,
}

impl CommandAck {
    pub fn ok(command_id: String, method: String, canonical_id: Option<String>) -> Self {
        Self {
            command_id,
            method,
            status: AckStatus::Ok,
            reason: None,
            canonical_id,
        }
    }

    pub fn rejected(
        command_id: String,
        method: String,
        reason: String,
        canonical_id: Option<String>,
    ) -> Self {
        Self {
            command_id,
            method,
            status: AckStatus::Rejected,
            reason: Some(reason),
            canonical_id,
        }
    }
}

/// Outbound wrapper that marks a frame as an ack: `{"__ack": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AckFrame {
    #[serde(rename = "__ack")]
    pub ack: CommandAck,
}
