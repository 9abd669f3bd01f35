//! Inbound command router (content surface → native).
//!
//! Accepts JSON-RPC style envelopes, deduplicates them by command id and
//! dispatches each to the handler registered for its method. Every outcome
//! is returned as data ([`DispatchOutcome`]); nothing is thrown back to the
//! caller of [`CommandRouter::dispatch`].
//!
//! # Processing order
//!
//! 1. Parse JSON (`-32700`)
//! 2. Reject batches and non-objects (`-32600`)
//! 3. Read the command id, then validate `id`, `jsonrpc` and `method` (`-32600`)
//! 4. Pre-handshake gate (`-32002`)
//! 5. Command-id dedup (silent)
//! 6. Method lookup (`-32601`)
//! 7. Params decode and handler invocation (`-32602` / `-32603`)

mod handler;
mod window;

pub use handler::NoParams;
pub use window::CommandWindow;

use crate::config::RouterConfig;
use crate::error::envelope::EnvelopeError;
use crate::error::handler::HandlerError;
use crate::router::handler::BoxedHandler;

use common::ErrorLocation;
use common::wire::command::JSONRPC_VERSION;
use common::wire::{CommandAck, RpcId, RpcResponse, error_codes};

use std::collections::HashMap;
use std::future::Future;
use std::panic::Location;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, info, warn};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tokio::sync::Mutex;

const COMMAND_ID_KEY: &str = "__commandId";
const COMMAND_ID_ALIAS: &str = "commandId";
const NOT_READY_REASON: &str = "bridge_not_ready";

pub type ErrorCallback = Arc<dyn Fn(&EnvelopeError) + Send + Sync>;

/// Everything produced by dispatching one inbound envelope.
#[derive(Debug, Default)]
pub struct DispatchOutcome {
    pub method: Option<String>,
    pub ack: Option<CommandAck>,
    pub response: Option<RpcResponse>,
    /// Envelope-level failure (also delivered to the error callback).
    pub error: Option<EnvelopeError>,
    /// Handler-level failure.
    pub failure: Option<HandlerError>,
    /// The command id had already been processed; nothing else was done.
    pub duplicate: bool,
    /// The ready handshake completed successfully.
    pub handshake: bool,
}

/// Validated envelope fields, before routing.
struct Envelope {
    id: Option<RpcId>,
    command_id: Option<String>,
    method: String,
    params: Option<Value>,
}

pub struct CommandRouter {
    handlers: HashMap<String, BoxedHandler>,
    window: Mutex<CommandWindow>,
    ready_method: String,
    gate_enabled: bool,
    gate_open: AtomicBool,
    on_error: Option<ErrorCallback>,
}

impl CommandRouter {
    pub fn new(config: &RouterConfig) -> Self {
        Self {
            handlers: HashMap::new(),
            window: Mutex::new(CommandWindow::new(config.dedup_window)),
            ready_method: config.ready_method.clone(),
            gate_enabled: true,
            gate_open: AtomicBool::new(false),
            on_error: None,
        }
    }

    /// Register the handler for `method`, replacing any earlier one.
    pub fn register<P, R, F, Fut>(&mut self, method: &str, handler: F) -> &mut Self
    where
        P: DeserializeOwned + Send + 'static,
        R: Serialize + Send + 'static,
        F: Fn(P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, HandlerError>> + Send + 'static,
    {
        if self
            .handlers
            .insert(method.to_string(), handler::boxed(handler))
            .is_some()
        {
            debug!("Replaced handler for method '{}'", method);
        }
        self
    }

    /// Disable or enable the pre-handshake gate.
    pub fn set_gate_enabled(&mut self, enabled: bool) -> &mut Self {
        self.gate_enabled = enabled;
        self
    }

    pub fn set_error_callback(&mut self, callback: ErrorCallback) -> &mut Self {
        self.on_error = Some(callback);
        self
    }

    pub fn ready_method(&self) -> &str {
        &self.ready_method
    }

    pub(crate) fn has_handler(&self, method: &str) -> bool {
        self.handlers.contains_key(method)
    }

    pub fn is_gate_open(&self) -> bool {
        !self.gate_enabled || self.gate_open.load(Ordering::SeqCst)
    }

    /// Re-arm the pre-handshake gate for a new session.
    pub fn close_gate(&self) {
        self.gate_open.store(false, Ordering::SeqCst);
    }

    pub async fn dedup_len(&self) -> usize {
        self.window.lock().await.len()
    }

    /// Process one inbound JSON string.
    pub async fn dispatch(&self, raw: &str) -> DispatchOutcome {
        let envelope = match self.parse(raw) {
            Ok(envelope) => envelope,
            Err((error, command_id)) => return self.reject(error, command_id),
        };

        let Envelope {
            id,
            command_id,
            method,
            params,
        } = envelope;
        let is_ready = method == self.ready_method;

        if !is_ready && !self.is_gate_open() {
            let error = envelope_error(
                error_codes::BRIDGE_NOT_READY,
                "Bridge not ready",
                id,
                Some(method),
            );
            return self.reject(error, command_id);
        }

        if let Some(command_id) = command_id.as_deref() {
            let mut window = self.window.lock().await;
            if !window.record(command_id) {
                debug!("Skipping duplicate command '{}' ({})", command_id, method);
                return DispatchOutcome {
                    method: Some(method),
                    duplicate: true,
                    ..DispatchOutcome::default()
                };
            }
        }

        let result = match self.handlers.get(&method) {
            Some(handler) => handler(params).await,
            None if is_ready => Ok(Value::Null),
            None => {
                let message = format!("Method not found: {method}");
                let error =
                    envelope_error(error_codes::METHOD_NOT_FOUND, message, id, Some(method));
                return self.reject(error, command_id);
            }
        };

        let canonical_id = id.as_ref().map(RpcId::to_string);
        match result {
            Ok(value) => {
                if is_ready {
                    self.gate_open.store(true, Ordering::SeqCst);
                    info!("Bridge ready handshake received");
                }

                DispatchOutcome {
                    ack: command_id
                        .map(|command_id| CommandAck::ok(command_id, method.clone(), canonical_id)),
                    response: id.map(|id| RpcResponse::success(id, value)),
                    method: Some(method),
                    handshake: is_ready,
                    ..DispatchOutcome::default()
                }
            }
            Err(failure) => {
                warn!("Command '{}' failed: {}", method, failure);
                DispatchOutcome {
                    ack: command_id.map(|command_id| {
                        CommandAck::rejected(
                            command_id,
                            method.clone(),
                            failure.reason(),
                            canonical_id,
                        )
                    }),
                    response: id
                        .map(|id| RpcResponse::failure(id, failure.code(), failure.message())),
                    method: Some(method),
                    failure: Some(failure),
                    ..DispatchOutcome::default()
                }
            }
        }
    }

    /// Steps 1-4: everything that can be decided from the envelope alone.
    ///
    /// On failure returns the error plus whatever command id had been read.
    fn parse(&self, raw: &str) -> Result<Envelope, (EnvelopeError, Option<String>)> {
        let value: Value = serde_json::from_str(raw).map_err(|e| {
            let error =
                envelope_error(error_codes::PARSE_ERROR, format!("Parse error: {e}"), None, None);
            (error, None)
        })?;

        let mut object: Map<String, Value> = match value {
            Value::Object(object) => object,
            Value::Array(_) => {
                let error = envelope_error(
                    error_codes::INVALID_REQUEST,
                    "Batch requests are not supported",
                    None,
                    None,
                );
                return Err((error, None));
            }
            _ => {
                let error = envelope_error(
                    error_codes::INVALID_REQUEST,
                    "Envelope must be a JSON object",
                    None,
                    None,
                );
                return Err((error, None));
            }
        };

        // Read first so every later rejection can still be acked.
        let command_id = match object
            .get(COMMAND_ID_KEY)
            .or_else(|| object.get(COMMAND_ID_ALIAS))
        {
            None => None,
            Some(Value::String(command_id)) => Some(command_id.clone()),
            Some(_) => {
                let id = object.get("id").and_then(RpcId::from_value);
                let error = envelope_error(
                    error_codes::INVALID_REQUEST,
                    "Command id must be a string",
                    id,
                    None,
                );
                return Err((error, None));
            }
        };

        let id = match object.get("id") {
            None => None,
            Some(raw_id) => match RpcId::from_value(raw_id) {
                Some(id) => Some(id),
                None => {
                    let error =
                        envelope_error(error_codes::INVALID_REQUEST, "Invalid id", None, None);
                    return Err((error, command_id));
                }
            },
        };

        if object.get("jsonrpc").and_then(Value::as_str) != Some(JSONRPC_VERSION) {
            let error = envelope_error(
                error_codes::INVALID_REQUEST,
                "Unsupported jsonrpc version",
                id,
                None,
            );
            return Err((error, command_id));
        }

        let Some(method) = object.get("method").and_then(Value::as_str) else {
            let error = envelope_error(error_codes::INVALID_REQUEST, "Missing method", id, None);
            return Err((error, command_id));
        };
        let method = method.to_string();

        Ok(Envelope {
            id,
            command_id,
            method,
            params: object.remove("params"),
        })
    }

    fn reject(&self, error: EnvelopeError, command_id: Option<String>) -> DispatchOutcome {
        warn!("Rejected inbound command: {}", error);
        if let Some(callback) = &self.on_error {
            callback(&error);
        }

        let reason = if error.code == error_codes::BRIDGE_NOT_READY {
            NOT_READY_REASON.to_string()
        } else {
            error.message.clone()
        };
        let canonical_id = error.id.as_ref().map(RpcId::to_string);
        let method = error.method.clone();

        DispatchOutcome {
            ack: command_id.map(|command_id| {
                CommandAck::rejected(
                    command_id,
                    method.clone().unwrap_or_default(),
                    reason,
                    canonical_id,
                )
            }),
            response: error
                .id
                .clone()
                .map(|id| RpcResponse::failure(id, error.code, error.message.clone())),
            method,
            error: Some(error),
            ..DispatchOutcome::default()
        }
    }
}

#[track_caller]
fn envelope_error(
    code: i64,
    message: impl Into<String>,
    id: Option<RpcId>,
    method: Option<String>,
) -> EnvelopeError {
    EnvelopeError {
        code,
        message: message.into(),
        id,
        method,
        location: ErrorLocation::from(Location::caller()),
    }
}
