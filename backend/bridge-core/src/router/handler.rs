use crate::error::handler::HandlerError;

use std::future::Future;
use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Parameter type for handlers that take no parameters.
///
/// Decodes from `{}` and from an absent `params` member.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoParams {}

pub(crate) type BoxedHandler =
    Arc<dyn Fn(Option<Value>) -> BoxFuture<'static, Result<Value, HandlerError>> + Send + Sync>;

/// Erase a typed handler into the router's uniform shape.
pub(crate) fn boxed<P, R, F, Fut>(handler: F) -> BoxedHandler
where
    P: DeserializeOwned + Send + 'static,
    R: Serialize + Send + 'static,
    F: Fn(P) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, HandlerError>> + Send + 'static,
{
    let handler = Arc::new(handler);
    Arc::new(move |params: Option<Value>| {
        let handler = Arc::clone(&handler);
        async move {
            let params: P = decode_params(params)?;
            let result = handler(params).await?;
            serde_json::to_value(result)
                .map_err(|e| HandlerError::failed(format!("Failed to encode result: {e}")))
        }
        .boxed()
    })
}

/// Absent params decode from an empty object; explicit `null` is rejected.
pub(crate) fn decode_params<P: DeserializeOwned>(params: Option<Value>) -> Result<P, HandlerError> {
    let value = match params {
        None => Value::Object(Map::new()),
        Some(Value::Null) => {
            return Err(HandlerError::invalid_params("params must not be null"));
        }
        Some(value) => value,
    };

    serde_json::from_value(value).map_err(|e| HandlerError::invalid_params(e.to_string()))
}
