pub mod devices;
pub mod readings;
pub mod uploads;

use actix_web::web;
use log::error;
use serde_json::Value;

use crate::error::ApiError;

/// Run a synchronous store call on the blocking pool, mapping failures for the caller.
pub(crate) async fn run_blocking<F, T>(generic: &'static str, f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    web::block(f)
        .await
        .map_err(|e| {
            error!("{generic}: {e}");
            ApiError::Internal(generic)
        })?
        .map_err(|e| ApiError::from_store(e, generic))
}

/// `body[key]` when it is a JSON number; anything else counts as absent.
pub(crate) fn number(body: &Value, key: &str) -> Option<f64> {
    body.get(key).and_then(Value::as_f64)
}

/// `body[key]` when it is a JSON string.
pub(crate) fn string(body: &Value, key: &str) -> Option<String> {
    body.get(key).and_then(Value::as_str).map(str::to_owned)
}
