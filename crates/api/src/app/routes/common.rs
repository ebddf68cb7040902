//! Shared handler helpers.

use std::str::FromStr;

use axum::http::StatusCode;
use axum::response::Response;
use serde::Serialize;

use gasflow_core::DomainError;
use gasflow_engine::{IdempotencyKey, OperationFingerprint};

use crate::app::errors;
use crate::context::IdempotencyContext;

/// Mutating routes refuse to run without an idempotency key: a retried
/// request without one could double-commit.
pub fn require_key(idem: &IdempotencyContext) -> Result<IdempotencyKey, Response> {
    idem.key().cloned().ok_or_else(|| {
        errors::json_error(
            StatusCode::BAD_REQUEST,
            "missing_idempotency_key",
            "mutating requests require an idempotency-key header",
        )
    })
}

/// Fingerprint from the operation name and the request body, so a reused key
/// with a different payload is rejected instead of replayed.
pub fn fingerprint<T: Serialize>(operation: &str, body: &T) -> OperationFingerprint {
    let payload = serde_json::to_value(body).unwrap_or(serde_json::Value::Null);
    OperationFingerprint::of(operation, &payload)
}

pub fn parse_id<T>(raw: &str) -> Result<T, Response>
where
    T: FromStr<Err = DomainError>,
{
    raw.parse().map_err(|e: DomainError| {
        errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", e.to_string())
    })
}

/// Run engine work off the async executor; lock acquisition blocks.
pub async fn run_blocking<T, F>(f: F) -> Result<T, DomainError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, DomainError> + Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(result) => result,
        Err(e) => Err(DomainError::invariant(format!("engine task panicked: {e}"))),
    }
}
