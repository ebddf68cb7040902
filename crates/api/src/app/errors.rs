use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use gasflow_core::DomainError;

/// Map a domain error onto a JSON error response.
///
/// Retryable lock timeouts surface as 503 so clients know to resubmit with
/// the same idempotency key. A duplicate invoice number is an integrity bug,
/// never a client error, so it maps to 500.
pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    match err {
        DomainError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        DomainError::InsufficientStock(msg) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "insufficient_stock", msg)
        }
        DomainError::InvalidMeterReading(msg) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "invalid_meter_reading", msg)
        }
        DomainError::LockTimeout(msg) => {
            json_error(StatusCode::SERVICE_UNAVAILABLE, "lock_timeout", msg)
        }
        DomainError::Unavailable(msg) => {
            json_error(StatusCode::SERVICE_UNAVAILABLE, "store_unavailable", msg)
        }
        DomainError::DuplicateInvoiceNumber(msg) => {
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "integrity_error", msg)
        }
        DomainError::InvariantViolation(msg) => {
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "invariant_violation", msg)
        }
        DomainError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        DomainError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
        DomainError::Unauthorized => json_error(StatusCode::FORBIDDEN, "forbidden", "forbidden"),
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
