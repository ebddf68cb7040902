//! Capability checks at the HTTP boundary.

use axum::http::StatusCode;
use axum::response::Response;

use gasflow_auth::{Actor, Capability};

use crate::app::errors;

/// Reject the request unless the actor's role grants `capability`.
pub fn require(actor: Actor, capability: Capability) -> Result<(), Response> {
    if actor.allows(capability) {
        Ok(())
    } else {
        Err(errors::json_error(
            StatusCode::FORBIDDEN,
            "forbidden",
            format!("role {} may not {capability:?}", actor.role),
        ))
    }
}
