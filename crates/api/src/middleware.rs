//! Actor extraction middleware.
//!
//! Identity arrives as headers set by the authenticating proxy:
//! `x-actor-id` (user UUID) and `x-actor-role` (`admin`, `sales`,
//! `supervisor`). Requests without a well-formed pair never reach a handler.
//! The optional `idempotency-key` header is captured here too.

use std::str::FromStr;

use axum::{
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};

use gasflow_auth::{Actor, Role};
use gasflow_core::UserId;
use gasflow_engine::IdempotencyKey;

use crate::context::{ActorContext, IdempotencyContext};

pub const ACTOR_ID_HEADER: &str = "x-actor-id";
pub const ACTOR_ROLE_HEADER: &str = "x-actor-role";
pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";

pub async fn actor_middleware(
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let actor = extract_actor(req.headers())?;
    let idempotency = extract_idempotency_key(req.headers());

    req.extensions_mut().insert(ActorContext::new(actor));
    req.extensions_mut()
        .insert(IdempotencyContext::new(idempotency));

    Ok(next.run(req).await)
}

fn extract_actor(headers: &HeaderMap) -> Result<Actor, StatusCode> {
    let user_id = header_str(headers, ACTOR_ID_HEADER)?;
    let user_id = UserId::from_str(user_id).map_err(|_| StatusCode::UNAUTHORIZED)?;

    let role = header_str(headers, ACTOR_ROLE_HEADER)?;
    let role = Role::from_str(role).map_err(|_| StatusCode::UNAUTHORIZED)?;

    Ok(Actor::new(user_id, role))
}

fn extract_idempotency_key(headers: &HeaderMap) -> Option<IdempotencyKey> {
    let raw = headers.get(IDEMPOTENCY_KEY_HEADER)?.to_str().ok()?;
    IdempotencyKey::new(raw).ok()
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Result<&'a str, StatusCode> {
    let value = headers
        .get(name)
        .ok_or(StatusCode::UNAUTHORIZED)?
        .to_str()
        .map_err(|_| StatusCode::UNAUTHORIZED)?
        .trim();
    if value.is_empty() {
        return Err(StatusCode::UNAUTHORIZED);
    }
    Ok(value)
}
