//! Per-request contexts carried through the router as extensions.

use gasflow_auth::Actor;
use gasflow_engine::IdempotencyKey;

/// Authenticated actor for a request.
///
/// Immutable and present for all domain routes.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ActorContext {
    actor: Actor,
}

impl ActorContext {
    pub fn new(actor: Actor) -> Self {
        Self { actor }
    }

    pub fn actor(&self) -> Actor {
        self.actor
    }
}

/// Idempotency key from the `idempotency-key` header, if the client sent one.
/// Mutating routes refuse to run without it.
#[derive(Debug, Clone)]
pub struct IdempotencyContext {
    key: Option<IdempotencyKey>,
}

impl IdempotencyContext {
    pub fn new(key: Option<IdempotencyKey>) -> Self {
        Self { key }
    }

    pub fn key(&self) -> Option<&IdempotencyKey> {
        self.key.as_ref()
    }
}
