//! Idempotency coordinator: at-least-once delivery in, exactly-once effect out.
//!
//! Every mutating entry point runs through [`IdempotencyCoordinator::submit`].
//! The first arrival of a key executes the operation and stores its outcome;
//! replays return that stored outcome without re-executing, so an offline
//! client can retry the same command indefinitely and observe exactly one
//! side effect.
//!
//! Records are held in process memory: one coordinator fronts one engine
//! process, and every retry of a key must land on the same process.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as JsonValue;

use gasflow_core::DomainError;

/// Client-generated token identifying one logical user action.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    pub fn new(key: impl Into<String>) -> Result<Self, DomainError> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(DomainError::validation("idempotency key cannot be empty"));
        }
        Ok(Self(key))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Identifies *which* operation a key was first used for, so a key
/// accidentally reused for a different request is rejected instead of
/// silently replaying an unrelated result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationFingerprint(String);

impl OperationFingerprint {
    /// Fingerprint from the operation name and its canonical JSON payload.
    pub fn of(operation: &str, payload: &JsonValue) -> Self {
        Self(format!("{operation}:{payload}"))
    }
}

#[derive(Debug, Clone)]
enum SlotState {
    /// First attempt is still executing; callers must back off, not
    /// double-execute.
    InFlight,
    /// Terminal outcome, success or failure, stored for replay.
    Done(Result<JsonValue, DomainError>),
}

#[derive(Debug, Clone)]
struct Slot {
    fingerprint: OperationFingerprint,
    state: SlotState,
    expires_at: DateTime<Utc>,
}

/// Durable map from key to outcome, gating re-execution.
#[derive(Debug)]
pub struct IdempotencyCoordinator {
    slots: Mutex<HashMap<String, Slot>>,
    ttl: Duration,
}

impl IdempotencyCoordinator {
    /// `ttl` is the key validity window (operationally ~24 hours); expired
    /// keys may be reused for a new operation.
    pub fn new(ttl: Duration) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Run `operation` at most once for `key`.
    ///
    /// - first arrival: executes, stores the terminal outcome, returns it;
    /// - replay of a finished key: returns the stored outcome verbatim,
    ///   indistinguishable from a fresh success to the caller;
    /// - replay while the first attempt is in flight: retryable
    ///   [`DomainError::LockTimeout`];
    /// - same key, different operation: [`DomainError::Conflict`].
    ///
    /// Retryable failures (lock timeouts) release the key so the client's
    /// resubmission re-executes instead of replaying the timeout.
    pub fn submit<T, F>(
        &self,
        key: &IdempotencyKey,
        fingerprint: OperationFingerprint,
        operation: F,
    ) -> Result<T, DomainError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Result<T, DomainError>,
    {
        let now = Utc::now();

        // Claim or replay, atomically with respect to other submitters.
        {
            let mut slots = self
                .slots
                .lock()
                .map_err(|_| DomainError::invariant("idempotency map poisoned"))?;

            match slots.get(key.as_str()) {
                Some(slot) if slot.expires_at <= now => {
                    // Window elapsed; the key is free for a new operation.
                    slots.remove(key.as_str());
                }
                Some(slot) if slot.fingerprint != fingerprint => {
                    return Err(DomainError::conflict(
                        "idempotency key already used for a different operation",
                    ));
                }
                Some(slot) => match &slot.state {
                    SlotState::InFlight => {
                        return Err(DomainError::lock_timeout(
                            "operation with this idempotency key is still in flight",
                        ));
                    }
                    SlotState::Done(outcome) => {
                        tracing::debug!(key = key.as_str(), "idempotent replay");
                        return match outcome {
                            Ok(value) => serde_json::from_value(value.clone()).map_err(|e| {
                                DomainError::invariant(format!(
                                    "stored idempotency result no longer decodes: {e}"
                                ))
                            }),
                            Err(err) => Err(err.clone()),
                        };
                    }
                },
                None => {}
            }

            slots.insert(
                key.as_str().to_string(),
                Slot {
                    fingerprint,
                    state: SlotState::InFlight,
                    expires_at: now + self.ttl,
                },
            );
        }

        // Execute outside the map lock so slow operations on one key never
        // block coordination of other keys.
        let outcome = operation();

        let mut slots = self
            .slots
            .lock()
            .map_err(|_| DomainError::invariant("idempotency map poisoned"))?;

        match &outcome {
            Ok(value) => match serde_json::to_value(value) {
                Ok(json) => {
                    if let Some(slot) = slots.get_mut(key.as_str()) {
                        slot.state = SlotState::Done(Ok(json));
                    }
                }
                Err(e) => {
                    // Cannot replay what we cannot store; release the key.
                    slots.remove(key.as_str());
                    tracing::error!(key = key.as_str(), error = %e, "failed to store idempotency result");
                }
            },
            Err(err) if err.is_retryable() => {
                // The client will resubmit with the same key; let it
                // re-execute rather than replaying the timeout.
                slots.remove(key.as_str());
            }
            Err(err) => {
                if let Some(slot) = slots.get_mut(key.as_str()) {
                    slot.state = SlotState::Done(Err(err.clone()));
                }
            }
        }

        outcome
    }
}
