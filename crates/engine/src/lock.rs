//! In-process exclusive key locks with a bounded wait.
//!
//! Every serialized section in the engine (one stock row, one customer row,
//! one invoice-number prefix) acquires its key here before reading state and
//! holds the guard until its write batch has been applied. Mutual exclusion
//! is guaranteed; FIFO fairness is not. One registry serializes access to
//! one store; a store shared wider than the process needs locks that live
//! with the store.

use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use gasflow_core::DomainError;

/// One exclusive lock, backed by `Mutex<bool>` + `Condvar` so waiters can
/// apply a wait budget instead of blocking indefinitely.
#[derive(Debug, Default)]
struct KeyLock {
    held: Mutex<bool>,
    wake: Condvar,
}

impl KeyLock {
    fn acquire(&self, key: &str, budget: Duration) -> Result<(), DomainError> {
        let deadline = Instant::now() + budget;
        let mut held = self
            .held
            .lock()
            .map_err(|_| DomainError::invariant(format!("lock '{key}' poisoned")))?;

        while *held {
            let remaining = match deadline.checked_duration_since(Instant::now()) {
                Some(d) if !d.is_zero() => d,
                _ => {
                    return Err(DomainError::lock_timeout(format!(
                        "gave up waiting for '{key}' after {budget:?}"
                    )));
                }
            };
            let (guard, _timeout) = self
                .wake
                .wait_timeout(held, remaining)
                .map_err(|_| DomainError::invariant(format!("lock '{key}' poisoned")))?;
            held = guard;
        }

        *held = true;
        Ok(())
    }

    fn release(&self) {
        if let Ok(mut held) = self.held.lock() {
            *held = false;
            self.wake.notify_one();
        }
    }
}

/// Registry of per-key locks, created lazily. Repeated lookups for the same
/// key return the same logical lock.
#[derive(Debug)]
pub struct LockRegistry {
    locks: Mutex<HashMap<String, Arc<KeyLock>>>,
    budget: Duration,
}

impl LockRegistry {
    /// `budget` bounds every acquisition; exhausting it yields the retryable
    /// [`DomainError::LockTimeout`].
    pub fn new(budget: Duration) -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
            budget,
        }
    }

    /// Acquire the exclusive lock for `key`. The returned guard releases on
    /// drop, i.e. at the end of the enclosing atomic unit.
    pub fn acquire(&self, key: &str) -> Result<KeyGuard, DomainError> {
        let lock = {
            let mut locks = self
                .locks
                .lock()
                .map_err(|_| DomainError::invariant("lock registry poisoned"))?;
            locks
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(KeyLock::default()))
                .clone()
        };

        lock.acquire(key, self.budget)?;
        Ok(KeyGuard { lock })
    }
}

/// Held exclusive lock; releases on drop.
#[derive(Debug)]
pub struct KeyGuard {
    lock: Arc<KeyLock>,
}

impl Drop for KeyGuard {
    fn drop(&mut self) {
        self.lock.release();
    }
}
