//! Stock movement rules and the immutable distribution record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use gasflow_auth::Actor;
use gasflow_core::{DistributionId, DomainError};

use crate::depot::StockKey;

/// Direction of a stock movement.
///
/// `Collection` takes filled cylinders out of the depot; `EmptyReturn` brings
/// empties back in.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    Collection,
    EmptyReturn,
}

impl MovementKind {
    /// Signed effect of moving `quantity` units in this direction.
    pub fn signed_delta(&self, quantity: u32) -> i64 {
        match self {
            MovementKind::Collection => -i64::from(quantity),
            MovementKind::EmptyReturn => i64::from(quantity),
        }
    }
}

impl core::fmt::Display for MovementKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            MovementKind::Collection => f.write_str("collection"),
            MovementKind::EmptyReturn => f.write_str("empty_return"),
        }
    }
}

/// Current quantity of one stock row.
///
/// Pure decision logic: given the quantity read under the row lock, decide
/// the post-movement quantity or reject without change.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct StockLevel(pub i64);

impl StockLevel {
    /// Apply a movement, refusing any collection that would drive the row
    /// negative.
    pub fn apply(
        &self,
        quantity: u32,
        movement: MovementKind,
    ) -> Result<StockLevel, DomainError> {
        if quantity == 0 {
            return Err(DomainError::validation("movement quantity must be positive"));
        }
        if movement == MovementKind::Collection && self.0 < i64::from(quantity) {
            return Err(DomainError::insufficient_stock(format!(
                "requested {quantity}, available {}",
                self.0
            )));
        }
        let next = self
            .0
            .checked_add(movement.signed_delta(quantity))
            .ok_or_else(|| DomainError::invariant("stock quantity overflow"))?;
        debug_assert!(next >= 0);
        Ok(StockLevel(next))
    }
}

/// Immutable record of one stock movement. Created once, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Distribution {
    pub id: DistributionId,
    /// Store-assigned monotonic sequence number, set at commit.
    pub seq: u64,
    pub key: StockKey,
    pub quantity: u32,
    pub movement: MovementKind,
    pub actor: Actor,
    pub recorded_at: DateTime<Utc>,
}
