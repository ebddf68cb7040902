//! Depots and the (depot, equipment) stock key.

use serde::{Deserialize, Serialize};

use gasflow_core::{DepotId, DomainError};

/// A physical stock location. Immutable once created; referenced, never
/// deleted while inventory exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Depot {
    pub id: DepotId,
    /// Short human code, e.g. "D1".
    pub code: String,
}

impl Depot {
    pub fn new(id: DepotId, code: impl Into<String>) -> Result<Self, DomainError> {
        let code = code.into();
        if code.trim().is_empty() {
            return Err(DomainError::validation("depot code cannot be empty"));
        }
        Ok(Self { id, code })
    }
}

/// Unit of lock scope and of inventory storage: one row per
/// (depot, equipment name).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StockKey {
    pub depot_id: DepotId,
    pub equipment: String,
}

impl StockKey {
    /// Normalizes the equipment name so "14kg" and " 14KG " address the same
    /// row and the same lock.
    pub fn new(depot_id: DepotId, equipment: impl Into<String>) -> Result<Self, DomainError> {
        let equipment = equipment.into().trim().to_ascii_lowercase();
        if equipment.is_empty() {
            return Err(DomainError::validation("equipment name cannot be empty"));
        }
        Ok(Self { depot_id, equipment })
    }

    /// Stable lock-key string for this stock row.
    pub fn lock_key(&self) -> String {
        format!("stock/{}/{}", self.depot_id, self.equipment)
    }
}
