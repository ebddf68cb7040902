//! Distribution service: stock movements under exclusive-lock discipline.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tracing::instrument;

use gasflow_audit::AuditLogEntry;
use gasflow_auth::Actor;
use gasflow_core::{DepotId, DistributionId, DomainError};
use gasflow_inventory::{Distribution, MovementKind, StockKey, StockLevel};

use crate::lock::LockRegistry;
use crate::store::{CoreStore, WriteBatch};

/// Executes stock-movement commands against the inventory ledger.
///
/// The only component that mutates inventory quantities. Each execution
/// serializes on the (depot, equipment) key; the ledger delta, the
/// distribution record and the audit entry commit in one atomic unit.
#[derive(Debug)]
pub struct DistributionService<S> {
    store: Arc<S>,
    locks: Arc<LockRegistry>,
}

impl<S: CoreStore> DistributionService<S> {
    pub fn new(store: Arc<S>, locks: Arc<LockRegistry>) -> Self {
        Self { store, locks }
    }

    /// Move `quantity` units of `equipment` into (`EmptyReturn`) or out of
    /// (`Collection`) a depot's stock.
    ///
    /// A collection exceeding current stock fails with `InsufficientStock`
    /// and applies no change. The row is created lazily at 0 on first
    /// movement.
    #[instrument(skip(self), fields(%depot_id, equipment, quantity, %movement), err)]
    pub fn execute(
        &self,
        actor: Actor,
        depot_id: DepotId,
        equipment: &str,
        quantity: u32,
        movement: MovementKind,
    ) -> Result<Distribution, DomainError> {
        // Validation happens before any lock is taken.
        let key = StockKey::new(depot_id, equipment)?;
        if quantity == 0 {
            return Err(DomainError::validation("movement quantity must be positive"));
        }
        if self.store.depot(depot_id)?.is_none() {
            return Err(DomainError::not_found());
        }

        let _guard = self.locks.acquire(&key.lock_key())?;

        let current = StockLevel(self.store.stock_quantity(&key)?);
        let next = current.apply(quantity, movement)?;

        let distribution = Distribution {
            id: DistributionId::new(),
            seq: 0,
            key: key.clone(),
            quantity,
            movement,
            actor,
            recorded_at: Utc::now(),
        };

        let mut batch = WriteBatch::default();
        batch.stock_levels.push((key.clone(), next.0));
        batch.distributions.push(distribution);
        batch.audit.push(AuditLogEntry::record(
            actor,
            format!("distribution.{movement}"),
            Some(json!({
                "depot_id": key.depot_id,
                "equipment": key.equipment,
                "quantity": quantity,
                "before": current.0,
                "after": next.0,
            })),
        ));

        let applied = self.store.apply(batch)?;
        let distribution = applied
            .distributions
            .into_iter()
            .next()
            .ok_or_else(|| DomainError::invariant("store did not return the applied distribution"))?;

        tracing::info!(
            seq = distribution.seq,
            after = next.0,
            "stock movement committed"
        );
        Ok(distribution)
    }
}
