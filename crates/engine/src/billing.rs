//! Billing service: metered usage and line items into priced transactions.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::instrument;

use gasflow_audit::AuditLogEntry;
use gasflow_auth::Actor;
use gasflow_billing::{LineItem, LineItemKind, Transaction};
use gasflow_core::{CustomerId, DomainError, TransactionId};

use crate::lock::LockRegistry;
use crate::store::{CoreStore, WriteBatch};

/// One requested line of a composite sale, before pricing. The rate is never
/// part of the request; it is read from the customer's contract at sale time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItemRequest {
    pub kind: LineItemKind,
    pub description: String,
    pub quantity: u32,
}

/// Converts usage into transactions and advances customer meter state.
///
/// Every entry point locks the customer row for the duration of its atomic
/// unit, so two simultaneous sales for one customer cannot interleave.
#[derive(Debug)]
pub struct BillingService<S> {
    store: Arc<S>,
    locks: Arc<LockRegistry>,
}

fn customer_lock_key(id: CustomerId) -> String {
    format!("customer/{id}")
}

impl<S: CoreStore> BillingService<S> {
    pub fn new(store: Arc<S>, locks: Arc<LockRegistry>) -> Self {
        Self { store, locks }
    }

    /// Record a meter sale from the difference between `latest_reading` and
    /// the customer's stored reading.
    ///
    /// The reading advance and the transaction commit in the same atomic
    /// unit: neither is ever visible without the other.
    #[instrument(skip(self), fields(%customer_id, latest_reading), err)]
    pub fn create_meter_sale(
        &self,
        actor: Actor,
        customer_id: CustomerId,
        latest_reading: u64,
    ) -> Result<Transaction, DomainError> {
        self.record_sale(actor, customer_id, Some(latest_reading), Vec::new(), "sale.meter")
    }

    /// Record a composite sale of cylinders and services, optionally with a
    /// meter component sharing the same atomic unit.
    ///
    /// Any constraint violation (unknown description, zero quantity, stale
    /// reading) aborts the whole unit: no partial line set, no partial total,
    /// no customer mutation.
    #[instrument(skip(self, items), fields(%customer_id, items = items.len()), err)]
    pub fn create_line_item_sale(
        &self,
        actor: Actor,
        customer_id: CustomerId,
        items: Vec<LineItemRequest>,
        latest_reading: Option<u64>,
    ) -> Result<Transaction, DomainError> {
        if items.is_empty() && latest_reading.is_none() {
            return Err(DomainError::validation(
                "sale must contain at least one line item or a meter reading",
            ));
        }
        self.record_sale(actor, customer_id, latest_reading, items, "sale.line_items")
    }

    fn record_sale(
        &self,
        actor: Actor,
        customer_id: CustomerId,
        latest_reading: Option<u64>,
        items: Vec<LineItemRequest>,
        action: &str,
    ) -> Result<Transaction, DomainError> {
        let _guard = self.locks.acquire(&customer_lock_key(customer_id))?;

        let customer = self.store.customer(customer_id)?.ok_or(DomainError::NotFound)?;

        let meter_sale = latest_reading
            .map(|latest| customer.meter_sale(latest))
            .transpose()?;

        let mut lines = Vec::with_capacity(items.len());
        for item in &items {
            let rate = customer.rate_for(item.kind, &item.description)?;
            lines.push(LineItem::price(item.kind, item.description.clone(), item.quantity, rate)?);
        }

        let txn = Transaction::compose(
            TransactionId::new(),
            customer_id,
            actor,
            meter_sale,
            lines,
            Utc::now(),
        )?;

        let mut batch = WriteBatch::default();
        if let Some(meter) = &txn.meter_sale {
            batch.meter_readings.push((customer_id, meter.latest_reading));
        }
        batch.audit.push(AuditLogEntry::record(
            actor,
            action,
            Some(json!({
                "transaction_id": txn.id,
                "customer_id": customer_id,
                "total": txn.total,
                "meter_quantity": txn.meter_sale.as_ref().map(|m| m.quantity),
                "line_items": txn.line_items.len(),
            })),
        ));
        batch.transactions.push(txn);

        let applied = self.store.apply(batch)?;
        let txn = applied
            .transactions
            .into_iter()
            .next()
            .ok_or_else(|| DomainError::invariant("store did not return the applied transaction"))?;

        tracing::info!(number = txn.number, total = %txn.total, "sale committed");
        Ok(txn)
    }

    /// Flip a transaction's paid flag — the only post-creation mutation a
    /// transaction permits. Concurrent marks race benignly: the store's
    /// already-paid check lets exactly one win and conflicts the other.
    #[instrument(skip(self), fields(%transaction_id), err)]
    pub fn mark_paid(&self, actor: Actor, transaction_id: TransactionId) -> Result<(), DomainError> {
        let txn = self
            .store
            .transaction(transaction_id)?
            .ok_or(DomainError::NotFound)?;
        if txn.paid {
            return Err(DomainError::conflict("transaction is already paid"));
        }

        let mut batch = WriteBatch::default();
        batch.paid_flags.push(transaction_id);
        batch.audit.push(AuditLogEntry::record(
            actor,
            "transaction.paid",
            Some(json!({ "transaction_id": transaction_id })),
        ));
        self.store.apply(batch)?;
        Ok(())
    }
}
