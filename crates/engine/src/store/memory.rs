//! In-memory store.
//!
//! Default backend for tests and single-process deployments. All tables live
//! behind one `RwLock`, so a batch commit is atomic and readers never observe
//! a distribution without its audit entry, or a transaction without its meter
//! reading update.

use std::collections::HashMap;
use std::sync::RwLock;

use gasflow_audit::AuditLogEntry;
use gasflow_billing::{Customer, Transaction};
use gasflow_core::{CustomerId, DepotId, DomainError, TransactionId};
use gasflow_inventory::{Depot, Distribution, StockKey};
use gasflow_invoicing::{BillingPeriod, Invoice};

use super::{Applied, CoreStore, WriteBatch};

#[derive(Debug, Default)]
struct Tables {
    depots: HashMap<DepotId, Depot>,
    stock: HashMap<StockKey, i64>,
    distributions: Vec<Distribution>,
    next_distribution_seq: u64,
    customers: HashMap<CustomerId, Customer>,
    transactions: HashMap<TransactionId, Transaction>,
    next_transaction_number: u64,
    invoices: Vec<Invoice>,
    audit: Vec<AuditLogEntry>,
}

/// In-memory implementation of [`CoreStore`]. Not optimized for large data
/// sets; correctness first.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Tables> {
        // A poisoned table lock means a writer panicked mid-validation; the
        // state itself is only mutated after validation, so reads stay sound.
        match self.tables.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Validate the whole batch against current state, then mutate. Nothing is
/// touched until every check has passed.
fn check_batch(tables: &Tables, batch: &WriteBatch) -> Result<(), DomainError> {
    if batch.mutates_state() && batch.audit.is_empty() {
        return Err(DomainError::invariant(
            "refusing to commit an un-audited mutation",
        ));
    }

    for depot in &batch.depots {
        if tables.depots.contains_key(&depot.id) {
            return Err(DomainError::conflict(format!("depot {} already exists", depot.id)));
        }
        if tables.depots.values().any(|d| d.code == depot.code) {
            return Err(DomainError::conflict(format!(
                "depot code '{}' already exists",
                depot.code
            )));
        }
    }

    for customer in &batch.customers {
        if tables.customers.contains_key(&customer.id) {
            return Err(DomainError::conflict(format!(
                "customer {} already exists",
                customer.id
            )));
        }
    }

    for (key, quantity) in &batch.stock_levels {
        if *quantity < 0 {
            return Err(DomainError::invariant(format!(
                "stock for {}/{} would go negative ({quantity})",
                key.depot_id, key.equipment
            )));
        }
        if !tables.depots.contains_key(&key.depot_id)
            && !batch.depots.iter().any(|d| d.id == key.depot_id)
        {
            return Err(DomainError::not_found());
        }
    }

    for txn in &batch.transactions {
        if tables.transactions.contains_key(&txn.id) {
            return Err(DomainError::conflict(format!(
                "transaction {} already exists",
                txn.id
            )));
        }
    }

    for (customer_id, _) in &batch.meter_readings {
        if !tables.customers.contains_key(customer_id) {
            return Err(DomainError::not_found());
        }
    }

    for txn_id in &batch.paid_flags {
        match tables.transactions.get(txn_id) {
            None => return Err(DomainError::not_found()),
            Some(txn) if txn.paid => {
                return Err(DomainError::conflict("transaction is already paid"));
            }
            Some(_) => {}
        }
    }

    for invoice in &batch.invoices {
        if tables
            .invoices
            .iter()
            .any(|i| i.transaction_id == invoice.transaction_id)
        {
            return Err(DomainError::conflict(format!(
                "invoice already issued for transaction {}",
                invoice.transaction_id
            )));
        }
        if !tables.transactions.contains_key(&invoice.transaction_id)
            && !batch.transactions.iter().any(|t| t.id == invoice.transaction_id)
        {
            return Err(DomainError::not_found());
        }
        // The uniqueness backstop behind the prefix lock. Reaching it means
        // the lock discipline was bypassed.
        if tables.invoices.iter().any(|i| i.number == invoice.number) {
            return Err(DomainError::DuplicateInvoiceNumber(invoice.number.to_string()));
        }
    }

    Ok(())
}

impl CoreStore for InMemoryStore {
    fn depot(&self, id: DepotId) -> Result<Option<Depot>, DomainError> {
        Ok(self.read().depots.get(&id).cloned())
    }

    fn depot_by_code(&self, code: &str) -> Result<Option<Depot>, DomainError> {
        Ok(self.read().depots.values().find(|d| d.code == code).cloned())
    }

    fn stock_quantity(&self, key: &StockKey) -> Result<i64, DomainError> {
        Ok(self.read().stock.get(key).copied().unwrap_or(0))
    }

    fn depot_stock(&self, depot_id: DepotId) -> Result<Vec<(String, i64)>, DomainError> {
        let tables = self.read();
        let mut rows: Vec<(String, i64)> = tables
            .stock
            .iter()
            .filter(|(key, _)| key.depot_id == depot_id)
            .map(|(key, qty)| (key.equipment.clone(), *qty))
            .collect();
        rows.sort();
        Ok(rows)
    }

    fn customer(&self, id: CustomerId) -> Result<Option<Customer>, DomainError> {
        Ok(self.read().customers.get(&id).cloned())
    }

    fn transaction(&self, id: TransactionId) -> Result<Option<Transaction>, DomainError> {
        Ok(self.read().transactions.get(&id).cloned())
    }

    fn invoice_for(&self, transaction_id: TransactionId) -> Result<Option<Invoice>, DomainError> {
        Ok(self
            .read()
            .invoices
            .iter()
            .find(|i| i.transaction_id == transaction_id)
            .cloned())
    }

    fn max_invoice_seq(&self, period: &BillingPeriod) -> Result<u32, DomainError> {
        Ok(self
            .read()
            .invoices
            .iter()
            .filter(|i| i.number.period == *period)
            .map(|i| i.number.seq)
            .max()
            .unwrap_or(0))
    }

    fn distributions(&self) -> Result<Vec<Distribution>, DomainError> {
        Ok(self.read().distributions.clone())
    }

    fn audit_entries(&self) -> Result<Vec<AuditLogEntry>, DomainError> {
        Ok(self.read().audit.clone())
    }

    fn apply(&self, batch: WriteBatch) -> Result<Applied, DomainError> {
        let mut tables = self
            .tables
            .write()
            .map_err(|_| DomainError::invariant("store lock poisoned"))?;

        check_batch(&tables, &batch)?;

        // All checks passed; apply everything. No fallible step below.
        let mut applied = Applied::default();

        for depot in batch.depots {
            tables.depots.insert(depot.id, depot);
        }
        for customer in batch.customers {
            tables.customers.insert(customer.id, customer);
        }
        for (key, quantity) in batch.stock_levels {
            tables.stock.insert(key, quantity);
        }
        for mut distribution in batch.distributions {
            tables.next_distribution_seq += 1;
            distribution.seq = tables.next_distribution_seq;
            tables.distributions.push(distribution.clone());
            applied.distributions.push(distribution);
        }
        for mut txn in batch.transactions {
            tables.next_transaction_number += 1;
            txn.number = tables.next_transaction_number;
            tables.transactions.insert(txn.id, txn.clone());
            applied.transactions.push(txn);
        }
        for (customer_id, reading) in batch.meter_readings {
            if let Some(customer) = tables.customers.get_mut(&customer_id) {
                customer.last_meter_reading = reading;
            }
        }
        for txn_id in batch.paid_flags {
            if let Some(txn) = tables.transactions.get_mut(&txn_id) {
                txn.paid = true;
            }
        }
        for invoice in batch.invoices {
            tables.invoices.push(invoice);
        }
        for entry in batch.audit {
            tables.audit.push(entry);
        }

        Ok(applied)
    }
}
