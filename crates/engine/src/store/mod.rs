//! Durable store contract.
//!
//! The store exposes read accessors plus a single mutating entry point,
//! [`CoreStore::apply`], which commits a whole [`WriteBatch`] or nothing.
//! Services prepare batches while holding the relevant key lock; the store
//! re-checks the hard integrity constraints (non-negative stock, unique
//! invoice numbers, audited mutations) as a backstop.

mod memory;
#[cfg(feature = "postgres")]
mod postgres;

pub use memory::InMemoryStore;
#[cfg(feature = "postgres")]
pub use postgres::PostgresStore;

use gasflow_audit::AuditLogEntry;
use gasflow_billing::{Customer, Transaction};
use gasflow_core::{CustomerId, DepotId, DomainError, TransactionId};
use gasflow_inventory::{Depot, Distribution, StockKey};
use gasflow_invoicing::{BillingPeriod, Invoice};

/// One atomic unit of writes.
///
/// Sequence numbers on distributions and transactions are placeholders until
/// the store assigns them at commit; the assigned records come back in
/// [`Applied`].
#[derive(Debug, Default, Clone)]
pub struct WriteBatch {
    pub depots: Vec<Depot>,
    pub customers: Vec<Customer>,
    /// Absolute post-movement quantities, computed under the stock key lock.
    pub stock_levels: Vec<(StockKey, i64)>,
    pub distributions: Vec<Distribution>,
    pub transactions: Vec<Transaction>,
    /// `customer.last_meter_reading` advances, one per meter sale.
    pub meter_readings: Vec<(CustomerId, u64)>,
    /// Transactions whose paid flag flips to true.
    pub paid_flags: Vec<TransactionId>,
    pub invoices: Vec<Invoice>,
    pub audit: Vec<AuditLogEntry>,
}

impl WriteBatch {
    /// True if the batch mutates anything beyond the audit trail.
    pub fn mutates_state(&self) -> bool {
        !(self.depots.is_empty()
            && self.customers.is_empty()
            && self.stock_levels.is_empty()
            && self.distributions.is_empty()
            && self.transactions.is_empty()
            && self.meter_readings.is_empty()
            && self.paid_flags.is_empty()
            && self.invoices.is_empty())
    }
}

/// Records as committed, with store-assigned sequence numbers filled in.
#[derive(Debug, Default, Clone)]
pub struct Applied {
    pub distributions: Vec<Distribution>,
    pub transactions: Vec<Transaction>,
}

/// The engine's durable store.
///
/// Deliberately narrow: there is no way to update or delete an audit entry,
/// edit an invoice, or touch a stock quantity outside `apply`.
pub trait CoreStore: Send + Sync {
    // Reads (also serve the read-only reporting layer). A read that cannot
    // reach the backing store fails with `Unavailable` — an absent row and an
    // unanswerable query are different outcomes, and conflating them would
    // let a connection blip masquerade as "not found" or "sequence 0".
    fn depot(&self, id: DepotId) -> Result<Option<Depot>, DomainError>;
    fn depot_by_code(&self, code: &str) -> Result<Option<Depot>, DomainError>;
    /// Quantity for a stock row; absent rows read as 0 (rows are created
    /// lazily on first movement).
    fn stock_quantity(&self, key: &StockKey) -> Result<i64, DomainError>;
    fn depot_stock(&self, depot_id: DepotId) -> Result<Vec<(String, i64)>, DomainError>;
    fn customer(&self, id: CustomerId) -> Result<Option<Customer>, DomainError>;
    fn transaction(&self, id: TransactionId) -> Result<Option<Transaction>, DomainError>;
    fn invoice_for(&self, transaction_id: TransactionId) -> Result<Option<Invoice>, DomainError>;
    /// Highest sequence previously issued within the period's prefix, 0 if
    /// none. Only meaningful while holding the prefix lock.
    fn max_invoice_seq(&self, period: &BillingPeriod) -> Result<u32, DomainError>;
    fn distributions(&self) -> Result<Vec<Distribution>, DomainError>;
    fn audit_entries(&self) -> Result<Vec<AuditLogEntry>, DomainError>;

    /// Commit a batch all-or-nothing. Partial application is never
    /// observable, including to concurrent readers.
    fn apply(&self, batch: WriteBatch) -> Result<Applied, DomainError>;
}
