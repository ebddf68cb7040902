//! Invoice numbering service: gap-tolerant, never-duplicated identifiers.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tracing::instrument;

use gasflow_audit::AuditLogEntry;
use gasflow_auth::Actor;
use gasflow_core::{DomainError, InvoiceId, TransactionId};
use gasflow_invoicing::{BillingPeriod, Invoice, InvoiceNumber, TaxRate};

use crate::lock::LockRegistry;
use crate::store::{CoreStore, WriteBatch};

/// Issues monotonic, collision-free invoice numbers and freezes tax for a
/// committed transaction.
///
/// Number allocation is "max existing for the prefix, plus one", computed and
/// inserted under one exclusive prefix lock — the most safety-critical lock
/// in the system. The store's uniqueness check backstops it: a duplicate
/// reaching `apply` is an integrity bug, not a normal error.
#[derive(Debug)]
pub struct InvoiceNumberingService<S> {
    store: Arc<S>,
    locks: Arc<LockRegistry>,
    /// Prevailing GST rate; captured into each invoice at issuance and never
    /// read live after that point.
    tax_rate: TaxRate,
}

impl<S: CoreStore> InvoiceNumberingService<S> {
    pub fn new(store: Arc<S>, locks: Arc<LockRegistry>, tax_rate: TaxRate) -> Self {
        Self {
            store,
            locks,
            tax_rate,
        }
    }

    pub fn tax_rate(&self) -> TaxRate {
        self.tax_rate
    }

    /// Issue the invoice for a committed transaction within `period`.
    ///
    /// At most one invoice ever exists per transaction; a second issuance is
    /// a conflict. A failed attempt may skip a number (gaps are legal).
    #[instrument(skip(self), fields(%transaction_id, period = %period), err)]
    pub fn issue(
        &self,
        actor: Actor,
        transaction_id: TransactionId,
        period: BillingPeriod,
    ) -> Result<Invoice, DomainError> {
        let txn = self
            .store
            .transaction(transaction_id)?
            .ok_or(DomainError::NotFound)?;

        let _guard = self.locks.acquire(&period.lock_key())?;

        // Re-checked under the lock; the store's per-transaction uniqueness
        // check still backstops a concurrent issuance under another prefix.
        if self.store.invoice_for(transaction_id)?.is_some() {
            return Err(DomainError::conflict(format!(
                "invoice already issued for transaction {transaction_id}"
            )));
        }

        let seq = self.store.max_invoice_seq(&period)? + 1;
        let number = InvoiceNumber::new(period, seq)?;
        let invoice = Invoice::issue(
            InvoiceId::new(),
            transaction_id,
            number,
            txn.total,
            self.tax_rate,
            Utc::now(),
        )?;

        let mut batch = WriteBatch::default();
        batch.audit.push(AuditLogEntry::record(
            actor,
            "invoice.issued",
            Some(json!({
                "transaction_id": transaction_id,
                "number": invoice.number.to_string(),
                "subtotal": invoice.subtotal,
                "gst": invoice.gst,
                "total": invoice.total,
            })),
        ));
        batch.invoices.push(invoice.clone());

        if let Err(err) = self.store.apply(batch) {
            if matches!(err, DomainError::DuplicateInvoiceNumber(_)) {
                tracing::error!(number = %invoice.number, "invoice number collision past the prefix lock");
            }
            return Err(err);
        }

        tracing::info!(number = %invoice.number, total = %invoice.total, "invoice issued");
        Ok(invoice)
    }
}
