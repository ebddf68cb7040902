//! The tax-frozen, numbered billing document.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use gasflow_core::{Cents, DomainError, InvoiceId, TransactionId};

use crate::number::InvoiceNumber;
use crate::tax::TaxRate;

/// One-to-one with a committed transaction. Created at most once; never
/// edited or deleted. `gst` and `total` are computed once at issuance and are
/// immune to later tax-rate changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: InvoiceId,
    pub transaction_id: TransactionId,
    pub number: InvoiceNumber,
    pub subtotal: Cents,
    pub gst: Cents,
    pub total: Cents,
    /// The rate the frozen amounts were computed under, kept for audit.
    pub tax_rate: TaxRate,
    pub issued_at: DateTime<Utc>,
}

impl Invoice {
    /// Freeze tax for a transaction subtotal under the given rate.
    pub fn issue(
        id: InvoiceId,
        transaction_id: TransactionId,
        number: InvoiceNumber,
        subtotal: Cents,
        tax_rate: TaxRate,
        issued_at: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        let gst = tax_rate.gst_on(subtotal);
        let total = subtotal.checked_add(gst)?;
        Ok(Self {
            id,
            transaction_id,
            number,
            subtotal,
            gst,
            total,
            tax_rate,
            issued_at,
        })
    }
}
