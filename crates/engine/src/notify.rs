//! Post-commit notification seam.
//!
//! The notification/printing layer is triggered after a transaction or
//! invoice commits; its failures must never roll back the committed
//! mutation, so the seam is fire-and-forget by construction (no `Result`).

use gasflow_billing::Transaction;
use gasflow_invoicing::Invoice;

/// Sink for "something committed" signals. Implementations must not block
/// the calling request path for long and must swallow their own failures.
pub trait NotificationSink: Send + Sync {
    fn transaction_recorded(&self, transaction: &Transaction);
    fn invoice_issued(&self, invoice: &Invoice);
}

/// Default sink: structured log lines only.
#[derive(Debug, Default)]
pub struct TracingNotifier;

impl NotificationSink for TracingNotifier {
    fn transaction_recorded(&self, transaction: &Transaction) {
        tracing::info!(
            transaction_id = %transaction.id,
            number = transaction.number,
            total = %transaction.total,
            "notify: transaction recorded"
        );
    }

    fn invoice_issued(&self, invoice: &Invoice) {
        tracing::info!(
            invoice_id = %invoice.id,
            number = %invoice.number,
            total = %invoice.total,
            "notify: invoice issued"
        );
    }
}
