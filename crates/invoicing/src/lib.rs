//! `gasflow-invoicing` — invoice numbers, billing periods and tax freezing.
//!
//! Number *allocation* (max-plus-one under the prefix lock) lives in
//! `gasflow-engine`; this crate owns the value types and the frozen tax math.

pub mod invoice;
pub mod number;
pub mod tax;

pub use invoice::Invoice;
pub use number::{BillingPeriod, InvoiceNumber};
pub use tax::TaxRate;
