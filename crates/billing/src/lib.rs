//! `gasflow-billing` — customers, priced transactions and line items.
//!
//! Pricing is frozen at sale time: a line item carries a copy of the rate it
//! was priced at, never a live reference to the customer's contract.

pub mod customer;
pub mod transaction;

pub use customer::Customer;
pub use transaction::{LineItem, LineItemKind, MeterSale, Transaction};
