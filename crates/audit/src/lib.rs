//! `gasflow-audit` — the append-only audit record.
//!
//! There is no update or delete anywhere in this crate or in the store
//! contract that persists these entries; append-only is structural, not a
//! permission check.

pub mod entry;

pub use entry::AuditLogEntry;
