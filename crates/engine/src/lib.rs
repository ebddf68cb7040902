//! Transaction and inventory integrity engine.
//!
//! Hosts the stateful core: the store, the key-scoped lock registry, the
//! idempotency coordinator, and the services that compose them into atomic
//! units (distribution, billing, invoice numbering, registry).

pub mod billing;
pub mod distribution;
pub mod idempotency;
pub mod lock;
pub mod notify;
pub mod numbering;
pub mod registry;
pub mod store;

pub use billing::{BillingService, LineItemRequest};
pub use distribution::DistributionService;
pub use idempotency::{IdempotencyCoordinator, IdempotencyKey, OperationFingerprint};
pub use lock::{KeyGuard, LockRegistry};
pub use notify::{NotificationSink, TracingNotifier};
pub use numbering::InvoiceNumberingService;
pub use registry::{NewCustomer, RegistryService};
pub use store::{Applied, CoreStore, InMemoryStore, WriteBatch};

#[cfg(feature = "postgres")]
pub use store::PostgresStore;

#[cfg(test)]
mod integration_tests;
