//! Engine wiring behind the HTTP handlers.
//!
//! One shared store + lock registry + idempotency coordinator per process.
//! The default backend keeps everything in memory; with the `postgres`
//! feature and `GASFLOW_DATABASE_URL` set, the same services run against the
//! durable store. Handlers call these methods from `spawn_blocking` because
//! key-lock acquisition blocks.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use gasflow_audit::AuditLogEntry;
use gasflow_auth::Actor;
use gasflow_billing::{Customer, Transaction};
use gasflow_core::{CustomerId, DepotId, DomainError, TransactionId};
use gasflow_engine::{
    BillingService, CoreStore, DistributionService, IdempotencyCoordinator, IdempotencyKey,
    InMemoryStore, InvoiceNumberingService, LineItemRequest, LockRegistry, NewCustomer,
    NotificationSink, OperationFingerprint, RegistryService, TracingNotifier,
};
use gasflow_inventory::{Depot, Distribution, MovementKind};
use gasflow_invoicing::{BillingPeriod, Invoice};

use crate::config::Config;

#[cfg(feature = "postgres")]
use gasflow_engine::PostgresStore;

struct Services<S> {
    store: Arc<S>,
    registry: RegistryService<S>,
    distribution: DistributionService<S>,
    billing: BillingService<S>,
    numbering: InvoiceNumberingService<S>,
}

impl<S: CoreStore> Services<S> {
    fn new(store: Arc<S>, locks: Arc<LockRegistry>, config: &Config) -> Self {
        Self {
            store: store.clone(),
            registry: RegistryService::new(store.clone()),
            distribution: DistributionService::new(store.clone(), locks.clone()),
            billing: BillingService::new(store.clone(), locks.clone()),
            numbering: InvoiceNumberingService::new(store, locks, config.tax_rate),
        }
    }
}

enum Backend {
    InMemory(Services<InMemoryStore>),
    #[cfg(feature = "postgres")]
    Postgres(Services<PostgresStore>),
}

macro_rules! on_backend {
    ($self:expr, $services:ident => $body:expr) => {
        match &$self.backend {
            Backend::InMemory($services) => $body,
            #[cfg(feature = "postgres")]
            Backend::Postgres($services) => $body,
        }
    };
}

/// Everything the handlers need, bundled as one extension.
pub struct AppServices {
    backend: Backend,
    coordinator: IdempotencyCoordinator,
    notifier: TracingNotifier,
}

pub async fn build_services(config: &Config) -> AppServices {
    let locks = Arc::new(LockRegistry::new(config.lock_timeout));
    let coordinator = IdempotencyCoordinator::new(config.idempotency_ttl);

    #[cfg(feature = "postgres")]
    if let Some(url) = &config.database_url {
        match PostgresStore::connect(url).await {
            Ok(store) => {
                tracing::info!("using postgres store");
                return AppServices {
                    backend: Backend::Postgres(Services::new(Arc::new(store), locks, config)),
                    coordinator,
                    notifier: TracingNotifier,
                };
            }
            Err(e) => {
                tracing::error!(error = %e, "postgres connection failed; falling back to in-memory store");
            }
        }
    }
    #[cfg(not(feature = "postgres"))]
    if config.database_url.is_some() {
        tracing::warn!("GASFLOW_DATABASE_URL set but the postgres feature is disabled");
    }

    AppServices {
        backend: Backend::InMemory(Services::new(Arc::new(InMemoryStore::new()), locks, config)),
        coordinator,
        notifier: TracingNotifier,
    }
}

impl AppServices {
    /// Run `operation` under the idempotency coordinator.
    pub fn submit<T, F>(
        &self,
        key: &IdempotencyKey,
        fingerprint: OperationFingerprint,
        operation: F,
    ) -> Result<T, DomainError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Result<T, DomainError>,
    {
        self.coordinator.submit(key, fingerprint, operation)
    }

    pub fn register_depot(&self, actor: Actor, code: &str) -> Result<Depot, DomainError> {
        on_backend!(self, s => s.registry.register_depot(actor, code))
    }

    pub fn register_customer(
        &self,
        actor: Actor,
        new: NewCustomer,
    ) -> Result<Customer, DomainError> {
        on_backend!(self, s => s.registry.register_customer(actor, new))
    }

    pub fn distribute(
        &self,
        actor: Actor,
        depot_id: DepotId,
        equipment: &str,
        quantity: u32,
        movement: MovementKind,
    ) -> Result<Distribution, DomainError> {
        on_backend!(self, s => s.distribution.execute(actor, depot_id, equipment, quantity, movement))
    }

    pub fn meter_sale(
        &self,
        actor: Actor,
        customer_id: CustomerId,
        latest_reading: u64,
    ) -> Result<Transaction, DomainError> {
        let txn =
            on_backend!(self, s => s.billing.create_meter_sale(actor, customer_id, latest_reading))?;
        self.notifier.transaction_recorded(&txn);
        Ok(txn)
    }

    pub fn line_item_sale(
        &self,
        actor: Actor,
        customer_id: CustomerId,
        items: Vec<LineItemRequest>,
        latest_reading: Option<u64>,
    ) -> Result<Transaction, DomainError> {
        let txn = on_backend!(self, s => s.billing.create_line_item_sale(actor, customer_id, items, latest_reading))?;
        self.notifier.transaction_recorded(&txn);
        Ok(txn)
    }

    pub fn mark_paid(&self, actor: Actor, transaction_id: TransactionId) -> Result<(), DomainError> {
        on_backend!(self, s => s.billing.mark_paid(actor, transaction_id))
    }

    pub fn issue_invoice(
        &self,
        actor: Actor,
        transaction_id: TransactionId,
        period: BillingPeriod,
    ) -> Result<Invoice, DomainError> {
        let invoice = on_backend!(self, s => s.numbering.issue(actor, transaction_id, period))?;
        self.notifier.invoice_issued(&invoice);
        Ok(invoice)
    }

    pub fn depot_stock(&self, depot_id: DepotId) -> Result<Vec<(String, i64)>, DomainError> {
        on_backend!(self, s => {
            if s.store.depot(depot_id)?.is_none() {
                return Err(DomainError::NotFound);
            }
            s.store.depot_stock(depot_id)
        })
    }

    pub fn transaction(&self, id: TransactionId) -> Result<Transaction, DomainError> {
        on_backend!(self, s => s.store.transaction(id)?.ok_or(DomainError::NotFound))
    }

    pub fn invoice_for(
        &self,
        transaction_id: TransactionId,
    ) -> Result<Option<Invoice>, DomainError> {
        on_backend!(self, s => s.store.invoice_for(transaction_id))
    }

    pub fn audit_entries(&self) -> Result<Vec<AuditLogEntry>, DomainError> {
        on_backend!(self, s => s.store.audit_entries())
    }
}
