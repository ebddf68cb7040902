//! Registry service: depot and customer onboarding.
//!
//! Thin compared to the movement/billing paths, but still audited: creation
//! is a mutation like any other.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::instrument;

use gasflow_audit::AuditLogEntry;
use gasflow_auth::Actor;
use gasflow_billing::Customer;
use gasflow_core::{Cents, CustomerId, DepotId, DomainError};
use gasflow_inventory::Depot;

use crate::store::{CoreStore, WriteBatch};

/// Contract details for a new customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCustomer {
    pub name: String,
    pub meter_rate: Cents,
    #[serde(default)]
    pub cylinder_rates: BTreeMap<String, Cents>,
    #[serde(default)]
    pub service_rates: BTreeMap<String, Cents>,
    #[serde(default)]
    pub opening_meter_reading: u64,
}

#[derive(Debug)]
pub struct RegistryService<S> {
    store: Arc<S>,
}

impl<S: CoreStore> RegistryService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Register a depot. Depots are immutable once created; a duplicate code
    /// is a conflict.
    #[instrument(skip(self), err)]
    pub fn register_depot(&self, actor: Actor, code: &str) -> Result<Depot, DomainError> {
        let depot = Depot::new(DepotId::new(), code)?;

        let mut batch = WriteBatch::default();
        batch.audit.push(AuditLogEntry::record(
            actor,
            "depot.registered",
            Some(json!({ "depot_id": depot.id, "code": depot.code })),
        ));
        batch.depots.push(depot.clone());
        self.store.apply(batch)?;
        Ok(depot)
    }

    /// Register a customer with their contract rate card.
    #[instrument(skip(self, new), fields(name = %new.name), err)]
    pub fn register_customer(&self, actor: Actor, new: NewCustomer) -> Result<Customer, DomainError> {
        let mut customer = Customer::new(CustomerId::new(), new.name, new.meter_rate)?
            .with_last_meter_reading(new.opening_meter_reading);
        for (description, rate) in &new.cylinder_rates {
            customer = customer.with_cylinder_rate(description, *rate);
        }
        for (description, rate) in &new.service_rates {
            customer = customer.with_service_rate(description, *rate);
        }

        let mut batch = WriteBatch::default();
        batch.audit.push(AuditLogEntry::record(
            actor,
            "customer.registered",
            Some(json!({ "customer_id": customer.id, "name": customer.name })),
        ));
        batch.customers.push(customer.clone());
        self.store.apply(batch)?;
        Ok(customer)
    }
}
