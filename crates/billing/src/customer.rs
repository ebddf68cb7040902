//! Contract customers and their frozen-at-sale rate card.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use gasflow_core::{Cents, CustomerId, DomainError};

use crate::transaction::{LineItemKind, MeterSale};

/// A contract customer.
///
/// `last_meter_reading` is mutated only by the billing service, in the same
/// atomic unit as the meter-sale transaction it accompanies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub name: String,
    /// Cents per metered unit.
    pub meter_rate: Cents,
    /// Per-cylinder-size rates, keyed by normalized description ("14kg").
    pub cylinder_rates: BTreeMap<String, Cents>,
    /// Per-service rates, keyed by normalized description.
    pub service_rates: BTreeMap<String, Cents>,
    pub last_meter_reading: u64,
}

impl Customer {
    pub fn new(
        id: CustomerId,
        name: impl Into<String>,
        meter_rate: Cents,
    ) -> Result<Self, DomainError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::validation("customer name cannot be empty"));
        }
        Ok(Self {
            id,
            name,
            meter_rate,
            cylinder_rates: BTreeMap::new(),
            service_rates: BTreeMap::new(),
            last_meter_reading: 0,
        })
    }

    pub fn with_cylinder_rate(mut self, description: &str, rate: Cents) -> Self {
        self.cylinder_rates.insert(normalize(description), rate);
        self
    }

    pub fn with_service_rate(mut self, description: &str, rate: Cents) -> Self {
        self.service_rates.insert(normalize(description), rate);
        self
    }

    pub fn with_last_meter_reading(mut self, reading: u64) -> Self {
        self.last_meter_reading = reading;
        self
    }

    /// Contract rate for a line-item description, read at sale time and
    /// copied into the line. An unknown description is a validation failure.
    pub fn rate_for(&self, kind: LineItemKind, description: &str) -> Result<Cents, DomainError> {
        let key = normalize(description);
        let table = match kind {
            LineItemKind::Cylinder => &self.cylinder_rates,
            LineItemKind::Service => &self.service_rates,
        };
        table.get(&key).copied().ok_or_else(|| {
            DomainError::validation(format!("no {kind} rate on contract for '{description}'"))
        })
    }

    /// Price a meter sale against the stored reading.
    ///
    /// Does not mutate the customer: the engine advances `last_meter_reading`
    /// only inside the atomic unit that also commits the transaction.
    pub fn meter_sale(&self, latest_reading: u64) -> Result<MeterSale, DomainError> {
        if latest_reading <= self.last_meter_reading {
            return Err(DomainError::invalid_meter_reading(format!(
                "latest reading {latest_reading} does not exceed stored reading {}",
                self.last_meter_reading
            )));
        }
        let quantity = latest_reading - self.last_meter_reading;
        let subtotal = self.meter_rate.times(quantity)?;
        Ok(MeterSale {
            previous_reading: self.last_meter_reading,
            latest_reading,
            quantity,
            rate: self.meter_rate,
            subtotal,
        })
    }
}

fn normalize(description: &str) -> String {
    description.trim().to_ascii_lowercase()
}
