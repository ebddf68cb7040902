//! Priced sales transactions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use gasflow_auth::Actor;
use gasflow_core::{Cents, CustomerId, DomainError, TransactionId};

/// Kind of a priced line within a transaction.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineItemKind {
    Cylinder,
    Service,
}

impl core::fmt::Display for LineItemKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            LineItemKind::Cylinder => f.write_str("cylinder"),
            LineItemKind::Service => f.write_str("service"),
        }
    }
}

/// One priced cylinder or service quantity. `rate` is a frozen copy of the
/// contract rate at sale time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub kind: LineItemKind,
    pub description: String,
    pub quantity: u32,
    pub rate: Cents,
    pub subtotal: Cents,
}

impl LineItem {
    pub fn price(
        kind: LineItemKind,
        description: impl Into<String>,
        quantity: u32,
        rate: Cents,
    ) -> Result<Self, DomainError> {
        let description = description.into();
        if description.trim().is_empty() {
            return Err(DomainError::validation("line item description cannot be empty"));
        }
        if quantity == 0 {
            return Err(DomainError::validation("line item quantity must be positive"));
        }
        let subtotal = rate.times(u64::from(quantity))?;
        Ok(Self {
            kind,
            description,
            quantity,
            rate,
            subtotal,
        })
    }
}

/// Billing event computed from the difference between two meter readings.
/// `rate` is the contract meter rate frozen at sale time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeterSale {
    pub previous_reading: u64,
    pub latest_reading: u64,
    pub quantity: u64,
    pub rate: Cents,
    pub subtotal: Cents,
}

/// A committed sale. Immutable after creation except for `paid`, which is the
/// only field permitted to change post-creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    /// Store-assigned monotonic number, set at commit.
    pub number: u64,
    pub customer_id: CustomerId,
    pub actor: Actor,
    pub meter_sale: Option<MeterSale>,
    pub line_items: Vec<LineItem>,
    pub total: Cents,
    pub paid: bool,
    pub recorded_at: DateTime<Utc>,
}

impl Transaction {
    /// Compose a transaction from an optional meter component and zero or
    /// more priced line items, summing their subtotals with checked math.
    ///
    /// At least one billable component is required.
    pub fn compose(
        id: TransactionId,
        customer_id: CustomerId,
        actor: Actor,
        meter_sale: Option<MeterSale>,
        line_items: Vec<LineItem>,
        recorded_at: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        if meter_sale.is_none() && line_items.is_empty() {
            return Err(DomainError::validation(
                "transaction must contain a meter sale or at least one line item",
            ));
        }

        let mut total = meter_sale.as_ref().map(|m| m.subtotal).unwrap_or(Cents::ZERO);
        for line in &line_items {
            total = total.checked_add(line.subtotal)?;
        }

        Ok(Self {
            id,
            number: 0,
            customer_id,
            actor,
            meter_sale,
            line_items,
            total,
            paid: false,
            recorded_at,
        })
    }

    /// Flip the paid flag. Idempotent marking is a conflict, so double
    /// submissions surface instead of silently re-applying.
    pub fn mark_paid(&mut self) -> Result<(), DomainError> {
        if self.paid {
            return Err(DomainError::conflict("transaction is already paid"));
        }
        self.paid = true;
        Ok(())
    }
}
