//! Request/response DTOs and JSON mapping helpers.
//!
//! Responses are built field by field: domain structs are never serialized
//! wholesale, so adding a field to a domain type can't leak it to clients by
//! accident. Money crosses the wire as integer cents.

use std::collections::BTreeMap;

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};

use gasflow_audit::AuditLogEntry;
use gasflow_billing::{Customer, Transaction};
use gasflow_core::Cents;
use gasflow_engine::{LineItemRequest, NewCustomer};
use gasflow_inventory::{Depot, Distribution, MovementKind};
use gasflow_invoicing::Invoice;

use crate::app::errors;

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterDepotRequest {
    pub code: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterCustomerRequest {
    pub name: String,
    pub meter_rate_cents: u64,
    #[serde(default)]
    pub cylinder_rates_cents: BTreeMap<String, u64>,
    #[serde(default)]
    pub service_rates_cents: BTreeMap<String, u64>,
    #[serde(default)]
    pub opening_meter_reading: u64,
}

impl RegisterCustomerRequest {
    pub fn into_new_customer(self) -> NewCustomer {
        NewCustomer {
            name: self.name,
            meter_rate: Cents::new(self.meter_rate_cents),
            cylinder_rates: self
                .cylinder_rates_cents
                .into_iter()
                .map(|(k, v)| (k, Cents::new(v)))
                .collect(),
            service_rates: self
                .service_rates_cents
                .into_iter()
                .map(|(k, v)| (k, Cents::new(v)))
                .collect(),
            opening_meter_reading: self.opening_meter_reading,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DistributionRequest {
    pub depot_id: String,
    pub equipment: String,
    pub quantity: u32,
    /// "collection" or "empty_return".
    pub movement: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MeterSaleRequest {
    pub customer_id: String,
    pub latest_reading: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LineItemSaleRequest {
    pub customer_id: String,
    pub items: Vec<LineItemRequest>,
    #[serde(default)]
    pub latest_reading: Option<u64>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct IssueInvoiceRequest {
    /// Issuance period; defaults to the current month when omitted.
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub month: Option<u32>,
}

pub fn parse_movement(s: &str) -> Result<MovementKind, axum::response::Response> {
    match s.to_ascii_lowercase().as_str() {
        "collection" => Ok(MovementKind::Collection),
        "empty_return" => Ok(MovementKind::EmptyReturn),
        _ => Err(errors::json_error(
            StatusCode::BAD_REQUEST,
            "invalid_movement",
            "movement must be one of: collection, empty_return",
        )),
    }
}

pub fn depot_to_json(depot: &Depot) -> JsonValue {
    json!({
        "id": depot.id.to_string(),
        "code": depot.code,
    })
}

pub fn customer_to_json(customer: &Customer) -> JsonValue {
    json!({
        "id": customer.id.to_string(),
        "name": customer.name,
        "meter_rate_cents": customer.meter_rate.0,
        "cylinder_rates_cents": customer
            .cylinder_rates
            .iter()
            .map(|(k, v)| (k.clone(), v.0))
            .collect::<BTreeMap<String, u64>>(),
        "service_rates_cents": customer
            .service_rates
            .iter()
            .map(|(k, v)| (k.clone(), v.0))
            .collect::<BTreeMap<String, u64>>(),
        "last_meter_reading": customer.last_meter_reading,
    })
}

pub fn distribution_to_json(distribution: &Distribution) -> JsonValue {
    json!({
        "id": distribution.id.to_string(),
        "seq": distribution.seq,
        "depot_id": distribution.key.depot_id.to_string(),
        "equipment": distribution.key.equipment,
        "quantity": distribution.quantity,
        "movement": distribution.movement.to_string(),
        "recorded_at": distribution.recorded_at,
    })
}

pub fn transaction_to_json(txn: &Transaction) -> JsonValue {
    json!({
        "id": txn.id.to_string(),
        "number": txn.number,
        "customer_id": txn.customer_id.to_string(),
        "meter_sale": txn.meter_sale.as_ref().map(|m| json!({
            "previous_reading": m.previous_reading,
            "latest_reading": m.latest_reading,
            "quantity": m.quantity,
            "rate_cents": m.rate.0,
            "subtotal_cents": m.subtotal.0,
        })),
        "line_items": txn.line_items.iter().map(|l| json!({
            "kind": l.kind.to_string(),
            "description": l.description,
            "quantity": l.quantity,
            "rate_cents": l.rate.0,
            "subtotal_cents": l.subtotal.0,
        })).collect::<Vec<_>>(),
        "total_cents": txn.total.0,
        "paid": txn.paid,
        "recorded_at": txn.recorded_at,
    })
}

pub fn invoice_to_json(invoice: &Invoice) -> JsonValue {
    json!({
        "id": invoice.id.to_string(),
        "transaction_id": invoice.transaction_id.to_string(),
        "number": invoice.number.to_string(),
        "subtotal_cents": invoice.subtotal.0,
        "gst_cents": invoice.gst.0,
        "total_cents": invoice.total.0,
        "tax_rate_bp": invoice.tax_rate.basis_points(),
        "issued_at": invoice.issued_at,
    })
}

pub fn audit_entry_to_json(entry: &AuditLogEntry) -> JsonValue {
    json!({
        "id": entry.id.to_string(),
        "actor": {
            "user_id": entry.actor.user_id.to_string(),
            "role": entry.actor.role.as_str(),
        },
        "action": entry.action,
        "detail": entry.detail,
        "recorded_at": entry.recorded_at,
    })
}
