//! End-to-end tests over the full engine: registry, distribution, billing,
//! invoice numbering and the idempotency coordinator against one shared
//! in-memory store.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use serde_json::json;

use gasflow_audit::AuditLogEntry;
use gasflow_auth::{Actor, Role};
use gasflow_billing::{Customer, LineItemKind, Transaction};
use gasflow_core::{Cents, CustomerId, DepotId, DomainError, TransactionId, UserId};
use gasflow_inventory::{Depot, Distribution, MovementKind, StockKey};
use gasflow_invoicing::{BillingPeriod, Invoice, TaxRate};

use crate::billing::{BillingService, LineItemRequest};
use crate::distribution::DistributionService;
use crate::idempotency::{IdempotencyCoordinator, IdempotencyKey, OperationFingerprint};
use crate::lock::LockRegistry;
use crate::numbering::InvoiceNumberingService;
use crate::registry::{NewCustomer, RegistryService};
use crate::store::{Applied, CoreStore, InMemoryStore, WriteBatch};

struct Engine {
    store: Arc<InMemoryStore>,
    registry: RegistryService<InMemoryStore>,
    distribution: DistributionService<InMemoryStore>,
    billing: BillingService<InMemoryStore>,
    numbering: InvoiceNumberingService<InMemoryStore>,
}

fn engine() -> Engine {
    let store = Arc::new(InMemoryStore::new());
    let locks = Arc::new(LockRegistry::new(Duration::from_secs(5)));
    Engine {
        store: store.clone(),
        registry: RegistryService::new(store.clone()),
        distribution: DistributionService::new(store.clone(), locks.clone()),
        billing: BillingService::new(store.clone(), locks.clone()),
        numbering: InvoiceNumberingService::new(
            store,
            locks,
            TaxRate::from_basis_points(1_000).unwrap(),
        ),
    }
}

fn admin() -> Actor {
    Actor::new(UserId::new(), Role::Admin)
}

fn new_customer() -> NewCustomer {
    NewCustomer {
        name: "Acme Eatery".to_string(),
        meter_rate: Cents::new(200),
        cylinder_rates: [("14kg".to_string(), Cents::new(2_500))].into(),
        service_rates: [("regulator check".to_string(), Cents::new(1_000))].into(),
        opening_meter_reading: 500,
    }
}

#[test]
fn collection_reduces_stock_atomically() {
    let eng = engine();
    let actor = admin();
    let depot = eng.registry.register_depot(actor, "D1").unwrap();

    eng.distribution
        .execute(actor, depot.id, "14kg", 100, MovementKind::EmptyReturn)
        .unwrap();
    eng.distribution
        .execute(actor, depot.id, "14kg", 30, MovementKind::Collection)
        .unwrap();

    let key = StockKey::new(depot.id, "14kg").unwrap();
    assert_eq!(eng.store.stock_quantity(&key).unwrap(), 70);
    // Two movements, two ledger rows, both audited.
    assert_eq!(eng.store.distributions().unwrap().len(), 2);
}

#[test]
fn overdraw_is_rejected_and_stock_is_unchanged() {
    let eng = engine();
    let actor = admin();
    let depot = eng.registry.register_depot(actor, "D1").unwrap();
    eng.distribution
        .execute(actor, depot.id, "14kg", 70, MovementKind::EmptyReturn)
        .unwrap();

    let err = eng
        .distribution
        .execute(actor, depot.id, "14kg", 200, MovementKind::Collection)
        .unwrap_err();
    assert!(matches!(err, DomainError::InsufficientStock(_)));

    let key = StockKey::new(depot.id, "14kg").unwrap();
    assert_eq!(eng.store.stock_quantity(&key).unwrap(), 70);
    assert_eq!(eng.store.distributions().unwrap().len(), 1);
}

#[test]
fn meter_sale_prices_and_advances_the_reading_together() {
    let eng = engine();
    let actor = admin();
    let customer = eng.registry.register_customer(actor, new_customer()).unwrap();

    let txn = eng.billing.create_meter_sale(actor, customer.id, 520).unwrap();

    let meter = txn.meter_sale.as_ref().unwrap();
    assert_eq!(meter.quantity, 20);
    assert_eq!(txn.total, Cents::new(4_000));
    assert_eq!(
        eng.store.customer(customer.id).unwrap().unwrap().last_meter_reading,
        520
    );
    // Store-assigned transaction number starts at 1.
    assert_eq!(txn.number, 1);
}

#[test]
fn stale_reading_leaves_customer_untouched() {
    let eng = engine();
    let actor = admin();
    let customer = eng.registry.register_customer(actor, new_customer()).unwrap();

    let err = eng.billing.create_meter_sale(actor, customer.id, 500).unwrap_err();
    assert!(matches!(err, DomainError::InvalidMeterReading(_)));
    assert_eq!(
        eng.store.customer(customer.id).unwrap().unwrap().last_meter_reading,
        500
    );
    assert!(eng.store.audit_entries().unwrap().iter().all(|e| e.action != "sale.meter"));
}

#[test]
fn composite_sale_is_all_or_nothing() {
    let eng = engine();
    let actor = admin();
    let customer = eng.registry.register_customer(actor, new_customer()).unwrap();

    // "9kg" is not on the contract; the whole sale aborts, including the
    // valid meter component.
    let err = eng
        .billing
        .create_line_item_sale(
            actor,
            customer.id,
            vec![LineItemRequest {
                kind: LineItemKind::Cylinder,
                description: "9kg".to_string(),
                quantity: 1,
            }],
            Some(520),
        )
        .unwrap_err();
    assert!(matches!(err, DomainError::Validation(_)));
    assert_eq!(
        eng.store.customer(customer.id).unwrap().unwrap().last_meter_reading,
        500
    );

    let txn = eng
        .billing
        .create_line_item_sale(
            actor,
            customer.id,
            vec![
                LineItemRequest {
                    kind: LineItemKind::Cylinder,
                    description: "14kg".to_string(),
                    quantity: 2,
                },
                LineItemRequest {
                    kind: LineItemKind::Service,
                    description: "regulator check".to_string(),
                    quantity: 1,
                },
            ],
            Some(520),
        )
        .unwrap();
    assert_eq!(txn.total, Cents::new(4_000 + 5_000 + 1_000));
}

#[test]
fn invoices_number_sequentially_within_a_period() {
    let eng = engine();
    let actor = admin();
    let customer = eng.registry.register_customer(actor, new_customer()).unwrap();
    let period = BillingPeriod::new(2026, 1).unwrap();

    let t1 = eng.billing.create_meter_sale(actor, customer.id, 520).unwrap();
    let t2 = eng.billing.create_meter_sale(actor, customer.id, 540).unwrap();

    let i1 = eng.numbering.issue(actor, t1.id, period).unwrap();
    let i2 = eng.numbering.issue(actor, t2.id, period).unwrap();

    assert_eq!(i1.number.to_string(), "INV-202601-00001");
    assert_eq!(i2.number.to_string(), "INV-202601-00002");

    // 10% GST frozen at issuance.
    assert_eq!(i1.subtotal, Cents::new(4_000));
    assert_eq!(i1.gst, Cents::new(400));
    assert_eq!(i1.total, Cents::new(4_400));
}

#[test]
fn second_issuance_for_a_transaction_is_a_conflict() {
    let eng = engine();
    let actor = admin();
    let customer = eng.registry.register_customer(actor, new_customer()).unwrap();
    let period = BillingPeriod::new(2026, 1).unwrap();
    let txn = eng.billing.create_meter_sale(actor, customer.id, 520).unwrap();

    eng.numbering.issue(actor, txn.id, period).unwrap();
    let err = eng.numbering.issue(actor, txn.id, period).unwrap_err();
    assert!(matches!(err, DomainError::Conflict(_)));
    assert_eq!(eng.store.max_invoice_seq(&period).unwrap(), 1);
}

#[test]
fn issued_invoice_keeps_its_rate_when_the_prevailing_rate_changes() {
    let store = Arc::new(InMemoryStore::new());
    let locks = Arc::new(LockRegistry::new(Duration::from_secs(5)));
    let registry = RegistryService::new(store.clone());
    let billing = BillingService::new(store.clone(), locks.clone());
    let actor = admin();
    let customer = registry.register_customer(actor, new_customer()).unwrap();
    let period = BillingPeriod::new(2026, 1).unwrap();

    let old = InvoiceNumberingService::new(
        store.clone(),
        locks.clone(),
        TaxRate::from_basis_points(1_000).unwrap(),
    );
    let t1 = billing.create_meter_sale(actor, customer.id, 520).unwrap();
    let invoice = old.issue(actor, t1.id, period).unwrap();

    // Rate moves to 12%; the already-issued invoice is untouched.
    let new = InvoiceNumberingService::new(store.clone(), locks, TaxRate::from_basis_points(1_200).unwrap());
    let t2 = billing.create_meter_sale(actor, customer.id, 540).unwrap();
    let later = new.issue(actor, t2.id, period).unwrap();

    let stored = store.invoice_for(t1.id).unwrap().unwrap();
    assert_eq!(stored, invoice);
    assert_eq!(stored.gst, Cents::new(400));
    assert_eq!(later.gst, Cents::new(480));
}

#[test]
fn concurrent_movements_on_one_key_serialize() {
    let eng = engine();
    let actor = admin();
    let depot = eng.registry.register_depot(actor, "D1").unwrap();
    eng.distribution
        .execute(actor, depot.id, "14kg", 1_000, MovementKind::EmptyReturn)
        .unwrap();

    let distribution = Arc::new(eng.distribution);
    let mut handles = Vec::new();
    for _ in 0..8 {
        let distribution = distribution.clone();
        handles.push(thread::spawn(move || {
            for _ in 0..25 {
                distribution
                    .execute(admin(), depot.id, "14kg", 1, MovementKind::Collection)
                    .unwrap();
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    let key = StockKey::new(depot.id, "14kg").unwrap();
    assert_eq!(eng.store.stock_quantity(&key).unwrap(), 1_000 - 200);

    // Ledger sequence numbers are gapless and strictly increasing.
    let mut seqs: Vec<u64> = eng.store.distributions().unwrap().iter().map(|d| d.seq).collect();
    seqs.sort_unstable();
    assert_eq!(seqs, (1..=201).collect::<Vec<u64>>());
}

#[test]
fn concurrent_issuance_never_duplicates_numbers() {
    let eng = engine();
    let actor = admin();
    let customer = eng.registry.register_customer(actor, new_customer()).unwrap();
    let period = BillingPeriod::new(2026, 1).unwrap();

    let mut txns = Vec::new();
    for i in 0..100u64 {
        txns.push(
            eng.billing
                .create_meter_sale(actor, customer.id, 501 + i)
                .unwrap(),
        );
    }

    let numbering = Arc::new(eng.numbering);
    let mut handles = Vec::new();
    for txn in txns {
        let numbering = numbering.clone();
        handles.push(thread::spawn(move || {
            numbering.issue(admin(), txn.id, period).unwrap().number
        }));
    }
    let mut seqs: Vec<u32> = handles
        .into_iter()
        .map(|h| h.join().unwrap().seq)
        .collect();
    seqs.sort_unstable();
    assert_eq!(seqs, (1..=100).collect::<Vec<u32>>());
}

#[test]
fn every_committed_mutation_carries_an_audit_entry() {
    let eng = engine();
    let actor = admin();

    let depot = eng.registry.register_depot(actor, "D1").unwrap();
    let customer = eng.registry.register_customer(actor, new_customer()).unwrap();
    eng.distribution
        .execute(actor, depot.id, "14kg", 100, MovementKind::EmptyReturn)
        .unwrap();
    let txn = eng.billing.create_meter_sale(actor, customer.id, 520).unwrap();
    eng.billing.mark_paid(actor, txn.id).unwrap();
    eng.numbering
        .issue(actor, txn.id, BillingPeriod::new(2026, 1).unwrap())
        .unwrap();

    let entries = eng.store.audit_entries().unwrap();
    assert_eq!(entries.len(), 6);
    let actions: Vec<&str> = entries.iter().map(|e| e.action.as_str()).collect();
    assert_eq!(
        actions,
        [
            "depot.registered",
            "customer.registered",
            "distribution.empty_return",
            "sale.meter",
            "transaction.paid",
            "invoice.issued",
        ]
    );
}

#[test]
fn duplicate_submission_commits_exactly_one_transaction() {
    let eng = engine();
    let actor = admin();
    let customer = eng.registry.register_customer(actor, new_customer()).unwrap();
    let coordinator = IdempotencyCoordinator::new(chrono::Duration::hours(24));

    let key = IdempotencyKey::new("client-7f3a").unwrap();
    let fingerprint = || {
        OperationFingerprint::of(
            "sale.meter",
            &json!({"customer_id": customer.id, "latest_reading": 520}),
        )
    };

    let first = coordinator
        .submit(&key, fingerprint(), || {
            eng.billing.create_meter_sale(actor, customer.id, 520)
        })
        .unwrap();
    let replay = coordinator
        .submit(&key, fingerprint(), || {
            eng.billing.create_meter_sale(actor, customer.id, 520)
        })
        .unwrap();

    assert_eq!(first.id, replay.id);
    assert_eq!(first.number, replay.number);
    // A bare retry without the key would have failed anyway (stale reading),
    // but the replay never re-executed at all: one sale audited, one reading
    // advance.
    let sales = eng
        .store
        .audit_entries()
        .unwrap()
        .iter()
        .filter(|e| e.action == "sale.meter")
        .count();
    assert_eq!(sales, 1);
    assert_eq!(
        eng.store.customer(customer.id).unwrap().unwrap().last_meter_reading,
        520
    );
}

#[test]
fn mark_paid_races_resolve_to_exactly_one_winner() {
    let eng = engine();
    let actor = admin();
    let customer = eng.registry.register_customer(actor, new_customer()).unwrap();
    let txn = eng.billing.create_meter_sale(actor, customer.id, 520).unwrap();

    let billing = Arc::new(eng.billing);
    let mut handles = Vec::new();
    for _ in 0..4 {
        let billing = billing.clone();
        let id = txn.id;
        handles.push(thread::spawn(move || billing.mark_paid(admin(), id)));
    }
    let outcomes: Vec<Result<(), DomainError>> =
        handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(outcomes.iter().filter(|o| o.is_ok()).count(), 1);
    assert!(outcomes
        .iter()
        .filter_map(|o| o.as_ref().err())
        .all(|e| matches!(e, DomainError::Conflict(_))));
    assert!(eng.store.transaction(txn.id).unwrap().unwrap().paid);
}

/// Store wrapper whose sequence read can be cut off while everything else
/// stays reachable — the shape of a connection dropping mid-operation.
struct OutageStore {
    inner: InMemoryStore,
    sequence_read_down: AtomicBool,
}

impl CoreStore for OutageStore {
    fn depot(&self, id: DepotId) -> Result<Option<Depot>, DomainError> {
        self.inner.depot(id)
    }
    fn depot_by_code(&self, code: &str) -> Result<Option<Depot>, DomainError> {
        self.inner.depot_by_code(code)
    }
    fn stock_quantity(&self, key: &StockKey) -> Result<i64, DomainError> {
        self.inner.stock_quantity(key)
    }
    fn depot_stock(&self, depot_id: DepotId) -> Result<Vec<(String, i64)>, DomainError> {
        self.inner.depot_stock(depot_id)
    }
    fn customer(&self, id: CustomerId) -> Result<Option<Customer>, DomainError> {
        self.inner.customer(id)
    }
    fn transaction(&self, id: TransactionId) -> Result<Option<Transaction>, DomainError> {
        self.inner.transaction(id)
    }
    fn invoice_for(&self, transaction_id: TransactionId) -> Result<Option<Invoice>, DomainError> {
        self.inner.invoice_for(transaction_id)
    }
    fn max_invoice_seq(&self, period: &BillingPeriod) -> Result<u32, DomainError> {
        if self.sequence_read_down.load(Ordering::SeqCst) {
            return Err(DomainError::unavailable("connection refused"));
        }
        self.inner.max_invoice_seq(period)
    }
    fn distributions(&self) -> Result<Vec<Distribution>, DomainError> {
        self.inner.distributions()
    }
    fn audit_entries(&self) -> Result<Vec<AuditLogEntry>, DomainError> {
        self.inner.audit_entries()
    }
    fn apply(&self, batch: WriteBatch) -> Result<Applied, DomainError> {
        self.inner.apply(batch)
    }
}

#[test]
fn unreadable_sequence_is_retryable_never_an_integrity_error() {
    let store = Arc::new(OutageStore {
        inner: InMemoryStore::new(),
        sequence_read_down: AtomicBool::new(false),
    });
    let locks = Arc::new(LockRegistry::new(Duration::from_secs(5)));
    let registry = RegistryService::new(store.clone());
    let billing = BillingService::new(store.clone(), locks.clone());
    let numbering = InvoiceNumberingService::new(
        store.clone(),
        locks,
        TaxRate::from_basis_points(1_000).unwrap(),
    );
    let actor = admin();
    let period = BillingPeriod::new(2026, 1).unwrap();

    let customer = registry.register_customer(actor, new_customer()).unwrap();
    let t1 = billing.create_meter_sale(actor, customer.id, 520).unwrap();
    let t2 = billing.create_meter_sale(actor, customer.id, 540).unwrap();
    numbering.issue(actor, t1.id, period).unwrap();

    // Outage at the worst moment: if the failed read were reported as
    // "no invoices yet", seq 1 would be handed out a second time and the
    // caller would see a duplicate-number integrity failure.
    store.sequence_read_down.store(true, Ordering::SeqCst);
    let err = numbering.issue(actor, t2.id, period).unwrap_err();
    assert!(matches!(err, DomainError::Unavailable(_)));
    assert!(err.is_retryable());
    assert!(store.invoice_for(t2.id).unwrap().is_none());

    // Recovery: the same command retried allocates the next number cleanly.
    store.sequence_read_down.store(false, Ordering::SeqCst);
    let invoice = numbering.issue(actor, t2.id, period).unwrap();
    assert_eq!(invoice.number.to_string(), "INV-202601-00002");
}
