//! Postgres-backed store implementation.
//!
//! Persists the same tables the in-memory store keeps, with the hard
//! integrity constraints enforced at the database level as well:
//!
//! | Constraint | Enforcement | Mapped error |
//! |------------|-------------|--------------|
//! | unique invoice number | unique index on `invoices.number` | `DuplicateInvoiceNumber` |
//! | one invoice per transaction | unique index on `invoices.transaction_id` | `Conflict` |
//! | unique depot code | unique index on `depots.code` | `Conflict` |
//! | non-negative stock | `CHECK (quantity >= 0)` | `InsufficientStock` |
//!
//! Sequence numbers come from a row-locked counters table, so they stay
//! gapless and monotonic even across processes.
//!
//! ## Threading
//!
//! [`CoreStore`] is a synchronous contract; the async pool work is bridged
//! through a captured runtime handle. Call trait methods from a blocking
//! thread (e.g. inside `spawn_blocking`) — tokio itself panics on an attempt
//! to block from within an async context.
//!
//! ## Deployment
//!
//! One engine process per database. Key locks and idempotency records live
//! in process memory, not in these tables; a second process sharing the
//! database would bypass both, and the constraints above would reject the
//! resulting collisions loudly instead of serializing them.
//!
//! ## Failure mapping
//!
//! A query that cannot reach the database fails the read with the retryable
//! `Unavailable` — it is never reported as an absent row, an empty listing,
//! or a zero sequence.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as JsonValue;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, Row, Transaction as PgTransaction};
use tokio::runtime::Handle;
use tracing::instrument;

use gasflow_audit::AuditLogEntry;
use gasflow_billing::{Customer, Transaction};
use gasflow_core::{CustomerId, DepotId, DomainError, TransactionId};
use gasflow_inventory::{Depot, Distribution, StockKey};
use gasflow_invoicing::{BillingPeriod, Invoice};

use super::{Applied, CoreStore, WriteBatch};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS depots (
    id UUID PRIMARY KEY,
    code TEXT NOT NULL UNIQUE,
    payload JSONB NOT NULL
);
CREATE TABLE IF NOT EXISTS stock_levels (
    depot_id UUID NOT NULL REFERENCES depots (id),
    equipment TEXT NOT NULL,
    quantity BIGINT NOT NULL CHECK (quantity >= 0),
    PRIMARY KEY (depot_id, equipment)
);
CREATE TABLE IF NOT EXISTS distributions (
    seq BIGINT PRIMARY KEY,
    payload JSONB NOT NULL
);
CREATE TABLE IF NOT EXISTS customers (
    id UUID PRIMARY KEY,
    payload JSONB NOT NULL
);
CREATE TABLE IF NOT EXISTS transactions (
    id UUID PRIMARY KEY,
    number BIGINT NOT NULL UNIQUE,
    payload JSONB NOT NULL
);
CREATE TABLE IF NOT EXISTS invoices (
    id UUID PRIMARY KEY,
    transaction_id UUID NOT NULL UNIQUE REFERENCES transactions (id),
    number TEXT NOT NULL UNIQUE,
    prefix TEXT NOT NULL,
    seq BIGINT NOT NULL,
    payload JSONB NOT NULL
);
CREATE TABLE IF NOT EXISTS audit_log (
    id UUID PRIMARY KEY,
    recorded_at TIMESTAMPTZ NOT NULL,
    payload JSONB NOT NULL
);
CREATE TABLE IF NOT EXISTS counters (
    name TEXT PRIMARY KEY,
    value BIGINT NOT NULL
);
INSERT INTO counters (name, value) VALUES ('distribution_seq', 0), ('transaction_number', 0)
ON CONFLICT (name) DO NOTHING;
"#;

/// Postgres-backed store.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
    runtime: Handle,
}

impl PostgresStore {
    /// Wrap an existing pool, capturing the runtime that will drive queries.
    pub fn new(pool: PgPool, runtime: Handle) -> Self {
        Self { pool, runtime }
    }

    /// Connect and ensure the schema exists.
    pub async fn connect(database_url: &str) -> Result<Self, DomainError> {
        let pool = PgPoolOptions::new()
            .max_connections(8)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        let runtime = Handle::try_current()
            .map_err(|_| DomainError::invariant("postgres store requires a tokio runtime"))?;
        let store = Self::new(pool, runtime);
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<(), DomainError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
        Ok(())
    }

    fn block_on<F: std::future::Future>(&self, fut: F) -> F::Output {
        self.runtime.block_on(fut)
    }

    async fn fetch_payload<T: DeserializeOwned>(
        &self,
        sql: &str,
        id: uuid::Uuid,
    ) -> Result<Option<T>, DomainError> {
        let row = sqlx::query(sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("fetch_payload", e))?;
        row.map(|r| decode_payload(&r)).transpose()
    }

    #[instrument(skip(self, batch), fields(audited = batch.audit.len()), err)]
    async fn apply_async(&self, batch: WriteBatch) -> Result<Applied, DomainError> {
        if batch.mutates_state() && batch.audit.is_empty() {
            return Err(DomainError::invariant(
                "refusing to commit a state mutation without an audit entry",
            ));
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin", e))?;
        let mut applied = Applied::default();

        for depot in &batch.depots {
            sqlx::query("INSERT INTO depots (id, code, payload) VALUES ($1, $2, $3)")
                .bind(depot.id.as_uuid())
                .bind(&depot.code)
                .bind(encode_payload(depot)?)
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("insert_depot", e))?;
        }

        for customer in &batch.customers {
            sqlx::query("INSERT INTO customers (id, payload) VALUES ($1, $2)")
                .bind(customer.id.as_uuid())
                .bind(encode_payload(customer)?)
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("insert_customer", e))?;
        }

        for (key, quantity) in &batch.stock_levels {
            if *quantity < 0 {
                return Err(DomainError::invariant(format!(
                    "stock for {key:?} would become negative"
                )));
            }
            sqlx::query(
                r#"
                INSERT INTO stock_levels (depot_id, equipment, quantity)
                VALUES ($1, $2, $3)
                ON CONFLICT (depot_id, equipment) DO UPDATE SET quantity = EXCLUDED.quantity
                "#,
            )
            .bind(key.depot_id.as_uuid())
            .bind(&key.equipment)
            .bind(quantity)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("upsert_stock_level", e))?;
        }

        for distribution in &batch.distributions {
            let mut distribution = distribution.clone();
            distribution.seq = next_counter(&mut tx, "distribution_seq").await?;
            sqlx::query("INSERT INTO distributions (seq, payload) VALUES ($1, $2)")
                .bind(distribution.seq as i64)
                .bind(encode_payload(&distribution)?)
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("insert_distribution", e))?;
            applied.distributions.push(distribution);
        }

        for txn in &batch.transactions {
            let mut txn = txn.clone();
            txn.number = next_counter(&mut tx, "transaction_number").await?;
            sqlx::query("INSERT INTO transactions (id, number, payload) VALUES ($1, $2, $3)")
                .bind(txn.id.as_uuid())
                .bind(txn.number as i64)
                .bind(encode_payload(&txn)?)
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("insert_transaction", e))?;
            applied.transactions.push(txn);
        }

        for (customer_id, reading) in &batch.meter_readings {
            let mut customer: Customer =
                lock_payload(&mut tx, "customers", *customer_id.as_uuid()).await?;
            customer.last_meter_reading = *reading;
            update_payload(&mut tx, "customers", *customer_id.as_uuid(), &customer).await?;
        }

        for transaction_id in &batch.paid_flags {
            let mut txn: Transaction =
                lock_payload(&mut tx, "transactions", *transaction_id.as_uuid()).await?;
            txn.mark_paid()?;
            update_payload(&mut tx, "transactions", *transaction_id.as_uuid(), &txn).await?;
        }

        for invoice in &batch.invoices {
            sqlx::query(
                r#"
                INSERT INTO invoices (id, transaction_id, number, prefix, seq, payload)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(invoice.id.as_uuid())
            .bind(invoice.transaction_id.as_uuid())
            .bind(invoice.number.to_string())
            .bind(invoice.number.period.prefix())
            .bind(i64::from(invoice.number.seq))
            .bind(encode_payload(invoice)?)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("insert_invoice", e))?;
        }

        for entry in &batch.audit {
            sqlx::query("INSERT INTO audit_log (id, recorded_at, payload) VALUES ($1, $2, $3)")
                .bind(entry.id)
                .bind(entry.recorded_at)
                .bind(encode_payload(entry)?)
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("insert_audit", e))?;
        }

        tx.commit().await.map_err(|e| map_sqlx_error("commit", e))?;
        Ok(applied)
    }
}

impl CoreStore for PostgresStore {
    fn depot(&self, id: DepotId) -> Result<Option<Depot>, DomainError> {
        self.block_on(self.fetch_payload("SELECT payload FROM depots WHERE id = $1", *id.as_uuid()))
    }

    fn depot_by_code(&self, code: &str) -> Result<Option<Depot>, DomainError> {
        self.block_on(async {
            let row = sqlx::query("SELECT payload FROM depots WHERE code = $1")
                .bind(code)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| map_sqlx_error("depot_by_code", e))?;
            row.map(|r| decode_payload(&r)).transpose()
        })
    }

    fn stock_quantity(&self, key: &StockKey) -> Result<i64, DomainError> {
        self.block_on(async {
            let row = sqlx::query(
                "SELECT quantity FROM stock_levels WHERE depot_id = $1 AND equipment = $2",
            )
            .bind(key.depot_id.as_uuid())
            .bind(&key.equipment)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("stock_quantity", e))?;
            match row {
                // Lazily-created row: absent genuinely means 0.
                None => Ok(0),
                Some(r) => r
                    .try_get("quantity")
                    .map_err(|e| DomainError::invariant(format!("stock row missing quantity: {e}"))),
            }
        })
    }

    fn depot_stock(&self, depot_id: DepotId) -> Result<Vec<(String, i64)>, DomainError> {
        self.block_on(async {
            let rows = sqlx::query(
                "SELECT equipment, quantity FROM stock_levels WHERE depot_id = $1 ORDER BY equipment",
            )
            .bind(depot_id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("depot_stock", e))?;
            rows.iter()
                .map(|r| {
                    Ok((
                        r.try_get("equipment").map_err(|e| {
                            DomainError::invariant(format!("stock row missing equipment: {e}"))
                        })?,
                        r.try_get("quantity").map_err(|e| {
                            DomainError::invariant(format!("stock row missing quantity: {e}"))
                        })?,
                    ))
                })
                .collect()
        })
    }

    fn customer(&self, id: CustomerId) -> Result<Option<Customer>, DomainError> {
        self.block_on(
            self.fetch_payload("SELECT payload FROM customers WHERE id = $1", *id.as_uuid()),
        )
    }

    fn transaction(&self, id: TransactionId) -> Result<Option<Transaction>, DomainError> {
        self.block_on(
            self.fetch_payload("SELECT payload FROM transactions WHERE id = $1", *id.as_uuid()),
        )
    }

    fn invoice_for(&self, transaction_id: TransactionId) -> Result<Option<Invoice>, DomainError> {
        self.block_on(self.fetch_payload(
            "SELECT payload FROM invoices WHERE transaction_id = $1",
            *transaction_id.as_uuid(),
        ))
    }

    fn max_invoice_seq(&self, period: &BillingPeriod) -> Result<u32, DomainError> {
        self.block_on(async {
            let row = sqlx::query(
                "SELECT COALESCE(MAX(seq), 0) AS max_seq FROM invoices WHERE prefix = $1",
            )
            .bind(period.prefix())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("max_invoice_seq", e))?;
            let max: i64 = row
                .try_get("max_seq")
                .map_err(|e| DomainError::invariant(format!("max_seq missing: {e}")))?;
            Ok(max as u32)
        })
    }

    fn distributions(&self) -> Result<Vec<Distribution>, DomainError> {
        self.block_on(async {
            let rows = sqlx::query("SELECT payload FROM distributions ORDER BY seq")
                .fetch_all(&self.pool)
                .await
                .map_err(|e| map_sqlx_error("distributions", e))?;
            rows.iter().map(decode_payload).collect()
        })
    }

    fn audit_entries(&self) -> Result<Vec<AuditLogEntry>, DomainError> {
        self.block_on(async {
            let rows = sqlx::query("SELECT payload FROM audit_log ORDER BY recorded_at, id")
                .fetch_all(&self.pool)
                .await
                .map_err(|e| map_sqlx_error("audit_entries", e))?;
            rows.iter().map(decode_payload).collect()
        })
    }

    fn apply(&self, batch: WriteBatch) -> Result<Applied, DomainError> {
        self.block_on(self.apply_async(batch))
    }
}

async fn next_counter(
    tx: &mut PgTransaction<'_, Postgres>,
    name: &str,
) -> Result<u64, DomainError> {
    let row = sqlx::query(
        "UPDATE counters SET value = value + 1 WHERE name = $1 RETURNING value",
    )
    .bind(name)
    .fetch_one(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("next_counter", e))?;
    let value: i64 = row
        .try_get("value")
        .map_err(|e| DomainError::invariant(format!("counter row missing value: {e}")))?;
    Ok(value as u64)
}

async fn lock_payload<T: DeserializeOwned>(
    tx: &mut PgTransaction<'_, Postgres>,
    table: &str,
    id: uuid::Uuid,
) -> Result<T, DomainError> {
    let sql = format!("SELECT payload FROM {table} WHERE id = $1 FOR UPDATE");
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("lock_payload", e))?
        .ok_or(DomainError::NotFound)?;
    decode_payload(&row)
}

async fn update_payload<T: Serialize>(
    tx: &mut PgTransaction<'_, Postgres>,
    table: &str,
    id: uuid::Uuid,
    value: &T,
) -> Result<(), DomainError> {
    let sql = format!("UPDATE {table} SET payload = $2 WHERE id = $1");
    sqlx::query(&sql)
        .bind(id)
        .bind(encode_payload(value)?)
        .execute(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("update_payload", e))?;
    Ok(())
}

fn encode_payload<T: Serialize>(value: &T) -> Result<JsonValue, DomainError> {
    serde_json::to_value(value)
        .map_err(|e| DomainError::invariant(format!("failed to encode payload: {e}")))
}

fn decode_payload<T: DeserializeOwned>(row: &sqlx::postgres::PgRow) -> Result<T, DomainError> {
    let payload: JsonValue = row
        .try_get("payload")
        .map_err(|e| DomainError::invariant(format!("row missing payload: {e}")))?;
    serde_json::from_value(payload)
        .map_err(|e| DomainError::invariant(format!("failed to decode payload: {e}")))
}

/// Map a SQLx error onto the domain error model.
///
/// Unique violations are dispatched by constraint name: the invoice-number
/// index maps to the fatal `DuplicateInvoiceNumber`, every other uniqueness
/// clash is an ordinary conflict. Check violations on stock quantity map to
/// `InsufficientStock` so the adapter agrees with the in-memory store.
/// Connection-level failures map to the retryable `Unavailable`.
fn map_sqlx_error(operation: &str, e: sqlx::Error) -> DomainError {
    if let sqlx::Error::Database(db) = &e {
        match db.code().as_deref() {
            Some("23505") => {
                return match db.constraint() {
                    Some("invoices_number_key") => DomainError::DuplicateInvoiceNumber(
                        "invoice number already exists".to_string(),
                    ),
                    Some(constraint) => {
                        DomainError::conflict(format!("unique violation on {constraint}"))
                    }
                    None => DomainError::conflict("unique violation"),
                };
            }
            Some("23514") => {
                return DomainError::insufficient_stock("stock quantity check failed");
            }
            Some("23503") => {
                return DomainError::NotFound;
            }
            _ => {}
        }
    }
    match e {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => DomainError::unavailable(format!("{operation}: {e}")),
        _ => DomainError::invariant(format!("{operation}: {e}")),
    }
}
