//! Environment-driven runtime configuration.

use std::time::Duration;

use gasflow_invoicing::TaxRate;

/// Runtime configuration, read once at startup.
///
/// | Variable | Default | Meaning |
/// |----------|---------|---------|
/// | `GASFLOW_ADDR` | `0.0.0.0:8080` | Listen address |
/// | `GASFLOW_TAX_RATE_BP` | `1000` | Prevailing GST rate in basis points |
/// | `GASFLOW_LOCK_TIMEOUT_MS` | `2000` | Key-lock wait budget |
/// | `GASFLOW_IDEMPOTENCY_TTL_HOURS` | `24` | Idempotency key validity window |
/// | `GASFLOW_DATABASE_URL` | unset | Postgres URL (only with the `postgres` feature) |
#[derive(Debug, Clone)]
pub struct Config {
    pub addr: String,
    pub tax_rate: TaxRate,
    pub lock_timeout: Duration,
    pub idempotency_ttl: chrono::Duration,
    pub database_url: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:8080".to_string(),
            // 10% GST.
            tax_rate: TaxRate::default(),
            lock_timeout: Duration::from_millis(2_000),
            idempotency_ttl: chrono::Duration::hours(24),
            database_url: None,
        }
    }
}

impl Config {
    /// Read configuration from the environment, falling back to dev defaults
    /// (with a warning) on missing or malformed values.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let addr = std::env::var("GASFLOW_ADDR").unwrap_or(defaults.addr);

        let tax_rate = match parsed_env::<u32>("GASFLOW_TAX_RATE_BP") {
            Some(bp) => TaxRate::from_basis_points(bp).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "invalid GASFLOW_TAX_RATE_BP; using default");
                defaults.tax_rate
            }),
            None => defaults.tax_rate,
        };

        let lock_timeout = parsed_env::<u64>("GASFLOW_LOCK_TIMEOUT_MS")
            .map(Duration::from_millis)
            .unwrap_or(defaults.lock_timeout);

        let idempotency_ttl = parsed_env::<i64>("GASFLOW_IDEMPOTENCY_TTL_HOURS")
            .map(chrono::Duration::hours)
            .unwrap_or(defaults.idempotency_ttl);

        let database_url = std::env::var("GASFLOW_DATABASE_URL").ok();

        Self {
            addr,
            tax_rate,
            lock_timeout,
            idempotency_ttl,
            database_url,
        }
    }
}

fn parsed_env<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(var = name, value = raw, "malformed value; using default");
            None
        }
    }
}
