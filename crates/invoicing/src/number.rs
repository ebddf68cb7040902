//! Billing periods and invoice numbers.

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

use gasflow_core::DomainError;

/// Issuance period: the numbering prefix is scoped to a calendar month.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct BillingPeriod {
    year: i32,
    month: u32,
}

impl BillingPeriod {
    pub fn new(year: i32, month: u32) -> Result<Self, DomainError> {
        if !(1..=12).contains(&month) {
            return Err(DomainError::validation(format!("invalid month {month}")));
        }
        if !(2000..=9999).contains(&year) {
            return Err(DomainError::validation(format!("invalid year {year}")));
        }
        Ok(Self { year, month })
    }

    /// Period containing the given instant (UTC).
    pub fn containing(at: DateTime<Utc>) -> Self {
        Self {
            year: at.year(),
            month: at.month(),
        }
    }

    /// Numbering prefix, e.g. "202601".
    pub fn prefix(&self) -> String {
        format!("{:04}{:02}", self.year, self.month)
    }

    /// Lock-key string for the per-prefix sequence lock.
    pub fn lock_key(&self) -> String {
        format!("invseq/{}", self.prefix())
    }
}

impl core::fmt::Display for BillingPeriod {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:04}{:02}", self.year, self.month)
    }
}

/// A formatted invoice identifier: unique overall, strictly increasing in
/// issuance order within its period. Gaps are legal; duplicates are not.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct InvoiceNumber {
    pub period: BillingPeriod,
    pub seq: u32,
}

impl InvoiceNumber {
    pub fn new(period: BillingPeriod, seq: u32) -> Result<Self, DomainError> {
        if seq == 0 {
            return Err(DomainError::validation("invoice sequence starts at 1"));
        }
        Ok(Self { period, seq })
    }

    pub fn next(&self) -> Self {
        Self {
            period: self.period,
            seq: self.seq + 1,
        }
    }
}

impl core::fmt::Display for InvoiceNumber {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "INV-{}-{:05}", self.period, self.seq)
    }
}
