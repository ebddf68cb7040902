//! Monetary amounts in the smallest currency unit.

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// An amount in the smallest currency unit (cents).
///
/// All pricing arithmetic is integer and checked; overflow is an invariant
/// violation, never a wrap.
#[derive(
    Debug, Default, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Cents(pub u64);

impl Cents {
    pub const ZERO: Cents = Cents(0);

    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    /// `self + other`, failing on overflow.
    pub fn checked_add(self, other: Cents) -> Result<Cents, DomainError> {
        self.0
            .checked_add(other.0)
            .map(Cents)
            .ok_or_else(|| DomainError::invariant("amount overflow"))
    }

    /// `rate × quantity`, failing on overflow.
    pub fn times(self, quantity: u64) -> Result<Cents, DomainError> {
        self.0
            .checked_mul(quantity)
            .map(Cents)
            .ok_or_else(|| DomainError::invariant("amount overflow"))
    }

    /// Apply a basis-point rate (e.g. GST), rounding down.
    ///
    /// Widened to u128 internally so `amount × bp` cannot overflow.
    pub fn apply_basis_points(self, bp: u32) -> Cents {
        let scaled = (self.0 as u128) * (bp as u128) / 10_000u128;
        // subtotal ≤ u64::MAX and bp ≤ 10_000 in practice keeps this in range;
        // saturate rather than panic if a pathological rate is configured.
        Cents(u64::try_from(scaled).unwrap_or(u64::MAX))
    }
}

impl core::fmt::Display for Cents {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}
