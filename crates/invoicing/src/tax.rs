//! Tax rates in basis points.

use serde::{Deserialize, Serialize};

use gasflow_core::{Cents, DomainError};

/// A GST rate in basis points (1000 = 10%).
///
/// The prevailing rate is configuration; an invoice captures the value it was
/// issued under and never reads the live rate again.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaxRate(u32);

impl TaxRate {
    /// Rates above 100% are assumed to be configuration mistakes.
    pub fn from_basis_points(bp: u32) -> Result<Self, DomainError> {
        if bp > 10_000 {
            return Err(DomainError::validation(format!(
                "tax rate {bp}bp exceeds 100%"
            )));
        }
        Ok(Self(bp))
    }

    pub fn basis_points(&self) -> u32 {
        self.0
    }

    pub fn gst_on(&self, subtotal: Cents) -> Cents {
        subtotal.apply_basis_points(self.0)
    }
}

impl Default for TaxRate {
    /// The standard 10% GST.
    fn default() -> Self {
        Self(1_000)
    }
}
