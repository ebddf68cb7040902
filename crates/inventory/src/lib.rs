//! `gasflow-inventory` — depots, stock movement math and distribution records.
//!
//! Pure domain: quantities and movement rules live here; the lock discipline
//! and atomic persistence live in `gasflow-engine`.

pub mod depot;
pub mod movement;

pub use depot::{Depot, StockKey};
pub use movement::{Distribution, MovementKind, StockLevel};
