//! Inventory domain module: stock counters per (location, product).
//!
//! Pure value types and rules only. The live ledger that holds these counters
//! and applies movements atomically lives in the infrastructure crate.

pub mod location;
pub mod stock;

pub use location::LocationType;
pub use stock::{MovementKind, StockError, StockKey, StockLevel, StockMovement};
