//! Stock counters per (location, product), the inventory boundary the
//! transfer workflow reads and mutates.

pub mod in_memory;
pub mod r#trait;

pub use in_memory::InMemoryStockLedger;
pub use r#trait::{ReservationGrant, StockLedger, StockLedgerError};
