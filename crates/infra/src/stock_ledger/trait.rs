use std::sync::Arc;

use thiserror::Error;

use stockmove_core::{LocationId, ProductId};
use stockmove_inventory::{StockError, StockKey, StockLevel, StockMovement};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StockLedgerError {
    /// A movement would break a counter rule; nothing was applied.
    #[error(transparent)]
    Stock(#[from] StockError),

    #[error("stock ledger unavailable: {0}")]
    Unavailable(String),
}

/// Outcome of one entry of [`StockLedger::reserve_available`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReservationGrant {
    pub key: StockKey,
    pub requested: i64,
    pub granted: i64,
    /// Transferable stock just before this entry was granted.
    pub available: i64,
}

impl ReservationGrant {
    /// The reservation this grant applied.
    pub fn movement(&self) -> StockMovement {
        StockMovement::reserve(self.key.location_id, self.key.product_id, self.granted)
    }

    pub fn is_reduced(&self) -> bool {
        self.granted < self.requested
    }
}

/// Stock counters with an all-or-nothing batch mutation.
///
/// `apply` checks and mutates under the ledger's own lock, so a batch never
/// interleaves with another writer. Unknown keys read as zero stock.
pub trait StockLedger: Send + Sync {
    fn level(&self, key: StockKey) -> Result<StockLevel, StockLedgerError>;

    /// Apply every movement or none of them.
    fn apply(&self, movements: &[StockMovement]) -> Result<(), StockLedgerError>;

    /// Reserve each `(key, quantity)` in order, cut down to whatever is
    /// still transferable, under the same lock as `apply`. Entries on the
    /// same key draw from one shrinking pool. Negative quantities reserve
    /// nothing.
    fn reserve_available(&self, requests: &[(StockKey, i64)]) -> Result<Vec<ReservationGrant>, StockLedgerError>;

    /// Transferable stock (on hand and not reserved).
    fn available(&self, location_id: LocationId, product_id: ProductId) -> Result<i64, StockLedgerError> {
        Ok(self.level(StockKey::new(location_id, product_id))?.available())
    }

    /// Unrelated correction (sale, count, write-off) outside any transfer.
    fn adjust(
        &self,
        location_id: LocationId,
        product_id: ProductId,
        delta: i64,
    ) -> Result<StockLevel, StockLedgerError> {
        self.apply(&[StockMovement::adjustment(location_id, product_id, delta)])?;
        self.level(StockKey::new(location_id, product_id))
    }

    /// Undo a batch previously applied, last movement first.
    fn revert(&self, movements: &[StockMovement]) -> Result<(), StockLedgerError> {
        let inverse: Vec<StockMovement> = movements.iter().rev().map(StockMovement::inverse).collect();
        self.apply(&inverse)
    }
}

impl<L> StockLedger for Arc<L>
where
    L: StockLedger + ?Sized,
{
    fn level(&self, key: StockKey) -> Result<StockLevel, StockLedgerError> {
        (**self).level(key)
    }

    fn apply(&self, movements: &[StockMovement]) -> Result<(), StockLedgerError> {
        (**self).apply(movements)
    }

    fn reserve_available(&self, requests: &[(StockKey, i64)]) -> Result<Vec<ReservationGrant>, StockLedgerError> {
        (**self).reserve_available(requests)
    }
}
