use std::collections::HashMap;
use std::sync::RwLock;

use stockmove_core::{LocationId, ProductId};
use stockmove_inventory::{StockKey, StockLevel, StockMovement};

use super::r#trait::{ReservationGrant, StockLedger, StockLedgerError};

/// In-memory stock ledger for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryStockLedger {
    levels: RwLock<HashMap<StockKey, StockLevel>>,
}

impl InMemoryStockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set on-hand stock, keeping any reservation (seeding, stock counts).
    pub fn set_on_hand(
        &self,
        location_id: LocationId,
        product_id: ProductId,
        on_hand: i64,
    ) -> Result<(), StockLedgerError> {
        let mut levels = self
            .levels
            .write()
            .map_err(|_| StockLedgerError::Unavailable("lock poisoned".to_string()))?;
        levels
            .entry(StockKey::new(location_id, product_id))
            .or_default()
            .on_hand = on_hand;
        Ok(())
    }

    /// Total on-hand units of `product_id` across every location.
    pub fn total_on_hand(&self, product_id: ProductId) -> Result<i64, StockLedgerError> {
        let levels = self
            .levels
            .read()
            .map_err(|_| StockLedgerError::Unavailable("lock poisoned".to_string()))?;
        Ok(levels
            .iter()
            .filter(|(k, _)| k.product_id == product_id)
            .map(|(_, l)| l.on_hand)
            .sum())
    }
}

impl StockLedger for InMemoryStockLedger {
    fn level(&self, key: StockKey) -> Result<StockLevel, StockLedgerError> {
        let levels = self
            .levels
            .read()
            .map_err(|_| StockLedgerError::Unavailable("lock poisoned".to_string()))?;
        Ok(levels.get(&key).copied().unwrap_or_default())
    }

    fn apply(&self, movements: &[StockMovement]) -> Result<(), StockLedgerError> {
        let mut levels = self
            .levels
            .write()
            .map_err(|_| StockLedgerError::Unavailable("lock poisoned".to_string()))?;

        // Stage every change first; commit only if the whole batch is valid.
        let mut staged: HashMap<StockKey, StockLevel> = HashMap::new();
        for movement in movements {
            let current = staged
                .get(&movement.key)
                .or_else(|| levels.get(&movement.key))
                .copied()
                .unwrap_or_default();
            staged.insert(movement.key, current.apply(movement)?);
        }

        levels.extend(staged);
        Ok(())
    }

    fn reserve_available(&self, requests: &[(StockKey, i64)]) -> Result<Vec<ReservationGrant>, StockLedgerError> {
        let mut levels = self
            .levels
            .write()
            .map_err(|_| StockLedgerError::Unavailable("lock poisoned".to_string()))?;

        let mut staged: HashMap<StockKey, StockLevel> = HashMap::new();
        let mut grants = Vec::with_capacity(requests.len());
        for &(key, requested) in requests {
            let current = staged
                .get(&key)
                .or_else(|| levels.get(&key))
                .copied()
                .unwrap_or_default();
            let available = current.available();
            let grant = ReservationGrant {
                key,
                requested,
                granted: requested.min(available).max(0),
                available,
            };
            staged.insert(key, current.apply(&grant.movement())?);
            grants.push(grant);
        }

        levels.extend(staged);
        Ok(grants)
    }
}
