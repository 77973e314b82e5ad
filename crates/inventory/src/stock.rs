use serde::{Deserialize, Serialize};
use thiserror::Error;

use stockmove_core::{LocationId, ProductId};

/// Ledger key: one counter pair per product per location.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StockKey {
    pub location_id: LocationId,
    pub product_id: ProductId,
}

impl StockKey {
    pub fn new(location_id: LocationId, product_id: ProductId) -> Self {
        Self {
            location_id,
            product_id,
        }
    }
}

/// Stock counters for one product at one location.
///
/// `reserved` is stock promised to approved transfers that has not left the
/// building yet. Transferable stock is what is on hand and not reserved.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLevel {
    pub on_hand: i64,
    pub reserved: i64,
}

impl StockLevel {
    pub fn new(on_hand: i64) -> Self {
        Self {
            on_hand,
            reserved: 0,
        }
    }

    /// Stock that can still be promised to a transfer.
    pub fn available(&self) -> i64 {
        (self.on_hand - self.reserved).max(0)
    }

    /// Compute the level after `movement`, or explain why it cannot happen.
    ///
    /// Rules:
    /// - on hand never goes negative
    /// - reservations never go negative
    /// - a movement that adds a reservation may only reserve available stock,
    ///   except a compensation restoring a reservation it just dropped
    pub fn apply(&self, movement: &StockMovement) -> Result<StockLevel, StockError> {
        let on_hand = self
            .on_hand
            .checked_add(movement.on_hand_delta)
            .ok_or(StockError::Overflow { key: movement.key })?;
        let reserved = self
            .reserved
            .checked_add(movement.reserved_delta)
            .ok_or(StockError::Overflow { key: movement.key })?;

        let promises_more =
            movement.reserved_delta > 0 && movement.kind != MovementKind::Compensation;
        if promises_more && movement.reserved_delta > self.available() {
            return Err(StockError::Insufficient {
                key: movement.key,
                requested: movement.reserved_delta,
                available: self.available(),
            });
        }

        if on_hand < 0 {
            return Err(StockError::Insufficient {
                key: movement.key,
                requested: -movement.on_hand_delta,
                available: self.on_hand,
            });
        }

        if reserved < 0 {
            return Err(StockError::ReservationUnderflow {
                key: movement.key,
                requested: -movement.reserved_delta,
                reserved: self.reserved,
            });
        }

        Ok(StockLevel { on_hand, reserved })
    }
}

/// Why a movement happened (carried for logging and audit).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    /// Stock promised to an approved transfer.
    Reserve,
    /// A promise withdrawn (cancellation, unshipped remainder).
    Release,
    /// Goods leaving the source location.
    Dispatch,
    /// Goods arriving at the destination location.
    Receipt,
    /// Unrelated correction (sale, count, damage write-off).
    Adjustment,
    /// Undo of a movement whose surrounding transition failed to commit.
    Compensation,
}

/// A change to one stock counter pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMovement {
    pub key: StockKey,
    pub kind: MovementKind,
    pub on_hand_delta: i64,
    pub reserved_delta: i64,
}

impl StockMovement {
    pub fn reserve(location_id: LocationId, product_id: ProductId, quantity: i64) -> Self {
        Self {
            key: StockKey::new(location_id, product_id),
            kind: MovementKind::Reserve,
            on_hand_delta: 0,
            reserved_delta: quantity,
        }
    }

    pub fn release(location_id: LocationId, product_id: ProductId, quantity: i64) -> Self {
        Self {
            key: StockKey::new(location_id, product_id),
            kind: MovementKind::Release,
            on_hand_delta: 0,
            reserved_delta: -quantity,
        }
    }

    /// Ship `quantity` out and drop the whole `reservation` held for it.
    pub fn dispatch(
        location_id: LocationId,
        product_id: ProductId,
        quantity: i64,
        reservation: i64,
    ) -> Self {
        Self {
            key: StockKey::new(location_id, product_id),
            kind: MovementKind::Dispatch,
            on_hand_delta: -quantity,
            reserved_delta: -reservation,
        }
    }

    pub fn receipt(location_id: LocationId, product_id: ProductId, quantity: i64) -> Self {
        Self {
            key: StockKey::new(location_id, product_id),
            kind: MovementKind::Receipt,
            on_hand_delta: quantity,
            reserved_delta: 0,
        }
    }

    pub fn adjustment(location_id: LocationId, product_id: ProductId, delta: i64) -> Self {
        Self {
            key: StockKey::new(location_id, product_id),
            kind: MovementKind::Adjustment,
            on_hand_delta: delta,
            reserved_delta: 0,
        }
    }

    /// The movement that exactly undoes this one.
    pub fn inverse(&self) -> Self {
        Self {
            key: self.key,
            kind: MovementKind::Compensation,
            on_hand_delta: -self.on_hand_delta,
            reserved_delta: -self.reserved_delta,
        }
    }

    pub fn is_noop(&self) -> bool {
        self.on_hand_delta == 0 && self.reserved_delta == 0
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StockError {
    #[error(
        "insufficient stock for product {} at location {}: requested {requested}, available {available}",
        .key.product_id,
        .key.location_id
    )]
    Insufficient {
        key: StockKey,
        requested: i64,
        available: i64,
    },

    #[error(
        "cannot release {requested} reserved units of product {} at location {} (reserved {reserved})",
        .key.product_id,
        .key.location_id
    )]
    ReservationUnderflow {
        key: StockKey,
        requested: i64,
        reserved: i64,
    },

    #[error("stock counter overflow for product {} at location {}", .key.product_id, .key.location_id)]
    Overflow { key: StockKey },
}
