use serde::{Deserialize, Serialize};

use stockmove_core::{DomainError, ProductId};

/// One product entry within a transfer request, carrying its quantity chain.
///
/// Invariant, at all times:
/// `0 <= received + shortage <= shipped <= approved <= requested`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferLine {
    pub line_no: u32,
    pub product_id: ProductId,
    /// Cost per unit in minor currency units, captured when the line was added.
    pub unit_cost: i64,
    pub requested_quantity: i64,
    pub approved_quantity: i64,
    pub shipped_quantity: i64,
    pub received_quantity: i64,
    /// Shipped units the receiver declared lost when closing the receipt.
    pub shortage_quantity: i64,
    /// Transferable stock at the source when the line was added. Display only.
    pub source_available_stock: Option<i64>,
}

impl TransferLine {
    pub fn new(
        line_no: u32,
        product_id: ProductId,
        requested_quantity: i64,
        unit_cost: i64,
        source_available_stock: Option<i64>,
    ) -> Self {
        Self {
            line_no,
            product_id,
            unit_cost,
            requested_quantity,
            approved_quantity: 0,
            shipped_quantity: 0,
            received_quantity: 0,
            shortage_quantity: 0,
            source_available_stock,
        }
    }

    /// Shipped but not received: loss, damage or shortfall found at receiving.
    pub fn issue_quantity(&self) -> i64 {
        self.shipped_quantity - self.received_quantity
    }

    /// Shipped units not yet received nor written off as shortage.
    pub fn outstanding_quantity(&self) -> i64 {
        self.shipped_quantity - self.received_quantity - self.shortage_quantity
    }

    /// Every shipped unit is accounted for.
    pub fn is_reconciled(&self) -> bool {
        self.outstanding_quantity() == 0
    }

    /// `unit_cost * requested_quantity`, saturating at `i64::MAX`.
    pub fn estimated_value(&self) -> i64 {
        self.unit_cost.saturating_mul(self.requested_quantity)
    }

    pub fn check_quantity_chain(&self) -> Result<(), DomainError> {
        let chain = [
            ("received + shortage", self.received_quantity + self.shortage_quantity),
            ("shipped", self.shipped_quantity),
            ("approved", self.approved_quantity),
            ("requested", self.requested_quantity),
        ];

        if self.received_quantity < 0 || self.shortage_quantity < 0 {
            return Err(DomainError::invariant(format!(
                "line {}: received and shortage quantities cannot be negative",
                self.line_no
            )));
        }

        for pair in chain.windows(2) {
            let (lower_name, lower) = pair[0];
            let (upper_name, upper) = pair[1];
            if lower > upper {
                return Err(DomainError::invariant(format!(
                    "line {}: {lower_name} ({lower}) exceeds {upper_name} ({upper})",
                    self.line_no
                )));
            }
        }

        Ok(())
    }
}
