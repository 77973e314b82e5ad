//! Stock consequences of transfer events.
//!
//! | event                                 | source              | destination |
//! |---------------------------------------|---------------------|-------------|
//! | approval (approved > 0)               | reserve approved    |             |
//! | shipment                              | dispatch, release   |             |
//! | receipt                               |                     | on hand +   |
//! | cancel from Approved/PartiallyApproved| release reservation |             |
//!
//! Cancelling after shipment moves nothing: dispatched goods are not
//! pulled back.

use stockmove_inventory::StockMovement;

use crate::events::TransferEvent;
use crate::request::TransferRequest;

/// Movements implied by `event`, given the request state `before` it.
///
/// Empty for events with no stock effect, and for a request whose locations
/// are unknown (never created).
pub fn stock_movements(before: &TransferRequest, event: &TransferEvent) -> Vec<StockMovement> {
    let (Some(source), Some(destination)) =
        (before.source_location_id(), before.requesting_location_id())
    else {
        return Vec::new();
    };

    let mut movements: Vec<StockMovement> = match event {
        TransferEvent::ApprovalRecorded(e) => e
            .lines
            .iter()
            .filter_map(|approved| {
                let line = before.line(approved.line_no)?;
                Some(StockMovement::reserve(source, line.product_id, approved.quantity))
            })
            .collect(),
        TransferEvent::TransferShipped(e) => e
            .lines
            .iter()
            .filter_map(|shipped| {
                let line = before.line(shipped.line_no)?;
                Some(StockMovement::dispatch(
                    source,
                    line.product_id,
                    shipped.quantity,
                    line.approved_quantity,
                ))
            })
            .collect(),
        TransferEvent::GoodsReceived(e) => e
            .lines
            .iter()
            .filter_map(|received| {
                let line = before.line(received.line_no)?;
                Some(StockMovement::receipt(destination, line.product_id, received.quantity))
            })
            .collect(),
        TransferEvent::TransferCancelled(e) if e.previous_status.is_approved() => before
            .lines()
            .iter()
            .map(|line| StockMovement::release(source, line.product_id, line.approved_quantity))
            .collect(),
        _ => Vec::new(),
    };

    movements.retain(|m| !m.is_noop());
    movements
}
