//! Goods receipt at the requesting location.
//!
//! Receipts are cumulative: each delivery adds to what earlier ones
//! recorded. A request is Received once every shipped unit is either
//! received or written off as shortage.

use crate::commands::{LineQuantity, ReceiveTransfer};
use crate::error::{TransferError, TransferOperation};
use crate::events::{GoodsReceived, TransferEvent};
use crate::request::{TransferRequest, normalize_text};
use crate::status::TransferStatus;
use crate::validation::{ValidationIssue, ValidationResult};

impl TransferRequest {
    /// Record a delivery.
    ///
    /// A token that was already recorded yields no events, whatever the
    /// current status, so a retried receipt is a no-op.
    pub(crate) fn handle_receive(
        &self,
        cmd: &ReceiveTransfer,
    ) -> Result<Vec<TransferEvent>, TransferError> {
        self.ensure_exists(cmd.request_id)?;

        let token = normalize_text(cmd.idempotency_token.as_deref());
        if let Some(token) = &token {
            if self.has_receipt(token) {
                return Ok(vec![]);
            }
        }

        self.ensure_status(
            TransferOperation::Receive,
            &[TransferStatus::InTransit, TransferStatus::PartiallyReceived],
        )?;

        let mut result = ValidationResult::new();
        let quantities = self.index_line_quantities(&cmd.quantities, &mut result);

        for (line_no, quantity) in &quantities {
            let Some(line) = self.line(*line_no) else {
                continue;
            };
            if *quantity < 0 {
                result.error(ValidationIssue::line(
                    *line_no,
                    "received quantity cannot be negative",
                ));
            } else if *quantity > line.outstanding_quantity() {
                result.error(ValidationIssue::line(
                    *line_no,
                    format!(
                        "cannot receive {quantity}: shipped {}, already received {}, written off {}",
                        line.shipped_quantity, line.received_quantity, line.shortage_quantity
                    ),
                ));
            }
        }

        if result.is_valid() && !cmd.close_with_shortage && quantities.values().all(|q| *q == 0) {
            result.error(ValidationIssue::request(
                "a receipt must record at least one unit",
            ));
        }
        if !result.is_valid() {
            return Err(result.into());
        }

        let mut lines = Vec::new();
        let mut shortages = Vec::new();
        let mut reconciled = true;

        for line in self.lines() {
            let received = quantities.get(&line.line_no).copied().unwrap_or(0);
            if received > 0 {
                lines.push(LineQuantity::new(line.line_no, received));
            }

            let outstanding = line.outstanding_quantity() - received;
            if outstanding > 0 {
                if cmd.close_with_shortage {
                    shortages.push(LineQuantity::new(line.line_no, outstanding));
                } else {
                    reconciled = false;
                }
            }
        }

        let outcome = if reconciled {
            TransferStatus::Received
        } else {
            TransferStatus::PartiallyReceived
        };

        Ok(vec![TransferEvent::GoodsReceived(GoodsReceived {
            request_id: cmd.request_id,
            outcome,
            lines,
            shortages,
            idempotency_token: token,
            notes: normalize_text(cmd.notes.as_deref()),
            actor_id: cmd.actor_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}
