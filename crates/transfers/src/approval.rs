//! Review of a submitted request: approve (fully, partially, or down to
//! nothing) or reject outright.

use std::collections::BTreeMap;

use stockmove_core::ProductId;

use crate::commands::{ApproveTransfer, LineQuantity, RejectTransfer};
use crate::error::{TransferError, TransferOperation};
use crate::events::{ApprovalRecorded, AutoReduction, TransferEvent, TransferRejected};
use crate::request::{TransferRequest, normalize_text};
use crate::status::TransferStatus;
use crate::validation::{ValidationIssue, ValidationResult};

impl TransferRequest {
    /// Decide approved quantities.
    ///
    /// Each line takes its proposal (or its requested quantity when none was
    /// given), clamped to `0..=requested`, then cut down to what is still
    /// available at the source. Lines sharing a product draw from the same
    /// remaining stock, in line order.
    pub(crate) fn handle_approve(
        &self,
        cmd: &ApproveTransfer,
    ) -> Result<Vec<TransferEvent>, TransferError> {
        self.ensure_exists(cmd.request_id)?;
        self.ensure_status(TransferOperation::Approve, &[TransferStatus::Submitted])?;
        self.ensure_structurally_valid()?;

        let mut result = ValidationResult::new();
        let proposals = self.index_line_quantities(&cmd.proposals, &mut result);
        for (line_no, quantity) in &proposals {
            if *quantity < 0 {
                result.error(ValidationIssue::line(
                    *line_no,
                    "approved quantity cannot be negative",
                ));
            }
        }
        if !result.is_valid() {
            return Err(result.into());
        }

        let mut remaining: BTreeMap<ProductId, i64> = cmd.live_stock.clone();
        let mut approved_lines = Vec::with_capacity(self.lines().len());
        let mut auto_reductions = Vec::new();

        for line in self.lines() {
            let proposed = proposals
                .get(&line.line_no)
                .copied()
                .unwrap_or(line.requested_quantity)
                .clamp(0, line.requested_quantity);

            let available = remaining.entry(line.product_id).or_insert(0);
            let approved = proposed.min((*available).max(0));
            if approved < proposed {
                auto_reductions.push(AutoReduction {
                    line_no: line.line_no,
                    product_id: line.product_id,
                    proposed,
                    approved,
                    available: (*available).max(0),
                });
            }
            *available -= approved;

            approved_lines.push((line.requested_quantity, LineQuantity::new(line.line_no, approved)));
        }

        let outcome = if approved_lines.iter().all(|(req, l)| l.quantity == *req) {
            TransferStatus::Approved
        } else if approved_lines.iter().all(|(_, l)| l.quantity == 0) {
            TransferStatus::Rejected
        } else {
            TransferStatus::PartiallyApproved
        };

        let rejection_reason = (outcome == TransferStatus::Rejected).then(|| {
            if auto_reductions.is_empty() {
                "no quantity approved for any line".to_string()
            } else {
                "insufficient stock at source for every line".to_string()
            }
        });

        Ok(vec![TransferEvent::ApprovalRecorded(ApprovalRecorded {
            request_id: cmd.request_id,
            outcome,
            lines: approved_lines.into_iter().map(|(_, l)| l).collect(),
            auto_reductions,
            expected_delivery_date: cmd.expected_delivery_date,
            notes: normalize_text(cmd.notes.as_deref()),
            rejection_reason,
            actor_id: cmd.actor_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    pub(crate) fn handle_reject(
        &self,
        cmd: &RejectTransfer,
    ) -> Result<Vec<TransferEvent>, TransferError> {
        self.ensure_exists(cmd.request_id)?;
        self.ensure_status(TransferOperation::Reject, &[TransferStatus::Submitted])?;

        let Some(reason) = normalize_text(Some(&cmd.reason)) else {
            return Err(TransferError::rejected(ValidationIssue::request(
                "a rejection reason is required",
            )));
        };

        Ok(vec![TransferEvent::TransferRejected(TransferRejected {
            request_id: cmd.request_id,
            reason,
            actor_id: cmd.actor_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}
