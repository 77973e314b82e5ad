use crate::commands::CancelTransfer;
use crate::error::{TransferError, TransferOperation};
use crate::events::{TransferCancelled, TransferEvent};
use crate::request::{TransferRequest, normalize_text};
use crate::validation::ValidationIssue;

impl TransferRequest {
    /// Cancel from any non-terminal status.
    ///
    /// Goods already dispatched are not pulled back; cancelling once stock
    /// is in motion therefore needs a reason for the audit trail.
    pub(crate) fn handle_cancel(
        &self,
        cmd: &CancelTransfer,
    ) -> Result<Vec<TransferEvent>, TransferError> {
        self.ensure_exists(cmd.request_id)?;

        let status = self.status();
        if status.is_terminal() {
            return Err(TransferError::invalid_transition(status, TransferOperation::Cancel));
        }

        let reason = normalize_text(cmd.reason.as_deref());
        if status.is_in_motion() && reason.is_none() {
            return Err(TransferError::rejected(ValidationIssue::request(
                "a reason is required to cancel a transfer that has already shipped",
            )));
        }

        Ok(vec![TransferEvent::TransferCancelled(TransferCancelled {
            request_id: cmd.request_id,
            previous_status: status,
            reason,
            actor_id: cmd.actor_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}
