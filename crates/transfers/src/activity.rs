//! Audit trail of a transfer request.
//!
//! The trail is not stored separately: it is derived from the event stream,
//! which is append-only, so entries can never be edited or dropped.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockmove_core::{Aggregate, AggregateRoot, UserId};
use stockmove_events::Event;

use crate::events::TransferEvent;
use crate::request::{TransferRequest, TransferRequestId};
use crate::status::TransferStatus;

/// One recorded change: who did what, when, and the status it left behind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityLogEntry {
    pub transfer_request_id: TransferRequestId,
    /// Stream revision of the event this entry describes (1-based).
    pub sequence: u64,
    pub actor_id: UserId,
    pub timestamp: DateTime<Utc>,
    /// `None` for the creation entry.
    pub from_status: Option<TransferStatus>,
    pub to_status: TransferStatus,
    pub note: String,
}

/// Replay `events` (in stream order) into activity entries.
pub fn history_from_events(id: TransferRequestId, events: &[TransferEvent]) -> Vec<ActivityLogEntry> {
    let mut state = TransferRequest::empty(id);
    let mut entries = Vec::with_capacity(events.len());

    for event in events {
        let from_status = state.exists().then(|| state.status());
        let note = describe(&state, event);
        state.apply(event);

        entries.push(ActivityLogEntry {
            transfer_request_id: id,
            sequence: state.version(),
            actor_id: event.actor_id(),
            timestamp: event.occurred_at(),
            from_status,
            to_status: state.status(),
            note,
        });
    }

    entries
}

fn describe(before: &TransferRequest, event: &TransferEvent) -> String {
    match event {
        TransferEvent::TransferCreated(e) => {
            format!("created {} with {} line(s)", e.request_number, e.lines.len())
        }
        TransferEvent::LineAdded(e) => format!(
            "line {} added: {} x product {}",
            e.line.line_no, e.line.requested_quantity, e.line.product_id
        ),
        TransferEvent::LineRemoved(e) => format!("line {} removed", e.line_no),
        TransferEvent::TransferSubmitted(e) => {
            if e.warnings.is_empty() {
                "submitted for approval".to_string()
            } else {
                let warnings: Vec<String> = e.warnings.iter().map(ToString::to_string).collect();
                format!("submitted for approval with warnings: {}", warnings.join("; "))
            }
        }
        TransferEvent::ApprovalRecorded(e) => {
            if let Some(reason) = &e.rejection_reason {
                return format!("rejected at approval: {reason}");
            }
            let approved: i64 = e.lines.iter().map(|l| l.quantity).sum();
            let mut note = format!(
                "approved {approved} of {} unit(s)",
                before.total_requested_quantity()
            );
            for r in &e.auto_reductions {
                note.push_str(&format!(
                    "; line {} reduced from {} to {} (available {})",
                    r.line_no, r.proposed, r.approved, r.available
                ));
            }
            if let Some(notes) = &e.notes {
                note.push_str(&format!("; {notes}"));
            }
            note
        }
        TransferEvent::TransferRejected(e) => format!("rejected: {}", e.reason),
        TransferEvent::TransferShipped(e) => {
            let shipped: i64 = e.lines.iter().map(|l| l.quantity).sum();
            format!("shipped {shipped} unit(s)")
        }
        TransferEvent::GoodsReceived(e) => {
            let received: i64 = e.lines.iter().map(|l| l.quantity).sum();
            let short: i64 = e.shortages.iter().map(|l| l.quantity).sum();
            let mut note = format!("received {received} unit(s)");
            if short > 0 {
                note.push_str(&format!(", {short} written off as shortage"));
            }
            if let Some(notes) = &e.notes {
                note.push_str(&format!("; {notes}"));
            }
            note
        }
        TransferEvent::TransferCancelled(e) => match &e.reason {
            Some(reason) => format!("cancelled from {}: {reason}", e.previous_status),
            None => format!("cancelled from {}", e.previous_status),
        },
    }
}
