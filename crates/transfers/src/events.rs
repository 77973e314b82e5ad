use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use stockmove_core::{LocationId, ProductId, UserId};
use stockmove_events::Event;
use stockmove_inventory::LocationType;

use crate::classification::{TransferPriority, TransferReason};
use crate::commands::LineQuantity;
use crate::line::TransferLine;
use crate::request::TransferRequestId;
use crate::status::TransferStatus;
use crate::validation::ValidationIssue;

/// Event: TransferCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferCreated {
    pub request_id: TransferRequestId,
    pub request_number: String,
    pub requesting_location_id: LocationId,
    pub source_location_id: LocationId,
    pub source_location_type: LocationType,
    pub priority: TransferPriority,
    pub reason: TransferReason,
    pub requested_delivery_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub lines: Vec<TransferLine>,
    pub actor_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: LineAdded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineAdded {
    pub request_id: TransferRequestId,
    pub line: TransferLine,
    pub actor_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: LineRemoved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineRemoved {
    pub request_id: TransferRequestId,
    pub line_no: u32,
    pub actor_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: TransferSubmitted. Stock warnings raised at submission are kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferSubmitted {
    pub request_id: TransferRequestId,
    pub warnings: Vec<ValidationIssue>,
    pub actor_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// A line whose approval was cut down because the source was short.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoReduction {
    pub line_no: u32,
    pub product_id: ProductId,
    pub proposed: i64,
    pub approved: i64,
    pub available: i64,
}

/// Event: ApprovalRecorded.
///
/// `outcome` is Approved, PartiallyApproved, or Rejected when nothing at all
/// could be approved. `lines` holds the approved quantity of every line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalRecorded {
    pub request_id: TransferRequestId,
    pub outcome: TransferStatus,
    pub lines: Vec<LineQuantity>,
    pub auto_reductions: Vec<AutoReduction>,
    pub expected_delivery_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub rejection_reason: Option<String>,
    pub actor_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: TransferRejected (explicit rejection by the reviewer).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRejected {
    pub request_id: TransferRequestId,
    pub reason: String,
    pub actor_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: TransferShipped. `lines` holds the shipped quantity of every line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferShipped {
    pub request_id: TransferRequestId,
    pub lines: Vec<LineQuantity>,
    pub actor_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: GoodsReceived.
///
/// `lines` are the units received in this delivery (increments), `shortages`
/// the units written off when the receiver closed the receipt short.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoodsReceived {
    pub request_id: TransferRequestId,
    pub outcome: TransferStatus,
    pub lines: Vec<LineQuantity>,
    pub shortages: Vec<LineQuantity>,
    pub idempotency_token: Option<String>,
    pub notes: Option<String>,
    pub actor_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: TransferCancelled. `previous_status` tells consumers whether any
/// reservation was dropped or goods were already in motion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferCancelled {
    pub request_id: TransferRequestId,
    pub previous_status: TransferStatus,
    pub reason: Option<String>,
    pub actor_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferEvent {
    TransferCreated(TransferCreated),
    LineAdded(LineAdded),
    LineRemoved(LineRemoved),
    TransferSubmitted(TransferSubmitted),
    ApprovalRecorded(ApprovalRecorded),
    TransferRejected(TransferRejected),
    TransferShipped(TransferShipped),
    GoodsReceived(GoodsReceived),
    TransferCancelled(TransferCancelled),
}

impl TransferEvent {
    pub fn request_id(&self) -> TransferRequestId {
        match self {
            TransferEvent::TransferCreated(e) => e.request_id,
            TransferEvent::LineAdded(e) => e.request_id,
            TransferEvent::LineRemoved(e) => e.request_id,
            TransferEvent::TransferSubmitted(e) => e.request_id,
            TransferEvent::ApprovalRecorded(e) => e.request_id,
            TransferEvent::TransferRejected(e) => e.request_id,
            TransferEvent::TransferShipped(e) => e.request_id,
            TransferEvent::GoodsReceived(e) => e.request_id,
            TransferEvent::TransferCancelled(e) => e.request_id,
        }
    }

    pub fn actor_id(&self) -> UserId {
        match self {
            TransferEvent::TransferCreated(e) => e.actor_id,
            TransferEvent::LineAdded(e) => e.actor_id,
            TransferEvent::LineRemoved(e) => e.actor_id,
            TransferEvent::TransferSubmitted(e) => e.actor_id,
            TransferEvent::ApprovalRecorded(e) => e.actor_id,
            TransferEvent::TransferRejected(e) => e.actor_id,
            TransferEvent::TransferShipped(e) => e.actor_id,
            TransferEvent::GoodsReceived(e) => e.actor_id,
            TransferEvent::TransferCancelled(e) => e.actor_id,
        }
    }
}

impl Event for TransferEvent {
    fn event_type(&self) -> &'static str {
        match self {
            TransferEvent::TransferCreated(_) => "transfers.request.created",
            TransferEvent::LineAdded(_) => "transfers.request.line_added",
            TransferEvent::LineRemoved(_) => "transfers.request.line_removed",
            TransferEvent::TransferSubmitted(_) => "transfers.request.submitted",
            TransferEvent::ApprovalRecorded(_) => "transfers.request.approval_recorded",
            TransferEvent::TransferRejected(_) => "transfers.request.rejected",
            TransferEvent::TransferShipped(_) => "transfers.request.shipped",
            TransferEvent::GoodsReceived(_) => "transfers.request.goods_received",
            TransferEvent::TransferCancelled(_) => "transfers.request.cancelled",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            TransferEvent::TransferCreated(e) => e.occurred_at,
            TransferEvent::LineAdded(e) => e.occurred_at,
            TransferEvent::LineRemoved(e) => e.occurred_at,
            TransferEvent::TransferSubmitted(e) => e.occurred_at,
            TransferEvent::ApprovalRecorded(e) => e.occurred_at,
            TransferEvent::TransferRejected(e) => e.occurred_at,
            TransferEvent::TransferShipped(e) => e.occurred_at,
            TransferEvent::GoodsReceived(e) => e.occurred_at,
            TransferEvent::TransferCancelled(e) => e.occurred_at,
        }
    }
}
