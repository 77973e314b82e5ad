use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use stockmove_core::{LocationId, ProductId, UserId};
use stockmove_inventory::LocationType;

use crate::classification::{TransferPriority, TransferReason};
use crate::error::TransferOperation;
use crate::request::{TransferRequest, TransferRequestId};

/// A line as entered by the requesting location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineDraft {
    pub product_id: ProductId,
    pub quantity: i64,
    /// Cost per unit in minor currency units.
    pub unit_cost: i64,
    /// Live transferable stock at the source when the line was entered.
    #[serde(default)]
    pub source_available_stock: Option<i64>,
}

impl LineDraft {
    pub fn new(product_id: ProductId, quantity: i64, unit_cost: i64) -> Self {
        Self {
            product_id,
            quantity,
            unit_cost,
            source_available_stock: None,
        }
    }
}

/// A per-line quantity (approved, shipped or received, depending on the command).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineQuantity {
    pub line_no: u32,
    pub quantity: i64,
}

impl LineQuantity {
    pub fn new(line_no: u32, quantity: i64) -> Self {
        Self { line_no, quantity }
    }
}

/// Command: CreateTransfer (the request starts in Draft).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTransfer {
    pub request_id: TransferRequestId,
    pub request_number: String,
    pub requesting_location_id: LocationId,
    pub source_location_id: LocationId,
    pub source_location_type: LocationType,
    pub priority: TransferPriority,
    pub reason: TransferReason,
    pub requested_delivery_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub lines: Vec<LineDraft>,
    pub actor_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AddLine (Draft only).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddLine {
    pub request_id: TransferRequestId,
    pub line: LineDraft,
    pub actor_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RemoveLine (Draft only).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveLine {
    pub request_id: TransferRequestId,
    pub line_no: u32,
    pub actor_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SubmitTransfer.
///
/// `live_stock` is transferable stock per product at the source, read just
/// before the command; it only produces warnings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitTransfer {
    pub request_id: TransferRequestId,
    pub live_stock: BTreeMap<ProductId, i64>,
    pub actor_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ApproveTransfer.
///
/// Lines without a proposal are approved at their requested quantity.
/// `live_stock` is the transferable stock per product at the source, read
/// inside the same commit that reserves the approved quantities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApproveTransfer {
    pub request_id: TransferRequestId,
    pub proposals: Vec<LineQuantity>,
    pub live_stock: BTreeMap<ProductId, i64>,
    pub expected_delivery_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub actor_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RejectTransfer (explicit full rejection; reason is mandatory).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectTransfer {
    pub request_id: TransferRequestId,
    pub reason: String,
    pub actor_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ShipTransfer. Lines without an entry ship nothing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipTransfer {
    pub request_id: TransferRequestId,
    pub quantities: Vec<LineQuantity>,
    pub actor_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReceiveTransfer.
///
/// Quantities are the units arriving in this delivery, added to what was
/// already received. With `close_with_shortage`, whatever is still
/// outstanding after this delivery is written off as shortage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiveTransfer {
    pub request_id: TransferRequestId,
    pub quantities: Vec<LineQuantity>,
    pub notes: Option<String>,
    pub idempotency_token: Option<String>,
    pub close_with_shortage: bool,
    pub actor_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CancelTransfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelTransfer {
    pub request_id: TransferRequestId,
    pub reason: Option<String>,
    pub actor_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferCommand {
    CreateTransfer(CreateTransfer),
    AddLine(AddLine),
    RemoveLine(RemoveLine),
    SubmitTransfer(SubmitTransfer),
    ApproveTransfer(ApproveTransfer),
    RejectTransfer(RejectTransfer),
    ShipTransfer(ShipTransfer),
    ReceiveTransfer(ReceiveTransfer),
    CancelTransfer(CancelTransfer),
}

impl TransferCommand {
    pub fn request_id(&self) -> TransferRequestId {
        match self {
            TransferCommand::CreateTransfer(c) => c.request_id,
            TransferCommand::AddLine(c) => c.request_id,
            TransferCommand::RemoveLine(c) => c.request_id,
            TransferCommand::SubmitTransfer(c) => c.request_id,
            TransferCommand::ApproveTransfer(c) => c.request_id,
            TransferCommand::RejectTransfer(c) => c.request_id,
            TransferCommand::ShipTransfer(c) => c.request_id,
            TransferCommand::ReceiveTransfer(c) => c.request_id,
            TransferCommand::CancelTransfer(c) => c.request_id,
        }
    }

    pub fn actor_id(&self) -> UserId {
        match self {
            TransferCommand::CreateTransfer(c) => c.actor_id,
            TransferCommand::AddLine(c) => c.actor_id,
            TransferCommand::RemoveLine(c) => c.actor_id,
            TransferCommand::SubmitTransfer(c) => c.actor_id,
            TransferCommand::ApproveTransfer(c) => c.actor_id,
            TransferCommand::RejectTransfer(c) => c.actor_id,
            TransferCommand::ShipTransfer(c) => c.actor_id,
            TransferCommand::ReceiveTransfer(c) => c.actor_id,
            TransferCommand::CancelTransfer(c) => c.actor_id,
        }
    }

    pub fn operation(&self) -> TransferOperation {
        match self {
            TransferCommand::CreateTransfer(_) => TransferOperation::Create,
            TransferCommand::AddLine(_) => TransferOperation::AddLine,
            TransferCommand::RemoveLine(_) => TransferOperation::RemoveLine,
            TransferCommand::SubmitTransfer(_) => TransferOperation::Submit,
            TransferCommand::ApproveTransfer(_) => TransferOperation::Approve,
            TransferCommand::RejectTransfer(_) => TransferOperation::Reject,
            TransferCommand::ShipTransfer(_) => TransferOperation::Ship,
            TransferCommand::ReceiveTransfer(_) => TransferOperation::Receive,
            TransferCommand::CancelTransfer(_) => TransferOperation::Cancel,
        }
    }

    /// A receipt whose idempotency token was already recorded on `request`.
    pub fn is_receipt_replay(&self, request: &TransferRequest) -> bool {
        match self {
            TransferCommand::ReceiveTransfer(c) => c
                .idempotency_token
                .as_deref()
                .map(str::trim)
                .is_some_and(|token| request.has_receipt(token)),
            _ => false,
        }
    }
}
