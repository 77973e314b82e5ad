//! Stock transfer domain module (Transfer Requests, event-sourced).
//!
//! A transfer request moves stock from a source location to the requesting
//! location through draft → submission → approval → shipment → receipt.
//! Everything here is deterministic domain logic (no IO, no storage): live
//! stock figures are resolved by the caller and passed in on the commands.
//!
//! Components:
//! - [`TransferRequestValidator`] gates every state-changing command
//! - approval, shipment, receiving and cancellation handlers drive the
//!   [`TransferStatus`] graph, one module each
//! - [`activity`] rebuilds the append-only audit trail from the event stream
//! - [`movements`] translates committed events into stock movements

pub mod activity;
pub mod approval;
pub mod cancellation;
pub mod classification;
pub mod commands;
pub mod error;
pub mod events;
pub mod line;
pub mod movements;
pub mod query;
pub mod receiving;
pub mod request;
pub mod shipment;
pub mod status;
pub mod validation;

#[cfg(test)]
mod testing;

pub use activity::{ActivityLogEntry, history_from_events};
pub use classification::{TransferPriority, TransferReason};
pub use commands::{
    AddLine, ApproveTransfer, CancelTransfer, CreateTransfer, LineDraft, LineQuantity,
    ReceiveTransfer, RejectTransfer, RemoveLine, ShipTransfer, SubmitTransfer, TransferCommand,
};
pub use error::{TransferError, TransferOperation};
pub use events::{
    ApprovalRecorded, AutoReduction, GoodsReceived, LineAdded, LineRemoved, TransferCancelled,
    TransferCreated, TransferEvent, TransferRejected, TransferShipped, TransferSubmitted,
};
pub use line::TransferLine;
pub use movements::stock_movements;
pub use query::{DateRange, TransferFilter, TransferSummary};
pub use request::{AGGREGATE_TYPE, TransferRequest, TransferRequestId};
pub use status::TransferStatus;
pub use validation::{
    MAX_LINE_QUANTITY, MAX_UNIT_COST, TransferRequestValidator, ValidationIssue, ValidationResult,
};
