use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use stockmove_core::{
    Aggregate, AggregateId, AggregateRoot, DomainError, LocationId, UserId,
};
use stockmove_inventory::LocationType;

use crate::classification::{TransferPriority, TransferReason};
use crate::commands::{AddLine, CreateTransfer, LineQuantity, RemoveLine, SubmitTransfer, TransferCommand};
use crate::error::{TransferError, TransferOperation};
use crate::events::{LineAdded, LineRemoved, TransferCreated, TransferEvent, TransferSubmitted};
use crate::line::TransferLine;
use crate::status::TransferStatus;
use crate::validation::{TransferRequestValidator, ValidationIssue, ValidationResult};

/// Aggregate type name used for event streams.
pub const AGGREGATE_TYPE: &str = "transfers.request";

/// Transfer request identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransferRequestId(pub AggregateId);

impl TransferRequestId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for TransferRequestId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Aggregate root: TransferRequest.
///
/// Header fields are `None` only on a not-yet-created instance used for
/// rehydration; every created request has them set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    id: TransferRequestId,
    request_number: String,
    requesting_location_id: Option<LocationId>,
    source_location_id: Option<LocationId>,
    source_location_type: Option<LocationType>,
    priority: Option<TransferPriority>,
    reason: Option<TransferReason>,
    status: TransferStatus,
    lines: Vec<TransferLine>,
    notes: Option<String>,

    requested_delivery_date: Option<NaiveDate>,
    expected_delivery_date: Option<NaiveDate>,

    created_at: Option<DateTime<Utc>>,
    created_by: Option<UserId>,
    submitted_at: Option<DateTime<Utc>>,
    submitted_by: Option<UserId>,
    approved_at: Option<DateTime<Utc>>,
    approved_by: Option<UserId>,
    rejected_at: Option<DateTime<Utc>>,
    rejected_by: Option<UserId>,
    rejection_reason: Option<String>,
    shipped_at: Option<DateTime<Utc>>,
    shipped_by: Option<UserId>,
    received_at: Option<DateTime<Utc>>,
    received_by: Option<UserId>,
    cancelled_at: Option<DateTime<Utc>>,
    cancelled_by: Option<UserId>,
    cancellation_reason: Option<String>,
    updated_at: Option<DateTime<Utc>>,

    receipt_tokens: BTreeSet<String>,
    version: u64,
    created: bool,
}

impl TransferRequest {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: TransferRequestId) -> Self {
        Self {
            id,
            request_number: String::new(),
            requesting_location_id: None,
            source_location_id: None,
            source_location_type: None,
            priority: None,
            reason: None,
            status: TransferStatus::Draft,
            lines: Vec::new(),
            notes: None,
            requested_delivery_date: None,
            expected_delivery_date: None,
            created_at: None,
            created_by: None,
            submitted_at: None,
            submitted_by: None,
            approved_at: None,
            approved_by: None,
            rejected_at: None,
            rejected_by: None,
            rejection_reason: None,
            shipped_at: None,
            shipped_by: None,
            received_at: None,
            received_by: None,
            cancelled_at: None,
            cancelled_by: None,
            cancellation_reason: None,
            updated_at: None,
            receipt_tokens: BTreeSet::new(),
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> TransferRequestId {
        self.id
    }

    pub fn exists(&self) -> bool {
        self.created
    }

    pub fn request_number(&self) -> &str {
        &self.request_number
    }

    pub fn requesting_location_id(&self) -> Option<LocationId> {
        self.requesting_location_id
    }

    pub fn source_location_id(&self) -> Option<LocationId> {
        self.source_location_id
    }

    pub fn source_location_type(&self) -> Option<LocationType> {
        self.source_location_type
    }

    pub fn priority(&self) -> Option<TransferPriority> {
        self.priority
    }

    pub fn reason(&self) -> Option<TransferReason> {
        self.reason
    }

    pub fn status(&self) -> TransferStatus {
        self.status
    }

    pub fn lines(&self) -> &[TransferLine] {
        &self.lines
    }

    pub fn line(&self, line_no: u32) -> Option<&TransferLine> {
        self.lines.iter().find(|l| l.line_no == line_no)
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn requested_delivery_date(&self) -> Option<NaiveDate> {
        self.requested_delivery_date
    }

    pub fn expected_delivery_date(&self) -> Option<NaiveDate> {
        self.expected_delivery_date
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn created_by(&self) -> Option<UserId> {
        self.created_by
    }

    pub fn submitted_at(&self) -> Option<DateTime<Utc>> {
        self.submitted_at
    }

    pub fn submitted_by(&self) -> Option<UserId> {
        self.submitted_by
    }

    pub fn approved_at(&self) -> Option<DateTime<Utc>> {
        self.approved_at
    }

    pub fn approved_by(&self) -> Option<UserId> {
        self.approved_by
    }

    pub fn rejected_at(&self) -> Option<DateTime<Utc>> {
        self.rejected_at
    }

    pub fn rejected_by(&self) -> Option<UserId> {
        self.rejected_by
    }

    pub fn rejection_reason(&self) -> Option<&str> {
        self.rejection_reason.as_deref()
    }

    pub fn shipped_at(&self) -> Option<DateTime<Utc>> {
        self.shipped_at
    }

    pub fn shipped_by(&self) -> Option<UserId> {
        self.shipped_by
    }

    pub fn received_at(&self) -> Option<DateTime<Utc>> {
        self.received_at
    }

    pub fn received_by(&self) -> Option<UserId> {
        self.received_by
    }

    pub fn cancelled_at(&self) -> Option<DateTime<Utc>> {
        self.cancelled_at
    }

    pub fn cancelled_by(&self) -> Option<UserId> {
        self.cancelled_by
    }

    pub fn cancellation_reason(&self) -> Option<&str> {
        self.cancellation_reason.as_deref()
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    /// Whether a receipt carrying `token` was already recorded.
    pub fn has_receipt(&self, token: &str) -> bool {
        self.receipt_tokens.contains(token)
    }

    pub fn total_requested_quantity(&self) -> i64 {
        self.lines.iter().map(|l| l.requested_quantity).fold(0, i64::saturating_add)
    }

    pub fn total_approved_quantity(&self) -> i64 {
        self.lines.iter().map(|l| l.approved_quantity).fold(0, i64::saturating_add)
    }

    pub fn total_shipped_quantity(&self) -> i64 {
        self.lines.iter().map(|l| l.shipped_quantity).fold(0, i64::saturating_add)
    }

    pub fn total_received_quantity(&self) -> i64 {
        self.lines.iter().map(|l| l.received_quantity).fold(0, i64::saturating_add)
    }

    pub fn total_issue_quantity(&self) -> i64 {
        self.lines.iter().map(|l| l.issue_quantity()).fold(0, i64::saturating_add)
    }

    /// Sum of `unit_cost * requested_quantity` over all lines, saturating.
    pub fn total_estimated_value(&self) -> i64 {
        self.lines.iter().map(|l| l.estimated_value()).fold(0, i64::saturating_add)
    }

    /// Quantity chain of every line.
    pub fn check_invariants(&self) -> Result<(), DomainError> {
        for line in &self.lines {
            line.check_quantity_chain()?;
        }
        Ok(())
    }
}

impl AggregateRoot for TransferRequest {
    type Id = TransferRequestId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

impl Aggregate for TransferRequest {
    type Command = TransferCommand;
    type Event = TransferEvent;
    type Error = TransferError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            TransferEvent::TransferCreated(e) => {
                self.id = e.request_id;
                self.request_number = e.request_number.clone();
                self.requesting_location_id = Some(e.requesting_location_id);
                self.source_location_id = Some(e.source_location_id);
                self.source_location_type = Some(e.source_location_type);
                self.priority = Some(e.priority);
                self.reason = Some(e.reason);
                self.requested_delivery_date = e.requested_delivery_date;
                self.notes = e.notes.clone();
                self.lines = e.lines.clone();
                self.status = TransferStatus::Draft;
                self.created_at = Some(e.occurred_at);
                self.created_by = Some(e.actor_id);
                self.created = true;
            }
            TransferEvent::LineAdded(e) => {
                self.lines.push(e.line.clone());
            }
            TransferEvent::LineRemoved(e) => {
                self.lines.retain(|l| l.line_no != e.line_no);
            }
            TransferEvent::TransferSubmitted(e) => {
                self.status = TransferStatus::Submitted;
                self.submitted_at = Some(e.occurred_at);
                self.submitted_by = Some(e.actor_id);
            }
            TransferEvent::ApprovalRecorded(e) => {
                for approved in &e.lines {
                    if let Some(line) = self.line_mut(approved.line_no) {
                        line.approved_quantity = approved.quantity;
                    }
                }
                self.status = e.outcome;
                if e.outcome == TransferStatus::Rejected {
                    self.rejected_at = Some(e.occurred_at);
                    self.rejected_by = Some(e.actor_id);
                    self.rejection_reason = e.rejection_reason.clone();
                } else {
                    self.approved_at = Some(e.occurred_at);
                    self.approved_by = Some(e.actor_id);
                    self.expected_delivery_date =
                        e.expected_delivery_date.or(self.expected_delivery_date);
                }
            }
            TransferEvent::TransferRejected(e) => {
                self.status = TransferStatus::Rejected;
                self.rejected_at = Some(e.occurred_at);
                self.rejected_by = Some(e.actor_id);
                self.rejection_reason = Some(e.reason.clone());
            }
            TransferEvent::TransferShipped(e) => {
                for shipped in &e.lines {
                    if let Some(line) = self.line_mut(shipped.line_no) {
                        line.shipped_quantity = shipped.quantity;
                    }
                }
                self.status = TransferStatus::InTransit;
                self.shipped_at = Some(e.occurred_at);
                self.shipped_by = Some(e.actor_id);
            }
            TransferEvent::GoodsReceived(e) => {
                for received in &e.lines {
                    if let Some(line) = self.line_mut(received.line_no) {
                        line.received_quantity += received.quantity;
                    }
                }
                for shortage in &e.shortages {
                    if let Some(line) = self.line_mut(shortage.line_no) {
                        line.shortage_quantity += shortage.quantity;
                    }
                }
                if let Some(token) = &e.idempotency_token {
                    self.receipt_tokens.insert(token.clone());
                }
                self.status = e.outcome;
                self.received_at = Some(e.occurred_at);
                self.received_by = Some(e.actor_id);
            }
            TransferEvent::TransferCancelled(e) => {
                self.status = TransferStatus::Cancelled;
                self.cancelled_at = Some(e.occurred_at);
                self.cancelled_by = Some(e.actor_id);
                self.cancellation_reason = e.reason.clone();
            }
        }

        self.updated_at = Some(stockmove_events::Event::occurred_at(event));

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            TransferCommand::CreateTransfer(cmd) => self.handle_create(cmd),
            TransferCommand::AddLine(cmd) => self.handle_add_line(cmd),
            TransferCommand::RemoveLine(cmd) => self.handle_remove_line(cmd),
            TransferCommand::SubmitTransfer(cmd) => self.handle_submit(cmd),
            TransferCommand::ApproveTransfer(cmd) => self.handle_approve(cmd),
            TransferCommand::RejectTransfer(cmd) => self.handle_reject(cmd),
            TransferCommand::ShipTransfer(cmd) => self.handle_ship(cmd),
            TransferCommand::ReceiveTransfer(cmd) => self.handle_receive(cmd),
            TransferCommand::CancelTransfer(cmd) => self.handle_cancel(cmd),
        }
    }
}

impl TransferRequest {
    fn line_mut(&mut self, line_no: u32) -> Option<&mut TransferLine> {
        self.lines.iter_mut().find(|l| l.line_no == line_no)
    }

    pub(crate) fn ensure_exists(&self, request_id: TransferRequestId) -> Result<(), TransferError> {
        if !self.created {
            return Err(DomainError::not_found().into());
        }
        if self.id != request_id {
            return Err(DomainError::invariant("request_id mismatch").into());
        }
        Ok(())
    }

    /// Refuse `operation` unless the current status is one of `allowed`.
    pub(crate) fn ensure_status(
        &self,
        operation: TransferOperation,
        allowed: &[TransferStatus],
    ) -> Result<(), TransferError> {
        if allowed.contains(&self.status) {
            Ok(())
        } else {
            Err(TransferError::invalid_transition(self.status, operation))
        }
    }

    pub(crate) fn ensure_structurally_valid(&self) -> Result<(), TransferError> {
        let result = TransferRequestValidator::validate(self);
        if result.is_valid() {
            Ok(())
        } else {
            Err(TransferError::Validation(result))
        }
    }

    /// Index per-line quantities by line number, reporting unknown and
    /// repeated line numbers into `result`.
    pub(crate) fn index_line_quantities(
        &self,
        entries: &[LineQuantity],
        result: &mut ValidationResult,
    ) -> BTreeMap<u32, i64> {
        let mut indexed = BTreeMap::new();
        for entry in entries {
            if self.line(entry.line_no).is_none() {
                result.error(ValidationIssue::line(
                    entry.line_no,
                    "no such line on this transfer request",
                ));
                continue;
            }
            if indexed.insert(entry.line_no, entry.quantity).is_some() {
                result.error(ValidationIssue::line(
                    entry.line_no,
                    "line listed more than once",
                ));
            }
        }
        indexed
    }

    fn handle_create(&self, cmd: &CreateTransfer) -> Result<Vec<TransferEvent>, TransferError> {
        if self.created {
            return Err(DomainError::conflict("transfer request already exists").into());
        }

        let result = TransferRequestValidator::validate_new(
            cmd.requesting_location_id,
            cmd.source_location_id,
            &cmd.request_number,
            &cmd.lines,
        );
        if !result.is_valid() {
            return Err(result.into());
        }

        let lines = cmd
            .lines
            .iter()
            .enumerate()
            .map(|(idx, draft)| {
                TransferLine::new(
                    idx as u32 + 1,
                    draft.product_id,
                    draft.quantity,
                    draft.unit_cost,
                    draft.source_available_stock,
                )
            })
            .collect();

        Ok(vec![TransferEvent::TransferCreated(TransferCreated {
            request_id: cmd.request_id,
            request_number: cmd.request_number.trim().to_string(),
            requesting_location_id: cmd.requesting_location_id,
            source_location_id: cmd.source_location_id,
            source_location_type: cmd.source_location_type,
            priority: cmd.priority,
            reason: cmd.reason,
            requested_delivery_date: cmd.requested_delivery_date,
            notes: normalize_text(cmd.notes.as_deref()),
            lines,
            actor_id: cmd.actor_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_add_line(&self, cmd: &AddLine) -> Result<Vec<TransferEvent>, TransferError> {
        self.ensure_exists(cmd.request_id)?;
        self.ensure_status(TransferOperation::AddLine, &[TransferStatus::Draft])?;

        let line_no = self.lines.iter().map(|l| l.line_no).max().unwrap_or(0) + 1;

        let mut result = ValidationResult::new();
        TransferRequestValidator::check_line(
            &mut result,
            line_no,
            cmd.line.quantity,
            cmd.line.unit_cost,
        );
        if !result.is_valid() {
            return Err(result.into());
        }

        Ok(vec![TransferEvent::LineAdded(LineAdded {
            request_id: cmd.request_id,
            line: TransferLine::new(
                line_no,
                cmd.line.product_id,
                cmd.line.quantity,
                cmd.line.unit_cost,
                cmd.line.source_available_stock,
            ),
            actor_id: cmd.actor_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_remove_line(&self, cmd: &RemoveLine) -> Result<Vec<TransferEvent>, TransferError> {
        self.ensure_exists(cmd.request_id)?;
        self.ensure_status(TransferOperation::RemoveLine, &[TransferStatus::Draft])?;

        if self.line(cmd.line_no).is_none() {
            return Err(TransferError::rejected(ValidationIssue::line(
                cmd.line_no,
                "no such line on this transfer request",
            )));
        }

        Ok(vec![TransferEvent::LineRemoved(LineRemoved {
            request_id: cmd.request_id,
            line_no: cmd.line_no,
            actor_id: cmd.actor_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_submit(&self, cmd: &SubmitTransfer) -> Result<Vec<TransferEvent>, TransferError> {
        self.ensure_exists(cmd.request_id)?;
        self.ensure_status(TransferOperation::Submit, &[TransferStatus::Draft])?;

        let result = TransferRequestValidator::validate_for_submit(self, &cmd.live_stock);
        if !result.is_valid() {
            return Err(result.into());
        }

        Ok(vec![TransferEvent::TransferSubmitted(TransferSubmitted {
            request_id: cmd.request_id,
            warnings: result.warnings,
            actor_id: cmd.actor_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}

/// Trim free text; blank becomes `None`.
pub(crate) fn normalize_text(text: Option<&str>) -> Option<String> {
    text.map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}
