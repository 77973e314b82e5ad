//! Structural and quantity checks that gate every state-changing command.
//!
//! Errors block the command; warnings are reported back to the actor and
//! recorded, but never block it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use stockmove_core::{LocationId, ProductId};

use crate::commands::LineDraft;
use crate::request::TransferRequest;

/// Largest quantity a single line may request.
pub const MAX_LINE_QUANTITY: i64 = 1_000_000_000;

/// Largest unit cost, in minor currency units. Together with
/// [`MAX_LINE_QUANTITY`] it keeps a line's estimated value inside `i64`.
pub const MAX_UNIT_COST: i64 = 1_000_000_000;

/// A single finding, optionally pinned to a line so a UI can highlight it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// `line_no` of the offending line, when the issue is line-specific.
    pub line_no: Option<u32>,
    pub message: String,
}

impl ValidationIssue {
    pub fn request(message: impl Into<String>) -> Self {
        Self {
            line_no: None,
            message: message.into(),
        }
    }

    pub fn line(line_no: u32, message: impl Into<String>) -> Self {
        Self {
            line_no: Some(line_no),
            message: message.into(),
        }
    }
}

impl core::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self.line_no {
            Some(line_no) => write!(f, "line {line_no}: {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn error(&mut self, issue: ValidationIssue) {
        self.errors.push(issue);
    }

    pub fn warning(&mut self, issue: ValidationIssue) {
        self.warnings.push(issue);
    }

    /// Issues reported against `line_no` (errors first).
    pub fn for_line(&self, line_no: u32) -> impl Iterator<Item = &ValidationIssue> {
        self.errors
            .iter()
            .chain(self.warnings.iter())
            .filter(move |i| i.line_no == Some(line_no))
    }
}

impl core::fmt::Display for ValidationResult {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let errors: Vec<String> = self.errors.iter().map(ToString::to_string).collect();
        f.write_str(&errors.join("; "))
    }
}

pub struct TransferRequestValidator;

impl TransferRequestValidator {
    /// Structural rules for an existing request.
    ///
    /// Lines are only required once the request leaves Draft.
    pub fn validate(request: &TransferRequest) -> ValidationResult {
        let mut result = ValidationResult::new();

        if let (Some(requesting), Some(source)) =
            (request.requesting_location_id(), request.source_location_id())
        {
            Self::check_locations(&mut result, requesting, source);
        }

        if request.lines().is_empty() && request.status() != crate::TransferStatus::Draft {
            result.error(ValidationIssue::request(
                "a transfer request needs at least one line",
            ));
        }

        for line in request.lines() {
            Self::check_line(&mut result, line.line_no, line.requested_quantity, line.unit_cost);
        }

        result
    }

    /// Rules for leaving Draft, plus a warning per line whose requested
    /// quantity exceeds live stock at the source.
    ///
    /// Stock can change before review, so shortage is enforced at approval.
    pub fn validate_for_submit(
        request: &TransferRequest,
        live_stock: &BTreeMap<ProductId, i64>,
    ) -> ValidationResult {
        let mut result = Self::validate(request);

        if request.lines().is_empty() {
            result.error(ValidationIssue::request(
                "a transfer request needs at least one line before it can be submitted",
            ));
        }

        for line in request.lines() {
            let available = live_stock.get(&line.product_id).copied().unwrap_or(0);
            if line.requested_quantity > available {
                result.warning(ValidationIssue::line(
                    line.line_no,
                    format!(
                        "requested {} but only {available} available at the source",
                        line.requested_quantity
                    ),
                ));
            }
        }

        if let (Some(requested), Some(created)) =
            (request.requested_delivery_date(), request.created_at())
        {
            if requested < created.date_naive() {
                result.warning(ValidationIssue::request(format!(
                    "requested delivery date {requested} is before the request was created"
                )));
            }
        }

        result
    }

    /// Rules for a request that does not exist yet.
    pub fn validate_new(
        requesting_location_id: LocationId,
        source_location_id: LocationId,
        request_number: &str,
        lines: &[LineDraft],
    ) -> ValidationResult {
        let mut result = ValidationResult::new();

        if request_number.trim().is_empty() {
            result.error(ValidationIssue::request("request number cannot be empty"));
        }

        Self::check_locations(&mut result, requesting_location_id, source_location_id);

        for (idx, line) in lines.iter().enumerate() {
            let line_no = idx as u32 + 1;
            Self::check_line(&mut result, line_no, line.quantity, line.unit_cost);
        }

        result
    }

    pub(crate) fn check_line(
        result: &mut ValidationResult,
        line_no: u32,
        requested_quantity: i64,
        unit_cost: i64,
    ) {
        if requested_quantity <= 0 {
            result.error(ValidationIssue::line(
                line_no,
                "requested quantity must be positive",
            ));
        } else if requested_quantity > MAX_LINE_QUANTITY {
            result.error(ValidationIssue::line(
                line_no,
                format!("requested quantity cannot exceed {MAX_LINE_QUANTITY}"),
            ));
        }
        if unit_cost < 0 {
            result.error(ValidationIssue::line(line_no, "unit cost cannot be negative"));
        } else if unit_cost > MAX_UNIT_COST {
            result.error(ValidationIssue::line(
                line_no,
                format!("unit cost cannot exceed {MAX_UNIT_COST}"),
            ));
        }
    }

    fn check_locations(
        result: &mut ValidationResult,
        requesting_location_id: LocationId,
        source_location_id: LocationId,
    ) {
        if requesting_location_id == source_location_id {
            result.error(ValidationIssue::request(
                "source location must differ from the requesting location",
            ));
        }
    }
}
