//! Read-side shapes for listing transfer requests.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use stockmove_core::LocationId;
use stockmove_inventory::LocationType;

use crate::classification::{TransferPriority, TransferReason};
use crate::request::{TransferRequest, TransferRequestId};
use crate::status::TransferStatus;

/// List row for a transfer request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferSummary {
    pub id: TransferRequestId,
    pub request_number: String,
    pub status: TransferStatus,
    pub requesting_location_id: LocationId,
    pub source_location_id: LocationId,
    pub source_location_type: LocationType,
    pub priority: TransferPriority,
    pub reason: TransferReason,
    pub line_count: usize,
    pub total_requested_quantity: i64,
    pub total_approved_quantity: i64,
    pub total_shipped_quantity: i64,
    pub total_received_quantity: i64,
    pub total_issue_quantity: i64,
    pub total_estimated_value: i64,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TransferSummary {
    /// `None` for a request that was never created.
    pub fn from_request(request: &TransferRequest) -> Option<Self> {
        let created_at = request.created_at()?;
        Some(Self {
            id: request.id_typed(),
            request_number: request.request_number().to_string(),
            status: request.status(),
            requesting_location_id: request.requesting_location_id()?,
            source_location_id: request.source_location_id()?,
            source_location_type: request.source_location_type()?,
            priority: request.priority()?,
            reason: request.reason()?,
            line_count: request.lines().len(),
            total_requested_quantity: request.total_requested_quantity(),
            total_approved_quantity: request.total_approved_quantity(),
            total_shipped_quantity: request.total_shipped_quantity(),
            total_received_quantity: request.total_received_quantity(),
            total_issue_quantity: request.total_issue_quantity(),
            total_estimated_value: request.total_estimated_value(),
            notes: request.notes().map(str::to_string),
            created_at,
            updated_at: request.updated_at().unwrap_or(created_at),
        })
    }
}

/// Inclusive range of calendar days (UTC). Open ends are unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        Self { from, to }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        let day = at.date_naive();
        self.from.is_none_or(|from| day >= from) && self.to.is_none_or(|to| day <= to)
    }
}

/// All set criteria must match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferFilter {
    pub status: Option<TransferStatus>,
    /// Matches either end of the transfer.
    pub location_id: Option<LocationId>,
    pub date_range: Option<DateRange>,
    /// Case-insensitive substring of the request number or notes.
    pub search_term: Option<String>,
}

impl TransferFilter {
    pub fn matches(&self, summary: &TransferSummary) -> bool {
        if self.status.is_some_and(|s| s != summary.status) {
            return false;
        }

        if let Some(location) = self.location_id {
            if summary.requesting_location_id != location && summary.source_location_id != location {
                return false;
            }
        }

        if self.date_range.is_some_and(|r| !r.contains(summary.created_at)) {
            return false;
        }

        match self.search_term.as_deref().map(str::trim) {
            Some(term) if !term.is_empty() => {
                let term = term.to_lowercase();
                summary.request_number.to_lowercase().contains(&term)
                    || summary
                        .notes
                        .as_deref()
                        .is_some_and(|n| n.to_lowercase().contains(&term))
            }
            _ => true,
        }
    }

    /// Filter and order: newest first, then by request number.
    pub fn apply<'a, I>(&self, summaries: I) -> Vec<TransferSummary>
    where
        I: IntoIterator<Item = &'a TransferSummary>,
    {
        let mut matched: Vec<TransferSummary> =
            summaries.into_iter().filter(|s| self.matches(s)).cloned().collect();
        matched.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.request_number.cmp(&b.request_number))
        });
        matched
    }
}
