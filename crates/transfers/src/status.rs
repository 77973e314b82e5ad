use serde::{Deserialize, Serialize};

/// Transfer request status lifecycle.
///
/// ```text
/// Draft ─► Submitted ─┬─► Approved ──────────┬─► InTransit ─┬─► PartiallyReceived ─► Received
///                     ├─► PartiallyApproved ─┘              └─────────────────────► Received
///                     └─► Rejected
///
/// any non-terminal ─► Cancelled
/// ```
///
/// Rejected, Received and Cancelled are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    Draft,
    Submitted,
    Approved,
    PartiallyApproved,
    Rejected,
    InTransit,
    PartiallyReceived,
    Received,
    Cancelled,
}

impl TransferStatus {
    pub const ALL: [TransferStatus; 9] = [
        TransferStatus::Draft,
        TransferStatus::Submitted,
        TransferStatus::Approved,
        TransferStatus::PartiallyApproved,
        TransferStatus::Rejected,
        TransferStatus::InTransit,
        TransferStatus::PartiallyReceived,
        TransferStatus::Received,
        TransferStatus::Cancelled,
    ];

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransferStatus::Rejected | TransferStatus::Received | TransferStatus::Cancelled
        )
    }

    /// Approved in full or in part; stock is reserved at the source.
    pub fn is_approved(&self) -> bool {
        matches!(self, TransferStatus::Approved | TransferStatus::PartiallyApproved)
    }

    /// Goods have left the source and not all of them are reconciled.
    pub fn is_in_motion(&self) -> bool {
        matches!(self, TransferStatus::InTransit | TransferStatus::PartiallyReceived)
    }

    /// Whether the graph has an edge `self -> next`.
    ///
    /// Draft loops onto itself for line edits and PartiallyReceived loops
    /// onto itself for additional partial receipts.
    pub fn can_transition_to(&self, next: TransferStatus) -> bool {
        use TransferStatus::*;

        if next == Cancelled {
            return !self.is_terminal();
        }

        match self {
            Draft => matches!(next, Draft | Submitted),
            Submitted => matches!(next, Approved | PartiallyApproved | Rejected),
            Approved | PartiallyApproved => next == InTransit,
            InTransit => matches!(next, PartiallyReceived | Received),
            PartiallyReceived => matches!(next, PartiallyReceived | Received),
            Rejected | Received | Cancelled => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStatus::Draft => "draft",
            TransferStatus::Submitted => "submitted",
            TransferStatus::Approved => "approved",
            TransferStatus::PartiallyApproved => "partially_approved",
            TransferStatus::Rejected => "rejected",
            TransferStatus::InTransit => "in_transit",
            TransferStatus::PartiallyReceived => "partially_received",
            TransferStatus::Received => "received",
            TransferStatus::Cancelled => "cancelled",
        }
    }
}

impl core::fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}
