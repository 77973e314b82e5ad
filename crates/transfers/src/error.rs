use serde::{Deserialize, Serialize};
use thiserror::Error;

use stockmove_core::DomainError;

use crate::status::TransferStatus;
use crate::validation::{ValidationIssue, ValidationResult};

/// The operation an actor attempted (for transition errors and logs).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferOperation {
    Create,
    AddLine,
    RemoveLine,
    Submit,
    Approve,
    Reject,
    Ship,
    Receive,
    Cancel,
}

impl TransferOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferOperation::Create => "create",
            TransferOperation::AddLine => "add a line to",
            TransferOperation::RemoveLine => "remove a line from",
            TransferOperation::Submit => "submit",
            TransferOperation::Approve => "approve",
            TransferOperation::Reject => "reject",
            TransferOperation::Ship => "ship",
            TransferOperation::Receive => "receive",
            TransferOperation::Cancel => "cancel",
        }
    }
}

impl core::fmt::Display for TransferOperation {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a transfer command was refused. Nothing is applied when this is returned.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransferError {
    /// Structural or quantity rules failed; carries line-level detail.
    #[error("validation failed: {0}")]
    Validation(ValidationResult),

    /// The current status has no edge for the attempted operation.
    #[error("cannot {operation} a transfer request that is {from}")]
    InvalidTransition {
        from: TransferStatus,
        operation: TransferOperation,
    },

    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl TransferError {
    pub fn invalid_transition(from: TransferStatus, operation: TransferOperation) -> Self {
        Self::InvalidTransition { from, operation }
    }

    /// Shorthand for a validation failure with a single issue.
    pub fn rejected(issue: ValidationIssue) -> Self {
        let mut result = ValidationResult::new();
        result.error(issue);
        Self::Validation(result)
    }
}

impl From<ValidationResult> for TransferError {
    fn from(value: ValidationResult) -> Self {
        Self::Validation(value)
    }
}
