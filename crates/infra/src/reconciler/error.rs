use std::time::Duration;

use thiserror::Error;

use stockledger_core::{BatchId, DomainError, ItemId, TransactionId};
use stockledger_inventory::Transaction;

use crate::store::StoreError;

/// Failure of a single store call made by the reconciler.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StepError {
    #[error("{operation} failed: {source}")]
    Store {
        operation: &'static str,
        #[source]
        source: StoreError,
    },

    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },
}

impl StepError {
    /// False when the call may or may not have taken effect (timeouts).
    pub fn is_definite(&self) -> bool {
        matches!(self, StepError::Store { .. })
    }

    pub fn operation(&self) -> &'static str {
        match self {
            StepError::Store { operation, .. } | StepError::Timeout { operation, .. } => operation,
        }
    }
}

/// Transaction recorded, stock counter not updated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialApply {
    pub transaction: Transaction,
    pub cause: StepError,
}

impl PartialApply {
    pub fn transaction_id(&self) -> TransactionId {
        self.transaction.id
    }

    pub fn item_id(&self) -> ItemId {
        self.transaction.item_id
    }
}

/// Transaction deleted, stock counter not restored.
///
/// Carries the full deleted record so the caller can re-create it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialRevert {
    pub transaction: Transaction,
    pub cause: StepError,
}

impl PartialRevert {
    pub fn transaction_id(&self) -> TransactionId {
        self.transaction.id
    }

    pub fn item_id(&self) -> ItemId {
        self.transaction.item_id
    }
}

/// A batch line failed; already-applied lines were compensated.
#[derive(Debug)]
pub struct BatchFailure {
    pub batch_id: BatchId,
    /// Zero-based index of the line that failed.
    pub failed_line: usize,
    pub cause: ReconcileError,
    /// Compensations that themselves failed; their stock needs a repair.
    pub compensation_failures: Vec<ReconcileError>,
}

/// Reconciler operation error.
///
/// Every variant is scoped to the single call that produced it and carries
/// enough context (ids, failed step) for a manual retry or compensation.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Validation(#[from] DomainError),

    #[error("item {item_id} not found")]
    Reference { item_id: ItemId },

    #[error("{operation} failed: {source}")]
    Persistence {
        operation: &'static str,
        #[source]
        source: StoreError,
    },

    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error(
        "transaction {} recorded but stock of item {} not updated: {}",
        .0.transaction.id, .0.transaction.item_id, .0.cause
    )]
    PartialApply(Box<PartialApply>),

    #[error(
        "transaction {} deleted but stock of item {} not restored: {}",
        .0.transaction.id, .0.transaction.item_id, .0.cause
    )]
    PartialRevert(Box<PartialRevert>),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error(
        "batch {} failed at line {}: {} ({} compensation failures)",
        .0.batch_id, .0.failed_line, .0.cause, .0.compensation_failures.len()
    )]
    Batch(Box<BatchFailure>),
}

impl From<StepError> for ReconcileError {
    fn from(value: StepError) -> Self {
        match value {
            StepError::Store { operation, source } => ReconcileError::Persistence { operation, source },
            StepError::Timeout { operation, after } => ReconcileError::Timeout { operation, after },
        }
    }
}

impl ReconcileError {
    /// Stable machine-readable code (used by the HTTP layer).
    pub fn code(&self) -> &'static str {
        match self {
            ReconcileError::Validation(_) => "validation_error",
            ReconcileError::Reference { .. } => "reference_error",
            ReconcileError::Persistence { .. } => "persistence_error",
            ReconcileError::Timeout { .. } => "timeout",
            ReconcileError::PartialApply(_) => "partial_apply",
            ReconcileError::PartialRevert(_) => "partial_revert",
            ReconcileError::Conflict(_) => "conflict",
            ReconcileError::Batch(_) => "batch_failed",
        }
    }
}
