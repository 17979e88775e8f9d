//! Exchange domain errors
//!
//! Correlation misses are deliberately not represented here: a message that
//! cannot be matched is a structured result (`CorrelationOutcome::Unmatched`),
//! not an error. Only rule violations and infrastructure failures surface as
//! `Err` values.

use thiserror::Error;

use core_kernel::MoneyError;

use crate::ports::{StoreError, TransportError};

/// Rule violations on individual outbound request records
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("Invalid status transition from {from} to {to}")]
    InvalidStatusTransition { from: String, to: String },

    #[error("Message identifier already set to '{existing}'")]
    MessageIdentifierAlreadySet { existing: String },
}

/// Rule violations on claim batches
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("Batch is not in Draft (current status: {status})")]
    NotDraft { status: String },

    #[error("Batch has {count} items; at least {min} are required")]
    TooFewItems { count: usize, min: usize },

    #[error("Batch has {count} items; at most {max} are allowed")]
    TooManyItems { count: usize, max: usize },

    #[error("Payer mismatch: batch is for '{expected}', item is for '{found}'")]
    MixedPayer { expected: String, found: String },

    #[error("Provider mismatch: batch is for '{expected}', item is for '{found}'")]
    MixedProvider { expected: String, found: String },

    #[error("Claim category mismatch: batch accepts {expected}, item is {found}")]
    MixedCategory { expected: String, found: String },

    #[error("Currency mismatch: batch is in {expected}, item is in {found}")]
    MixedCurrency { expected: String, found: String },

    #[error("Source item '{request_number}' is not approved for submission")]
    SourceNotApproved { request_number: String },

    #[error("Source item '{request_number}' is already in the batch")]
    DuplicateItem { request_number: String },

    #[error("No item at batch position {position}")]
    UnknownPosition { position: u32 },

    #[error("Invalid batch status transition from {from} to {to}")]
    InvalidStatusTransition { from: String, to: String },

    #[error("Money error: {0}")]
    Money(#[from] MoneyError),
}

/// Service-level errors for the exchange engine
///
/// Only infrastructure failures and explicit rule violations reach the
/// caller as errors; correlation misses never do.
#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("Precondition violated: {rule}")]
    Precondition { rule: String },

    #[error("Batch not found: {0}")]
    BatchNotFound(String),

    #[error(transparent)]
    Record(#[from] RecordError),

    #[error(transparent)]
    Batch(#[from] BatchError),

    #[error("Record store error: {0}")]
    Store(#[from] StoreError),

    #[error("Exchange transport error: {0}")]
    Transport(#[from] TransportError),
}

impl ExchangeError {
    /// Creates a precondition violation carrying the violated rule
    pub fn precondition(rule: impl Into<String>) -> Self {
        ExchangeError::Precondition { rule: rule.into() }
    }
}
