//! Ports to the record store and the exchange transport
//!
//! The record store is the single source of truth; the correlator and
//! reconciler never cache correlation results across calls. Adapters are
//! swappable: PostgreSQL in production (infra_db), in-memory for tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use core_kernel::{PayerCaseId, RequestId};

use crate::batch::ClaimBatch;
use crate::reconcile::OutcomeDescriptor;
use crate::records::{CommunicationRecord, OutboundRequest, PayerCaseRecord, RequestKind};

/// Error type for record-store operations
#[derive(Debug, Error)]
pub enum StoreError {
    /// The requested entity was not found
    #[error("Not found: {entity_type} with key {key}")]
    NotFound { entity_type: String, key: String },

    /// A uniqueness rule was violated, e.g. a duplicate message identifier
    #[error("Duplicate {field} '{value}' on {entity_type}")]
    Duplicate {
        entity_type: String,
        field: String,
        value: String,
    },

    /// The store is unreachable or the transaction failed
    #[error("Store unavailable: {message}")]
    Unavailable {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// An internal adapter error occurred
    #[error("Internal store error: {message}")]
    Internal { message: String },
}

impl StoreError {
    pub fn not_found(entity_type: impl Into<String>, key: impl fmt::Display) -> Self {
        StoreError::NotFound {
            entity_type: entity_type.into(),
            key: key.to_string(),
        }
    }

    pub fn duplicate(
        entity_type: impl Into<String>,
        field: impl Into<String>,
        value: impl fmt::Display,
    ) -> Self {
        StoreError::Duplicate {
            entity_type: entity_type.into(),
            field: field.into(),
            value: value.to_string(),
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        StoreError::Unavailable {
            message: message.into(),
            source: None,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        StoreError::Internal {
            message: message.into(),
        }
    }

    /// True for failures that may succeed on retry
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable { .. })
    }
}

/// Transactional access to the four record families
///
/// All correlation lookups run against this trait; implementations decide
/// whether a call blocks or suspends.
#[async_trait]
pub trait RecordStore: Send + Sync {
    // --- outbound requests -------------------------------------------------

    async fn find_request_by_id(
        &self,
        id: RequestId,
    ) -> Result<Option<OutboundRequest>, StoreError>;

    /// Exact match of a stored outbound message identifier within one family
    async fn find_request_by_message_identifier(
        &self,
        kind: RequestKind,
        message_identifier: &str,
    ) -> Result<Option<OutboundRequest>, StoreError>;

    /// Matches a payload-carried reference against the request number or the
    /// exchange-assigned request identifier within one family
    async fn find_request_by_reference(
        &self,
        kind: RequestKind,
        reference: &str,
    ) -> Result<Option<OutboundRequest>, StoreError>;

    /// Persists a request; rejects a message identifier already recorded on
    /// a different request with `StoreError::Duplicate`
    async fn save_request(&self, request: &OutboundRequest) -> Result<(), StoreError>;

    // --- payer-initiated records ------------------------------------------

    async fn find_payer_case_by_id(
        &self,
        id: PayerCaseId,
    ) -> Result<Option<PayerCaseRecord>, StoreError>;

    async fn find_payer_case_by_identifier(
        &self,
        identifier: &str,
    ) -> Result<Option<PayerCaseRecord>, StoreError>;

    async fn insert_payer_case(&self, case: &PayerCaseRecord) -> Result<(), StoreError>;

    // --- communication records --------------------------------------------

    async fn find_comm_record_by_identifier(
        &self,
        identifier: &str,
    ) -> Result<Option<CommunicationRecord>, StoreError>;

    async fn insert_comm_record(&self, record: &CommunicationRecord) -> Result<(), StoreError>;

    // --- batches -----------------------------------------------------------

    async fn find_batch(&self, batch_id: &str) -> Result<Option<ClaimBatch>, StoreError>;

    async fn find_batch_by_message_identifier(
        &self,
        message_identifier: &str,
    ) -> Result<Option<ClaimBatch>, StoreError>;

    /// Persists a batch together with its line items and status history
    async fn save_batch(&self, batch: &ClaimBatch) -> Result<(), StoreError>;
}

/// Error type for exchange transport operations
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Send failed: {message}")]
    SendFailed { message: String },

    #[error("Exchange unreachable: {message}")]
    Unreachable { message: String },

    #[error("Exchange rejected the submission: {message}")]
    Rejected { message: String },
}

impl TransportError {
    pub fn send_failed(message: impl Into<String>) -> Self {
        TransportError::SendFailed {
            message: message.into(),
        }
    }

    pub fn unreachable(message: impl Into<String>) -> Self {
        TransportError::Unreachable {
            message: message.into(),
        }
    }
}

/// Acknowledgement returned by the exchange for a batch submission
///
/// Responses may arrive synchronously: any outcomes carried on the ack flow
/// through the same reconciliation path as polled ones.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionAck {
    /// Exchange-assigned message identifier for the submission
    pub message_identifier: String,
    /// Outcomes the exchange answered synchronously, possibly empty
    pub outcomes: Vec<OutcomeDescriptor>,
}

/// Outbound transport to the insurance exchange
#[async_trait]
pub trait ExchangeGateway: Send + Sync {
    /// Submits an assembled batch; a transport-level `Err` moves the batch
    /// to its Error state, never to a terminal adjudicated one
    async fn submit_batch(&self, batch: &ClaimBatch) -> Result<SubmissionAck, TransportError>;

    /// Fetches deferred outcomes for a previously submitted batch; an empty
    /// result is a normal, non-error outcome
    async fn fetch_outcomes(
        &self,
        batch: &ClaimBatch,
    ) -> Result<Vec<OutcomeDescriptor>, TransportError>;
}
