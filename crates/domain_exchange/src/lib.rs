//! Claims Exchange Domain
//!
//! This crate implements message correlation and batch reconciliation for a
//! payer exchange: classifying inbound bundles, resolving them to local
//! records, assembling claim batches, and folding adjudication outcomes back
//! onto batch and request state.
//!
//! # Batch Lifecycle
//!
//! ```text
//! Draft -> Pending -> Submitted -> Queued -> Processed/Partial/Rejected
//!            ^            |
//!            |            v
//!            +--------- Error
//! ```
//!
//! Submission failures land in Error and recover through Pending; the three
//! rightmost statuses are terminal for aggregate regression, though a
//! partially processed batch keeps answering polls.

pub mod batch;
pub mod correlate;
pub mod error;
pub mod message;
pub mod poller;
pub mod ports;
pub mod reconcile;
pub mod records;
pub mod service;

pub use batch::{
    BatchLineItem, BatchStatus, BatchTotals, CategoryGroup, ClaimBatch, ClaimCategory,
    LineOutcome, OutcomeRecord, SourceClaim, StatusChange, MAX_BATCH_ITEMS, MIN_BATCH_ITEMS,
};
pub use correlate::{
    CaseOriginClassifier, CorrelationOutcome, Correlator, Match, MatchStrategy, MatchTarget,
    StructuralOriginClassifier,
};
pub use error::{BatchError, ExchangeError, RecordError};
pub use message::{
    classify, AboutReference, Classification, ClaimResponsePayload, CommunicationPayload,
    CommunicationRequestPayload, InboundMessage, MessageHeader, Payload, TaskPayload,
};
pub use poller::PollReport;
pub use ports::{ExchangeGateway, RecordStore, StoreError, SubmissionAck, TransportError};
pub use reconcile::{map_outcome, OutcomeDescriptor, ReconciliationReport, SkippedOutcome};
pub use records::{
    CommunicationRecord, OutboundRequest, ParentLink, PayerCaseKind, PayerCaseRecord,
    RequestKind, RequestStatus, ServiceLine,
};
pub use service::{BatchSummary, ExchangeService, MessageDisposition};
