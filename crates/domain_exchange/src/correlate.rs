//! Correlation of inbound messages to local records
//!
//! Matching runs as a prioritized strategy list, tried in fixed order with
//! first hit winning. The ordering encodes precedence rules inherited from
//! the exchange's observed behavior; do not reorder it, the outcomes change
//! silently.
//!
//! A miss is a structured result, not an error: solicited misses indicate a
//! correlation-key bug or record loss and are reported loudly, unsolicited
//! misses are expected noise. Neither aborts processing of sibling messages.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::batch::ClaimBatch;
use crate::message::{AboutReference, ClaimResponsePayload, InboundMessage, Payload};
use crate::ports::{RecordStore, StoreError};
use crate::records::{
    OutboundRequest, ParentLink, PayerCaseKind, PayerCaseRecord, RequestKind,
};

/// Structural predicate deciding whether a response-shaped payload
/// represents a payer-originated case
///
/// Evaluated independently of correlation: a genuinely new case must never
/// be folded onto an old record, even when an accidental identifier match
/// exists.
pub trait CaseOriginClassifier: Send + Sync {
    fn is_payer_originated(&self, payload: &ClaimResponsePayload) -> bool;
}

/// Default structural classifier
///
/// A response carrying its own pre-authorization reference but no request
/// reference is the payer opening an advance authorization.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuralOriginClassifier;

impl CaseOriginClassifier for StructuralOriginClassifier {
    fn is_payer_originated(&self, payload: &ClaimResponsePayload) -> bool {
        payload.pre_auth_ref.is_some() && payload.request_reference.is_none()
    }
}

/// The matching strategies, in the order they are tried
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchStrategy {
    /// Response identifier against stored outbound message identifiers
    MessageIdentifier,
    /// Payload-carried request reference against request number or
    /// exchange-assigned request identifier
    RequestReference,
    /// Response identifier against a batch submission's message identifier
    BatchSubmission,
    /// "About" entry identifier value against local records
    AboutIdentifier,
    /// Trailing path segment of an "about" reference string
    AboutReference,
    /// Resolution through a stored communication-request's parent links
    CommunicationThread,
}

/// Fixed priority order for the solicited path
pub const SOLICITED_STRATEGIES: [MatchStrategy; 3] = [
    MatchStrategy::MessageIdentifier,
    MatchStrategy::RequestReference,
    MatchStrategy::BatchSubmission,
];

/// The local record an inbound message resolved to
#[derive(Debug, Clone)]
pub enum MatchTarget {
    PriorAuthorization(OutboundRequest),
    Claim(OutboundRequest),
    PayerCase(PayerCaseRecord),
}

impl MatchTarget {
    pub fn kind(&self) -> &'static str {
        match self {
            MatchTarget::PriorAuthorization(_) => "prior_authorization",
            MatchTarget::Claim(_) => "claim",
            MatchTarget::PayerCase(_) => "payer_case",
        }
    }

    fn from_request(request: OutboundRequest) -> Self {
        match request.kind {
            RequestKind::PriorAuthorization => MatchTarget::PriorAuthorization(request),
            RequestKind::Claim => MatchTarget::Claim(request),
        }
    }
}

/// A successful correlation
#[derive(Debug, Clone)]
pub struct Match {
    pub target: MatchTarget,
    pub strategy: MatchStrategy,
}

/// Result of running the correlator over one message
#[derive(Debug, Clone)]
pub enum CorrelationOutcome {
    /// The message resolved to an existing local record
    Matched(Match),
    /// The reply targets a whole batch submission rather than a single
    /// request
    BatchSubmission(ClaimBatch),
    /// The payer unilaterally opened a new case; the record was created
    NewPayerCase(PayerCaseRecord),
    /// No target found; carries the context needed for manual reconciliation
    Unmatched {
        resource_kind: String,
        reason: String,
        strategies: Vec<MatchStrategy>,
        identifiers_tried: Vec<String>,
    },
}

/// Resolves classified messages to local records through the record store
///
/// Holds no cache: the store is the single source of truth on every call.
pub struct Correlator {
    store: Arc<dyn RecordStore>,
    origin: Arc<dyn CaseOriginClassifier>,
}

impl Correlator {
    pub fn new(store: Arc<dyn RecordStore>, origin: Arc<dyn CaseOriginClassifier>) -> Self {
        Self { store, origin }
    }

    /// Correlates a solicited message to the outbound record it replies to
    ///
    /// Strategies run in `SOLICITED_STRATEGIES` order, first hit wins. A
    /// solicited message with no target is reported, never silently dropped.
    pub async fn correlate_solicited(
        &self,
        response_identifier: &str,
        payload: &Payload,
    ) -> Result<CorrelationOutcome, StoreError> {
        let mut identifiers_tried = vec![response_identifier.to_string()];

        for strategy in SOLICITED_STRATEGIES {
            let matched = match strategy {
                MatchStrategy::MessageIdentifier => {
                    self.match_by_message_identifier(response_identifier).await?
                }
                MatchStrategy::RequestReference => {
                    let reference = match payload {
                        Payload::ClaimResponse(p) => p.request_reference.as_deref(),
                        _ => None,
                    };
                    match reference {
                        Some(r) => {
                            identifiers_tried.push(r.to_string());
                            self.match_by_request_reference(r).await?
                        }
                        None => None,
                    }
                }
                MatchStrategy::BatchSubmission => {
                    if let Some(batch) = self
                        .store
                        .find_batch_by_message_identifier(response_identifier)
                        .await?
                    {
                        debug!(
                            batch_id = %batch.batch_id,
                            "solicited message correlated to batch submission"
                        );
                        return Ok(CorrelationOutcome::BatchSubmission(batch));
                    }
                    None
                }
                _ => None,
            };

            if let Some(target) = matched {
                debug!(
                    strategy = ?strategy,
                    target = target.kind(),
                    "solicited message correlated"
                );
                return Ok(CorrelationOutcome::Matched(Match { target, strategy }));
            }
        }

        let outcome = CorrelationOutcome::Unmatched {
            resource_kind: payload.kind().to_string(),
            reason: "no outbound record or batch submission matches the response identifier"
                .to_string(),
            strategies: SOLICITED_STRATEGIES.to_vec(),
            identifiers_tried,
        };
        report_miss(&outcome, true);
        Ok(outcome)
    }

    /// Correlates an unsolicited message, dispatching on payload kind
    pub async fn correlate_unsolicited(
        &self,
        message: &InboundMessage,
        payload: &Payload,
    ) -> Result<CorrelationOutcome, StoreError> {
        let outcome = match payload {
            Payload::ClaimResponse(response) => {
                self.correlate_unsolicited_response(message, response).await?
            }
            Payload::CommunicationRequest(request) => {
                self.resolve_about_list(payload.kind(), &request.about, false)
                    .await?
            }
            Payload::Communication(communication) => {
                self.resolve_about_list(payload.kind(), &communication.about, true)
                    .await?
            }
            Payload::Task(_) => CorrelationOutcome::Unmatched {
                resource_kind: payload.kind().to_string(),
                reason: "task resources have no unsolicited correlation path".to_string(),
                strategies: Vec::new(),
                identifiers_tried: Vec::new(),
            },
            Payload::Unrecognized { resource_kind, .. } => CorrelationOutcome::Unmatched {
                resource_kind: resource_kind.clone(),
                reason: "unrecognized resource kind".to_string(),
                strategies: Vec::new(),
                identifiers_tried: Vec::new(),
            },
        };

        if matches!(outcome, CorrelationOutcome::Unmatched { .. }) {
            report_miss(&outcome, false);
        }
        Ok(outcome)
    }

    /// Unsolicited response-shaped payload
    ///
    /// The payer-origination check runs before any identifier matching: when
    /// it fires, a new payer case is always created, even if an accidental
    /// identifier match exists.
    async fn correlate_unsolicited_response(
        &self,
        message: &InboundMessage,
        response: &ClaimResponsePayload,
    ) -> Result<CorrelationOutcome, StoreError> {
        if self.origin.is_payer_originated(response) {
            let kind = if response.pre_auth_ref.is_some() {
                PayerCaseKind::AdvanceAuthorization
            } else {
                PayerCaseKind::Other
            };
            let case = PayerCaseRecord::open(
                kind,
                response.identifier.clone(),
                message.header.sender.clone(),
                serde_json::to_value(response).unwrap_or(serde_json::Value::Null),
            );
            self.store.insert_payer_case(&case).await?;
            debug!(case_number = %case.case_number, "opened payer-initiated case");
            return Ok(CorrelationOutcome::NewPayerCase(case));
        }

        let mut identifiers_tried = Vec::new();
        if let Some(reference) = response.request_reference.as_deref() {
            identifiers_tried.push(reference.to_string());
            if let Some(target) = self.match_by_request_reference(reference).await? {
                return Ok(CorrelationOutcome::Matched(Match {
                    target,
                    strategy: MatchStrategy::RequestReference,
                }));
            }
        }

        Ok(CorrelationOutcome::Unmatched {
            resource_kind: "ClaimResponse".to_string(),
            reason: "response is neither payer-originated nor matched by request reference"
                .to_string(),
            strategies: vec![MatchStrategy::RequestReference],
            identifiers_tried,
        })
    }

    /// Resolves a communication's "about" reference list
    ///
    /// Each entry is tried with its identifier value first, then with the
    /// trailing path segment of its reference string. For each candidate
    /// key: prior authorizations, then claims, then payer cases, then (for
    /// communications only) stored communication-requests, whose parent
    /// links are carried forward so a reply-to-a-reply resolves to the
    /// original clinical case.
    async fn resolve_about_list(
        &self,
        resource_kind: &str,
        about: &[AboutReference],
        follow_comm_thread: bool,
    ) -> Result<CorrelationOutcome, StoreError> {
        let mut identifiers_tried = Vec::new();

        for entry in about {
            let keys = [
                (MatchStrategy::AboutIdentifier, entry.identifier.as_deref()),
                (MatchStrategy::AboutReference, entry.reference_tail()),
            ];

            for (strategy, key) in keys {
                let Some(key) = key else { continue };
                identifiers_tried.push(key.to_string());

                if let Some(target) = self.match_key_against_records(key).await? {
                    return Ok(CorrelationOutcome::Matched(Match { target, strategy }));
                }

                if follow_comm_thread {
                    if let Some(target) = self.resolve_comm_thread(key).await? {
                        return Ok(CorrelationOutcome::Matched(Match {
                            target,
                            strategy: MatchStrategy::CommunicationThread,
                        }));
                    }
                }
            }
        }

        let mut strategies = vec![MatchStrategy::AboutIdentifier, MatchStrategy::AboutReference];
        if follow_comm_thread {
            strategies.push(MatchStrategy::CommunicationThread);
        }
        Ok(CorrelationOutcome::Unmatched {
            resource_kind: resource_kind.to_string(),
            reason: if about.is_empty() {
                "payload carries no about references".to_string()
            } else {
                "no local record matches any about reference".to_string()
            },
            strategies,
            identifiers_tried,
        })
    }

    /// Tries one candidate key against prior authorizations, then claims,
    /// then payer cases
    async fn match_key_against_records(
        &self,
        key: &str,
    ) -> Result<Option<MatchTarget>, StoreError> {
        if let Some(auth) = self
            .store
            .find_request_by_reference(RequestKind::PriorAuthorization, key)
            .await?
        {
            return Ok(Some(MatchTarget::from_request(auth)));
        }
        if let Some(claim) = self
            .store
            .find_request_by_reference(RequestKind::Claim, key)
            .await?
        {
            return Ok(Some(MatchTarget::from_request(claim)));
        }
        if let Some(case) = self.store.find_payer_case_by_identifier(key).await? {
            return Ok(Some(MatchTarget::PayerCase(case)));
        }
        Ok(None)
    }

    /// Follows a stored communication-request's parent link to the original
    /// clinical case
    async fn resolve_comm_thread(&self, key: &str) -> Result<Option<MatchTarget>, StoreError> {
        let Some(record) = self.store.find_comm_record_by_identifier(key).await? else {
            return Ok(None);
        };

        let target = match record.parent {
            ParentLink::PriorAuthorization(id) | ParentLink::Claim(id) => self
                .store
                .find_request_by_id(id)
                .await?
                .map(MatchTarget::from_request),
            ParentLink::PayerCase(id) => self
                .store
                .find_payer_case_by_id(id)
                .await?
                .map(MatchTarget::PayerCase),
        };

        if target.is_none() {
            warn!(
                comm_record = %record.id,
                "communication thread parent record is missing"
            );
        }
        Ok(target)
    }

    /// Solicited strategy 1: stored message identifier, authorizations first
    async fn match_by_message_identifier(
        &self,
        response_identifier: &str,
    ) -> Result<Option<MatchTarget>, StoreError> {
        if let Some(auth) = self
            .store
            .find_request_by_message_identifier(RequestKind::PriorAuthorization, response_identifier)
            .await?
        {
            return Ok(Some(MatchTarget::from_request(auth)));
        }
        if let Some(claim) = self
            .store
            .find_request_by_message_identifier(RequestKind::Claim, response_identifier)
            .await?
        {
            return Ok(Some(MatchTarget::from_request(claim)));
        }
        Ok(None)
    }

    /// Solicited strategy 2 (also the unsolicited identifier match):
    /// payload request reference against request number or exchange request
    /// identifier, authorizations first
    async fn match_by_request_reference(
        &self,
        reference: &str,
    ) -> Result<Option<MatchTarget>, StoreError> {
        if let Some(auth) = self
            .store
            .find_request_by_reference(RequestKind::PriorAuthorization, reference)
            .await?
        {
            return Ok(Some(MatchTarget::from_request(auth)));
        }
        if let Some(claim) = self
            .store
            .find_request_by_reference(RequestKind::Claim, reference)
            .await?
        {
            return Ok(Some(MatchTarget::from_request(claim)));
        }
        Ok(None)
    }
}

/// Logs a correlation miss with the context manual reconciliation needs
fn report_miss(outcome: &CorrelationOutcome, solicited: bool) {
    if let CorrelationOutcome::Unmatched {
        resource_kind,
        reason,
        strategies,
        identifiers_tried,
    } = outcome
    {
        warn!(
            resource_kind = %resource_kind,
            solicited,
            reason = %reason,
            strategies = ?strategies,
            identifiers_tried = ?identifiers_tried,
            "inbound message could not be correlated"
        );
    }
}
