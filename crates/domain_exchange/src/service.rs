//! Exchange service: the classify -> correlate -> reconcile pipeline
//!
//! One service instance is shared across worker tasks; each inbound message
//! or poll call is handled end to end. Within a single batch, outcome
//! application and aggregate recomputation are serialized through a
//! per-batch lock; across batches there is no ordering guarantee.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{error, info, warn};

use core_kernel::{CommRecordId, RequestId};

use crate::batch::{BatchStatus, BatchTotals, ClaimBatch, OutcomeRecord};
use crate::correlate::{
    CaseOriginClassifier, CorrelationOutcome, Correlator, Match, MatchTarget,
};
use crate::error::ExchangeError;
use crate::message::{classify, Classification, InboundMessage, Payload};
use crate::ports::{ExchangeGateway, RecordStore};
use crate::reconcile::{self, OutcomeDescriptor, ReconciliationReport};
use crate::records::{CommunicationRecord, OutboundRequest, ParentLink, RequestStatus};

/// Per-batch mutual exclusion registry
///
/// Guards the "apply outcomes + recompute aggregate" step so two concurrent
/// reconciliations against the same batch cannot interleave partial updates.
#[derive(Default)]
pub(crate) struct BatchLocks {
    inner: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl BatchLocks {
    pub(crate) fn for_batch(&self, batch_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut map = self.inner.lock().expect("batch lock registry poisoned");
        map.entry(batch_id.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Drops a batch's entry once no task holds a handle to it
    ///
    /// A concurrent holder keeps the Arc alive, so an in-flight lock is
    /// never replaced by a fresh one; the registry stays bounded by the set
    /// of batches currently being worked on.
    pub(crate) fn release_if_unused(&self, batch_id: &str) {
        let mut map = self.inner.lock().expect("batch lock registry poisoned");
        if let Some(lock) = map.get(batch_id) {
            if Arc::strong_count(lock) == 1 {
                map.remove(batch_id);
            }
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.inner.lock().expect("batch lock registry poisoned").len()
    }
}

/// The persisted effect of processing one inbound message
#[derive(Debug, Clone)]
pub enum MessageDisposition {
    /// A single outbound request was updated by a matching response
    RequestUpdated {
        request_id: RequestId,
        status: RequestStatus,
    },
    /// A batch was reconciled from a response carrying item outcomes
    BatchReconciled {
        batch_id: String,
        report: ReconciliationReport,
    },
    /// The payer unilaterally opened a new case
    PayerCaseOpened { case_number: String },
    /// A communication-request was linked to its clinical parent and stored
    CommunicationLinked {
        record_id: CommRecordId,
        target_kind: String,
    },
    /// A communication resolved to its clinical parent; nothing stored
    CommunicationResolved { target_kind: String },
    /// The message could not be matched; reported, not fatal
    Unmatched {
        resource_kind: String,
        reason: String,
    },
}

/// Read view of a batch for the presentation layer
#[derive(Debug, Clone)]
pub struct BatchSummary {
    pub batch_id: String,
    pub status: BatchStatus,
    pub totals: BatchTotals,
    pub message_identifier: Option<String>,
}

/// Coordinates correlation and reconciliation over the record store
pub struct ExchangeService {
    store: Arc<dyn RecordStore>,
    gateway: Arc<dyn ExchangeGateway>,
    correlator: Correlator,
    pub(crate) locks: BatchLocks,
}

impl ExchangeService {
    pub fn new(
        store: Arc<dyn RecordStore>,
        gateway: Arc<dyn ExchangeGateway>,
        origin: Arc<dyn CaseOriginClassifier>,
    ) -> Self {
        let correlator = Correlator::new(store.clone(), origin);
        Self {
            store,
            gateway,
            correlator,
            locks: BatchLocks::default(),
        }
    }

    pub(crate) fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    pub(crate) fn gateway(&self) -> &Arc<dyn ExchangeGateway> {
        &self.gateway
    }

    /// Processes one inbound message end to end
    ///
    /// Classification gates the correlation path; the resolved effect is
    /// persisted through the record store. Correlation misses come back as
    /// `MessageDisposition::Unmatched`, never as `Err`.
    pub async fn handle_message(
        &self,
        message: &InboundMessage,
    ) -> Result<MessageDisposition, ExchangeError> {
        let Some(payload) = message.primary_payload() else {
            warn!("inbound bundle carries no recognized payload resource");
            return Ok(MessageDisposition::Unmatched {
                resource_kind: "none".to_string(),
                reason: "no recognized payload resource in bundle".to_string(),
            });
        };

        match classify(&message.header) {
            Classification::Solicited {
                response_identifier,
            } => {
                self.handle_solicited(&response_identifier, message, payload)
                    .await
            }
            Classification::Unsolicited => self.handle_unsolicited(message, payload).await,
        }
    }

    /// Processes an intake run of messages
    ///
    /// Each message is independent: one failure never blocks the siblings.
    pub async fn handle_messages(
        &self,
        messages: &[InboundMessage],
    ) -> Vec<Result<MessageDisposition, ExchangeError>> {
        let mut results = Vec::with_capacity(messages.len());
        for message in messages {
            let result = self.handle_message(message).await;
            if let Err(e) = &result {
                error!(error = %e, "message processing failed; continuing intake run");
            }
            results.push(result);
        }
        results
    }

    async fn handle_solicited(
        &self,
        response_identifier: &str,
        _message: &InboundMessage,
        payload: &Payload,
    ) -> Result<MessageDisposition, ExchangeError> {
        match self
            .correlator
            .correlate_solicited(response_identifier, payload)
            .await?
        {
            CorrelationOutcome::Matched(m) => self.apply_match(m, payload).await,
            CorrelationOutcome::BatchSubmission(batch) => {
                self.reconcile_from_response(batch, payload).await
            }
            CorrelationOutcome::Unmatched {
                resource_kind,
                reason,
                ..
            } => Ok(MessageDisposition::Unmatched {
                resource_kind,
                reason,
            }),
            // The solicited path never opens payer cases
            CorrelationOutcome::NewPayerCase(case) => Ok(MessageDisposition::PayerCaseOpened {
                case_number: case.case_number,
            }),
        }
    }

    async fn handle_unsolicited(
        &self,
        message: &InboundMessage,
        payload: &Payload,
    ) -> Result<MessageDisposition, ExchangeError> {
        match self
            .correlator
            .correlate_unsolicited(message, payload)
            .await?
        {
            CorrelationOutcome::NewPayerCase(case) => {
                info!(case_number = %case.case_number, "payer opened a new case");
                Ok(MessageDisposition::PayerCaseOpened {
                    case_number: case.case_number,
                })
            }
            CorrelationOutcome::Matched(m) => match payload {
                Payload::CommunicationRequest(request) => {
                    let record = CommunicationRecord::new(
                        request.identifier.clone(),
                        parent_link(&m.target),
                        request.reason.clone(),
                    );
                    self.store.insert_comm_record(&record).await?;
                    Ok(MessageDisposition::CommunicationLinked {
                        record_id: record.id,
                        target_kind: m.target.kind().to_string(),
                    })
                }
                Payload::Communication(_) => Ok(MessageDisposition::CommunicationResolved {
                    target_kind: m.target.kind().to_string(),
                }),
                _ => self.apply_match(m, payload).await,
            },
            CorrelationOutcome::BatchSubmission(batch) => {
                self.reconcile_from_response(batch, payload).await
            }
            CorrelationOutcome::Unmatched {
                resource_kind,
                reason,
                ..
            } => Ok(MessageDisposition::Unmatched {
                resource_kind,
                reason,
            }),
        }
    }

    /// Folds a response's item outcomes onto the batch submission it targets
    async fn reconcile_from_response(
        &self,
        batch: ClaimBatch,
        payload: &Payload,
    ) -> Result<MessageDisposition, ExchangeError> {
        let outcomes = match payload {
            Payload::ClaimResponse(response) => response.item_outcomes.as_slice(),
            _ => &[],
        };
        let report = self.reconcile_batch(&batch.batch_id, outcomes).await?;
        Ok(MessageDisposition::BatchReconciled {
            batch_id: batch.batch_id,
            report,
        })
    }

    /// Folds a matched response onto the target record
    async fn apply_match(
        &self,
        m: Match,
        payload: &Payload,
    ) -> Result<MessageDisposition, ExchangeError> {
        match m.target {
            MatchTarget::PriorAuthorization(mut request) | MatchTarget::Claim(mut request) => {
                if let Payload::ClaimResponse(response) = payload {
                    let descriptor = OutcomeDescriptor {
                        batch_position: 0,
                        outcome_code: response.outcome.clone(),
                        adjudication_code: response
                            .item_outcomes
                            .first()
                            .and_then(|o| o.adjudication_code.clone()),
                        disposition: response.disposition.clone(),
                        claim_identifier: None,
                        errors: Vec::new(),
                    };
                    let status = reconcile::apply_request_outcome(
                        &mut request,
                        &descriptor,
                        response.exchange_request_id.as_deref(),
                    )?;
                    self.store.save_request(&request).await?;
                    Ok(MessageDisposition::RequestUpdated {
                        request_id: request.id,
                        status,
                    })
                } else {
                    // A matched task or communication reply carries no
                    // adjudication; the record is acknowledged unchanged.
                    Ok(MessageDisposition::RequestUpdated {
                        request_id: request.id,
                        status: request.status,
                    })
                }
            }
            MatchTarget::PayerCase(case) => Ok(MessageDisposition::CommunicationResolved {
                target_kind: format!("payer_case:{}", case.case_number),
            }),
        }
    }

    /// Records a single request's send-time identifiers
    ///
    /// The store rejects a message identifier already recorded on another
    /// request, which is what keeps correlation keys unique.
    pub async fn record_request_submission(
        &self,
        mut request: OutboundRequest,
        message_identifier: impl Into<String>,
    ) -> Result<OutboundRequest, ExchangeError> {
        request.record_message_identifier(message_identifier)?;
        self.store.save_request(&request).await?;
        Ok(request)
    }

    /// Submits an assembled batch to the exchange
    ///
    /// A transport failure moves the batch to Error (recoverable by calling
    /// this again), never to a terminal adjudicated status. Synchronous
    /// outcomes on the acknowledgement flow through the reconciler before
    /// the batch is persisted.
    pub async fn submit_batch(&self, batch_id: &str) -> Result<ClaimBatch, ExchangeError> {
        let lock = self.locks.for_batch(batch_id);
        let result = {
            let _guard = lock.lock().await;
            self.submit_batch_locked(batch_id).await
        };
        drop(lock);
        self.locks.release_if_unused(batch_id);
        result
    }

    async fn submit_batch_locked(&self, batch_id: &str) -> Result<ClaimBatch, ExchangeError> {
        let mut batch = self
            .store
            .find_batch(batch_id)
            .await?
            .ok_or_else(|| ExchangeError::BatchNotFound(batch_id.to_string()))?;

        batch.mark_pending()?;

        match self.gateway.submit_batch(&batch).await {
            Ok(ack) => {
                batch.message_identifier = Some(ack.message_identifier.clone());
                batch.transition_to(BatchStatus::Submitted, None)?;
                if !ack.outcomes.is_empty() {
                    reconcile::apply_outcomes(&mut batch, &ack.outcomes)?;
                }
                self.store.save_batch(&batch).await?;
                info!(
                    batch_id = %batch.batch_id,
                    message_identifier = %ack.message_identifier,
                    status = batch.status.as_str(),
                    "batch submitted"
                );
                Ok(batch)
            }
            Err(e) => {
                warn!(batch_id = %batch.batch_id, error = %e, "batch send failed");
                batch.transition_to(BatchStatus::Error, Some(e.to_string()))?;
                self.store.save_batch(&batch).await?;
                Ok(batch)
            }
        }
    }

    /// Applies outcomes to a batch under its mutual-exclusion boundary
    ///
    /// Reloads the batch inside the lock so concurrent reconciliations fold
    /// onto current state rather than a stale snapshot.
    pub async fn reconcile_batch(
        &self,
        batch_id: &str,
        outcomes: &[OutcomeDescriptor],
    ) -> Result<ReconciliationReport, ExchangeError> {
        let lock = self.locks.for_batch(batch_id);
        let result = {
            let _guard = lock.lock().await;
            self.reconcile_batch_locked(batch_id, outcomes).await
        };
        drop(lock);
        self.locks.release_if_unused(batch_id);
        result
    }

    async fn reconcile_batch_locked(
        &self,
        batch_id: &str,
        outcomes: &[OutcomeDescriptor],
    ) -> Result<ReconciliationReport, ExchangeError> {
        let mut batch = self
            .store
            .find_batch(batch_id)
            .await?
            .ok_or_else(|| ExchangeError::BatchNotFound(batch_id.to_string()))?;

        let report = reconcile::apply_outcomes(&mut batch, outcomes)?;
        if report.applied > 0 {
            self.store.save_batch(&batch).await?;
        }
        Ok(report)
    }

    /// Batch read view for external callers
    pub async fn batch_summary(&self, batch_id: &str) -> Result<BatchSummary, ExchangeError> {
        let batch = self
            .store
            .find_batch(batch_id)
            .await?
            .ok_or_else(|| ExchangeError::BatchNotFound(batch_id.to_string()))?;
        Ok(BatchSummary {
            batch_id: batch.batch_id,
            status: batch.status,
            totals: batch.totals,
            message_identifier: batch.message_identifier,
        })
    }

    /// Per-item outcome history for one batch position
    pub async fn line_outcome_history(
        &self,
        batch_id: &str,
        position: u32,
    ) -> Result<Vec<OutcomeRecord>, ExchangeError> {
        let batch = self
            .store
            .find_batch(batch_id)
            .await?
            .ok_or_else(|| ExchangeError::BatchNotFound(batch_id.to_string()))?;
        let item = batch
            .item_at(position)
            .ok_or_else(|| ExchangeError::precondition(format!(
                "batch '{batch_id}' has no item at position {position}"
            )))?;
        Ok(item.history.clone())
    }
}

fn parent_link(target: &MatchTarget) -> ParentLink {
    match target {
        MatchTarget::PriorAuthorization(r) => ParentLink::PriorAuthorization(r.id),
        MatchTarget::Claim(r) => ParentLink::Claim(r.id),
        MatchTarget::PayerCase(c) => ParentLink::PayerCase(c.id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_batch_locks_evict_unused_entries() {
        let locks = BatchLocks::default();
        let lock = locks.for_batch("BATCH-A");
        {
            let _guard = lock.lock().await;
            // a lock with a live handle is never evicted
            locks.release_if_unused("BATCH-A");
            assert_eq!(locks.len(), 1);
        }
        drop(lock);
        locks.release_if_unused("BATCH-A");
        assert_eq!(locks.len(), 0);
    }

    #[tokio::test]
    async fn test_batch_locks_serialize_the_same_batch() {
        let locks = BatchLocks::default();
        let first = locks.for_batch("BATCH-B");
        let _guard = first.lock().await;

        let second = locks.for_batch("BATCH-B");
        assert!(second.try_lock().is_err());

        // a different batch is independent
        let other = locks.for_batch("BATCH-C");
        assert!(other.try_lock().is_ok());
    }
}
