//! In-memory test adapters for the exchange ports
//!
//! `MemoryStore` implements the record store over hash maps behind an async
//! read-write lock, including the duplicate-message-identifier rule the
//! production store enforces with a unique index. `ScriptedGateway` replays
//! queued acknowledgements and poll results so tests control exactly what
//! the exchange answers.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::RwLock;

use core_kernel::{PayerCaseId, RequestId};
use domain_exchange::{
    ClaimBatch, CommunicationRecord, ExchangeGateway, OutboundRequest, OutcomeDescriptor,
    PayerCaseRecord, RecordStore, RequestKind, StoreError, SubmissionAck, TransportError,
};

/// Hash-map record store for tests
#[derive(Default)]
pub struct MemoryStore {
    requests: RwLock<HashMap<RequestId, OutboundRequest>>,
    payer_cases: RwLock<HashMap<PayerCaseId, PayerCaseRecord>>,
    comm_records: RwLock<Vec<CommunicationRecord>>,
    batches: RwLock<HashMap<String, ClaimBatch>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a request, bypassing the duplicate check
    pub async fn seed_request(&self, request: OutboundRequest) {
        self.requests.write().await.insert(request.id, request);
    }

    pub async fn seed_batch(&self, batch: ClaimBatch) {
        self.batches.write().await.insert(batch.batch_id.clone(), batch);
    }

    pub async fn seed_payer_case(&self, case: PayerCaseRecord) {
        self.payer_cases.write().await.insert(case.id, case);
    }

    pub async fn payer_case_count(&self) -> usize {
        self.payer_cases.read().await.len()
    }

    pub async fn comm_record_count(&self) -> usize {
        self.comm_records.read().await.len()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn find_request_by_id(
        &self,
        id: RequestId,
    ) -> Result<Option<OutboundRequest>, StoreError> {
        Ok(self.requests.read().await.get(&id).cloned())
    }

    async fn find_request_by_message_identifier(
        &self,
        kind: RequestKind,
        message_identifier: &str,
    ) -> Result<Option<OutboundRequest>, StoreError> {
        Ok(self
            .requests
            .read()
            .await
            .values()
            .find(|r| {
                r.kind == kind && r.message_identifier.as_deref() == Some(message_identifier)
            })
            .cloned())
    }

    async fn find_request_by_reference(
        &self,
        kind: RequestKind,
        reference: &str,
    ) -> Result<Option<OutboundRequest>, StoreError> {
        Ok(self
            .requests
            .read()
            .await
            .values()
            .find(|r| {
                r.kind == kind
                    && (r.request_number == reference
                        || r.exchange_request_id.as_deref() == Some(reference))
            })
            .cloned())
    }

    async fn save_request(&self, request: &OutboundRequest) -> Result<(), StoreError> {
        let mut requests = self.requests.write().await;
        if let Some(message_identifier) = &request.message_identifier {
            let taken = requests.values().any(|existing| {
                existing.id != request.id
                    && existing.message_identifier.as_deref() == Some(message_identifier)
            });
            if taken {
                return Err(StoreError::duplicate(
                    "OutboundRequest",
                    "message_identifier",
                    message_identifier,
                ));
            }
        }
        requests.insert(request.id, request.clone());
        Ok(())
    }

    async fn find_payer_case_by_id(
        &self,
        id: PayerCaseId,
    ) -> Result<Option<PayerCaseRecord>, StoreError> {
        Ok(self.payer_cases.read().await.get(&id).cloned())
    }

    async fn find_payer_case_by_identifier(
        &self,
        identifier: &str,
    ) -> Result<Option<PayerCaseRecord>, StoreError> {
        Ok(self
            .payer_cases
            .read()
            .await
            .values()
            .find(|c| {
                c.source_identifier.as_deref() == Some(identifier) || c.case_number == identifier
            })
            .cloned())
    }

    async fn insert_payer_case(&self, case: &PayerCaseRecord) -> Result<(), StoreError> {
        self.payer_cases.write().await.insert(case.id, case.clone());
        Ok(())
    }

    async fn find_comm_record_by_identifier(
        &self,
        identifier: &str,
    ) -> Result<Option<CommunicationRecord>, StoreError> {
        Ok(self
            .comm_records
            .read()
            .await
            .iter()
            .find(|r| r.exchange_identifier.as_deref() == Some(identifier))
            .cloned())
    }

    async fn insert_comm_record(&self, record: &CommunicationRecord) -> Result<(), StoreError> {
        self.comm_records.write().await.push(record.clone());
        Ok(())
    }

    async fn find_batch(&self, batch_id: &str) -> Result<Option<ClaimBatch>, StoreError> {
        Ok(self.batches.read().await.get(batch_id).cloned())
    }

    async fn find_batch_by_message_identifier(
        &self,
        message_identifier: &str,
    ) -> Result<Option<ClaimBatch>, StoreError> {
        Ok(self
            .batches
            .read()
            .await
            .values()
            .find(|b| b.message_identifier.as_deref() == Some(message_identifier))
            .cloned())
    }

    async fn save_batch(&self, batch: &ClaimBatch) -> Result<(), StoreError> {
        self.batches
            .write()
            .await
            .insert(batch.batch_id.clone(), batch.clone());
        Ok(())
    }
}

/// Gateway double that replays scripted exchange behavior
///
/// Submissions and polls each consume from their own queue; an exhausted
/// queue answers with a benign default (a fresh ack, an empty poll) so tests
/// only script the interesting calls.
#[derive(Default)]
pub struct ScriptedGateway {
    acks: Mutex<VecDeque<Result<SubmissionAck, TransportError>>>,
    polls: Mutex<VecDeque<Result<Vec<OutcomeDescriptor>, TransportError>>>,
    submissions: AtomicUsize,
    poll_calls: AtomicUsize,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a successful ack with no synchronous outcomes
    pub fn queue_ack(&self, message_identifier: impl Into<String>) {
        self.queue_ack_with_outcomes(message_identifier, Vec::new());
    }

    /// Queues a successful ack carrying synchronous outcomes
    pub fn queue_ack_with_outcomes(
        &self,
        message_identifier: impl Into<String>,
        outcomes: Vec<OutcomeDescriptor>,
    ) {
        self.acks
            .lock()
            .expect("ack queue poisoned")
            .push_back(Ok(SubmissionAck {
                message_identifier: message_identifier.into(),
                outcomes,
            }));
    }

    /// Queues a transport failure for the next submission
    pub fn queue_send_failure(&self, message: impl Into<String>) {
        self.acks
            .lock()
            .expect("ack queue poisoned")
            .push_back(Err(TransportError::send_failed(message)));
    }

    /// Queues the outcome list the next poll returns
    pub fn queue_poll(&self, outcomes: Vec<OutcomeDescriptor>) {
        self.polls
            .lock()
            .expect("poll queue poisoned")
            .push_back(Ok(outcomes));
    }

    /// Queues a transport failure for the next poll
    pub fn queue_poll_failure(&self, message: impl Into<String>) {
        self.polls
            .lock()
            .expect("poll queue poisoned")
            .push_back(Err(TransportError::unreachable(message)));
    }

    pub fn submission_count(&self) -> usize {
        self.submissions.load(Ordering::SeqCst)
    }

    pub fn poll_count(&self) -> usize {
        self.poll_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExchangeGateway for ScriptedGateway {
    async fn submit_batch(&self, batch: &ClaimBatch) -> Result<SubmissionAck, TransportError> {
        let n = self.submissions.fetch_add(1, Ordering::SeqCst);
        let scripted = self.acks.lock().expect("ack queue poisoned").pop_front();
        match scripted {
            Some(result) => result,
            None => Ok(SubmissionAck {
                message_identifier: format!("MSG-AUTO-{}-{n}", batch.batch_id),
                outcomes: Vec::new(),
            }),
        }
    }

    async fn fetch_outcomes(
        &self,
        _batch: &ClaimBatch,
    ) -> Result<Vec<OutcomeDescriptor>, TransportError> {
        self.poll_calls.fetch_add(1, Ordering::SeqCst);
        let scripted = self.polls.lock().expect("poll queue poisoned").pop_front();
        match scripted {
            Some(result) => result,
            None => Ok(Vec::new()),
        }
    }
}
