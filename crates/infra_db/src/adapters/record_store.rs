//! PostgreSQL record-store adapter
//!
//! Implements the domain's `RecordStore` port over the four repositories,
//! translating database failures into the domain's store error vocabulary.
//! The domain layer never sees SQLx types.

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::debug;

use core_kernel::{PayerCaseId, RequestId};
use domain_exchange::{
    ClaimBatch, CommunicationRecord, OutboundRequest, PayerCaseRecord, RecordStore, RequestKind,
    StoreError,
};

use crate::repositories::{
    BatchRepository, CommRepository, PayerCaseRepository, RequestRepository,
};

/// PostgreSQL-backed implementation of the `RecordStore` port
#[derive(Debug, Clone)]
pub struct PostgresRecordStore {
    requests: RequestRepository,
    payer_cases: PayerCaseRepository,
    comms: CommRepository,
    batches: BatchRepository,
}

impl PostgresRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            requests: RequestRepository::new(pool.clone()),
            payer_cases: PayerCaseRepository::new(pool.clone()),
            comms: CommRepository::new(pool.clone()),
            batches: BatchRepository::new(pool),
        }
    }
}

#[async_trait]
impl RecordStore for PostgresRecordStore {
    async fn find_request_by_id(
        &self,
        id: RequestId,
    ) -> Result<Option<OutboundRequest>, StoreError> {
        Ok(self.requests.get_by_id(*id.as_uuid()).await?)
    }

    async fn find_request_by_message_identifier(
        &self,
        kind: RequestKind,
        message_identifier: &str,
    ) -> Result<Option<OutboundRequest>, StoreError> {
        Ok(self
            .requests
            .find_by_message_identifier(kind, message_identifier)
            .await?)
    }

    async fn find_request_by_reference(
        &self,
        kind: RequestKind,
        reference: &str,
    ) -> Result<Option<OutboundRequest>, StoreError> {
        Ok(self.requests.find_by_reference(kind, reference).await?)
    }

    async fn save_request(&self, request: &OutboundRequest) -> Result<(), StoreError> {
        debug!(request_id = %request.id, "saving outbound request");
        Ok(self.requests.upsert(request).await?)
    }

    async fn find_payer_case_by_id(
        &self,
        id: PayerCaseId,
    ) -> Result<Option<PayerCaseRecord>, StoreError> {
        Ok(self.payer_cases.get_by_id(*id.as_uuid()).await?)
    }

    async fn find_payer_case_by_identifier(
        &self,
        identifier: &str,
    ) -> Result<Option<PayerCaseRecord>, StoreError> {
        Ok(self.payer_cases.find_by_identifier(identifier).await?)
    }

    async fn insert_payer_case(&self, case: &PayerCaseRecord) -> Result<(), StoreError> {
        debug!(case_number = %case.case_number, "inserting payer case");
        Ok(self.payer_cases.insert(case).await?)
    }

    async fn find_comm_record_by_identifier(
        &self,
        identifier: &str,
    ) -> Result<Option<CommunicationRecord>, StoreError> {
        Ok(self.comms.find_by_identifier(identifier).await?)
    }

    async fn insert_comm_record(&self, record: &CommunicationRecord) -> Result<(), StoreError> {
        Ok(self.comms.insert(record).await?)
    }

    async fn find_batch(&self, batch_id: &str) -> Result<Option<ClaimBatch>, StoreError> {
        Ok(self.batches.get_by_batch_id(batch_id).await?)
    }

    async fn find_batch_by_message_identifier(
        &self,
        message_identifier: &str,
    ) -> Result<Option<ClaimBatch>, StoreError> {
        Ok(self.batches.find_by_message_identifier(message_identifier).await?)
    }

    async fn save_batch(&self, batch: &ClaimBatch) -> Result<(), StoreError> {
        debug!(batch_id = %batch.batch_id, status = batch.status.as_str(), "saving batch");
        Ok(self.batches.upsert(batch).await?)
    }
}
