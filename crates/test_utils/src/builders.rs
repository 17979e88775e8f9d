//! Test Data Builders
//!
//! Provides builder patterns for constructing test data with sensible
//! defaults. Tests specify only the relevant fields and take defaults for
//! everything else.

use core_kernel::{Currency, Money, RequestId};
use domain_exchange::{
    BatchStatus, ClaimBatch, ClaimCategory, ClaimResponsePayload, OutboundRequest, RequestKind,
    ServiceLine, SourceClaim,
};

use crate::fixtures::{MoneyFixtures, StringFixtures};

/// Builder for approved source claims ready for batching
pub struct SourceClaimBuilder {
    request_id: RequestId,
    request_number: String,
    payer_id: String,
    provider_id: String,
    category: ClaimCategory,
    amount: Money,
    adjudication_approved: bool,
}

impl Default for SourceClaimBuilder {
    fn default() -> Self {
        Self::new(1)
    }
}

impl SourceClaimBuilder {
    /// Creates a builder with defaults, numbered by `n`
    pub fn new(n: u32) -> Self {
        Self {
            request_id: RequestId::new_v7(),
            request_number: StringFixtures::request_number(n),
            payer_id: StringFixtures::payer_id().to_string(),
            provider_id: StringFixtures::provider_id().to_string(),
            category: ClaimCategory::Outpatient,
            amount: MoneyFixtures::sar_100(),
            adjudication_approved: true,
        }
    }

    pub fn with_payer(mut self, payer_id: impl Into<String>) -> Self {
        self.payer_id = payer_id.into();
        self
    }

    pub fn with_provider(mut self, provider_id: impl Into<String>) -> Self {
        self.provider_id = provider_id.into();
        self
    }

    pub fn with_category(mut self, category: ClaimCategory) -> Self {
        self.category = category;
        self
    }

    pub fn with_amount(mut self, amount: Money) -> Self {
        self.amount = amount;
        self
    }

    pub fn unapproved(mut self) -> Self {
        self.adjudication_approved = false;
        self
    }

    pub fn build(self) -> SourceClaim {
        SourceClaim {
            request_id: self.request_id,
            request_number: self.request_number,
            payer_id: self.payer_id,
            provider_id: self.provider_id,
            category: self.category,
            amount: self.amount,
            adjudication_approved: self.adjudication_approved,
        }
    }
}

/// Builder for claim batches in a chosen lifecycle stage
pub struct BatchBuilder {
    batch_id: String,
    currency: Currency,
    item_count: u32,
    status: BatchStatus,
    message_identifier: Option<String>,
}

impl Default for BatchBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl BatchBuilder {
    pub fn new() -> Self {
        Self {
            batch_id: StringFixtures::batch_id().to_string(),
            currency: Currency::SAR,
            item_count: 3,
            status: BatchStatus::Draft,
            message_identifier: None,
        }
    }

    pub fn with_batch_id(mut self, batch_id: impl Into<String>) -> Self {
        self.batch_id = batch_id.into();
        self
    }

    pub fn with_items(mut self, count: u32) -> Self {
        self.item_count = count;
        self
    }

    /// Advances the built batch to Submitted with the given identifier
    pub fn submitted(mut self, message_identifier: impl Into<String>) -> Self {
        self.status = BatchStatus::Submitted;
        self.message_identifier = Some(message_identifier.into());
        self
    }

    /// Advances the built batch to Queued with the given identifier
    pub fn queued(mut self, message_identifier: impl Into<String>) -> Self {
        self.status = BatchStatus::Queued;
        self.message_identifier = Some(message_identifier.into());
        self
    }

    /// Assembles the batch, walking it through the lifecycle to the
    /// requested status
    ///
    /// # Panics
    ///
    /// Panics on rule violations; builders are for tests with valid inputs.
    pub fn build(self) -> ClaimBatch {
        let sources = (1..=self.item_count)
            .map(|n| SourceClaimBuilder::new(n).build())
            .collect();
        let mut batch = ClaimBatch::assemble(self.batch_id, self.currency, sources)
            .expect("builder produced an invalid batch");

        if self.status == BatchStatus::Draft {
            return batch;
        }
        batch.mark_pending().expect("builder batch failed validation");
        batch.message_identifier = self.message_identifier;
        batch
            .transition_to(BatchStatus::Submitted, None)
            .expect("pending to submitted");
        if self.status == BatchStatus::Queued {
            batch
                .transition_to(BatchStatus::Queued, None)
                .expect("submitted to queued");
        }
        batch
    }
}

/// Builder for outbound requests in a chosen lifecycle stage
pub struct RequestBuilder {
    kind: RequestKind,
    request_number: String,
    payer_id: String,
    provider_id: String,
    category: ClaimCategory,
    lines: Vec<ServiceLine>,
    message_identifier: Option<String>,
    source_approved: bool,
}

impl Default for RequestBuilder {
    fn default() -> Self {
        Self::claim(1)
    }
}

impl RequestBuilder {
    pub fn claim(n: u32) -> Self {
        Self::of_kind(RequestKind::Claim, n)
    }

    pub fn prior_authorization(n: u32) -> Self {
        Self::of_kind(RequestKind::PriorAuthorization, n)
    }

    fn of_kind(kind: RequestKind, n: u32) -> Self {
        Self {
            kind,
            request_number: StringFixtures::request_number(n),
            payer_id: StringFixtures::payer_id().to_string(),
            provider_id: StringFixtures::provider_id().to_string(),
            category: ClaimCategory::Outpatient,
            lines: vec![ServiceLine {
                item_code: "99213".to_string(),
                amount: MoneyFixtures::sar_100(),
            }],
            message_identifier: None,
            source_approved: false,
        }
    }

    pub fn with_request_number(mut self, number: impl Into<String>) -> Self {
        self.request_number = number.into();
        self
    }

    pub fn with_category(mut self, category: ClaimCategory) -> Self {
        self.category = category;
        self
    }

    pub fn with_lines(mut self, lines: Vec<ServiceLine>) -> Self {
        self.lines = lines;
        self
    }

    /// Marks the built request as already sent under this identifier
    pub fn submitted(mut self, message_identifier: impl Into<String>) -> Self {
        self.message_identifier = Some(message_identifier.into());
        self
    }

    pub fn source_approved(mut self) -> Self {
        self.source_approved = true;
        self
    }

    /// # Panics
    ///
    /// Panics on rule violations; builders are for tests with valid inputs.
    pub fn build(self) -> OutboundRequest {
        let mut request = OutboundRequest::new(
            self.kind,
            self.request_number,
            self.payer_id,
            self.provider_id,
            self.category,
            self.lines,
        )
        .expect("builder produced an invalid request");
        request.source_approved = self.source_approved;
        if let Some(message_identifier) = self.message_identifier {
            request
                .record_message_identifier(message_identifier)
                .expect("fresh request already had a message identifier");
        }
        request
    }
}

/// Builder for response payloads
pub struct ResponsePayloadBuilder {
    payload: ClaimResponsePayload,
}

impl Default for ResponsePayloadBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponsePayloadBuilder {
    pub fn new() -> Self {
        Self {
            payload: ClaimResponsePayload::default(),
        }
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.payload.identifier = Some(identifier.into());
        self
    }

    pub fn with_request_reference(mut self, reference: impl Into<String>) -> Self {
        self.payload.request_reference = Some(reference.into());
        self
    }

    pub fn approved_outcome(mut self) -> Self {
        self.payload.outcome = Some("complete".to_string());
        self.payload.item_outcomes = vec![domain_exchange::OutcomeDescriptor::approved(0)];
        self
    }

    pub fn with_item_outcomes(
        mut self,
        outcomes: Vec<domain_exchange::OutcomeDescriptor>,
    ) -> Self {
        self.payload.item_outcomes = outcomes;
        self
    }

    pub fn build(self) -> ClaimResponsePayload {
        self.payload
    }
}
