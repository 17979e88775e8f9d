//! Outbound request, payer-initiated, and communication record families
//!
//! These are the local records the correlator resolves inbound messages
//! against. Outbound requests are created by the submission path and mutated
//! only by the reconciler; payer cases are created only by the correlator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{CommRecordId, Money, PayerCaseId, RequestId};

use crate::batch::ClaimCategory;
use crate::error::RecordError;

/// The two outbound record families the exchange distinguishes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestKind {
    PriorAuthorization,
    Claim,
}

impl RequestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestKind::PriorAuthorization => "prior_authorization",
            RequestKind::Claim => "claim",
        }
    }
}

/// Status of a single-item outbound request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestStatus {
    /// Assembled locally, not yet sent
    Draft,
    /// Sent to the exchange, no adjudication heard yet
    Submitted,
    /// Exchange acknowledged and deferred the adjudication
    Queued,
    /// Payer approved
    Approved,
    /// Payer denied
    Denied,
    /// Exchange reported a processing error
    Error,
}

/// A service line inside an outbound request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceLine {
    pub item_code: String,
    pub amount: Money,
}

/// A single-item submission (authorization or claim)
///
/// Once the exchange-assigned message identifier is recorded it is immutable
/// and unique per request; the record store enforces the uniqueness.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundRequest {
    pub id: RequestId,
    pub kind: RequestKind,
    /// Externally visible request number
    pub request_number: String,
    /// Exchange-assigned message identifier, set at send time
    pub message_identifier: Option<String>,
    /// Exchange-assigned request identifier, if echoed back
    pub exchange_request_id: Option<String>,
    pub payer_id: String,
    pub provider_id: String,
    pub category: ClaimCategory,
    pub status: RequestStatus,
    pub lines: Vec<ServiceLine>,
    pub total_amount: Money,
    /// Whether source adjudication approved this item for (re)submission
    pub source_approved: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OutboundRequest {
    /// Creates a draft request from its service lines
    pub fn new(
        kind: RequestKind,
        request_number: impl Into<String>,
        payer_id: impl Into<String>,
        provider_id: impl Into<String>,
        category: ClaimCategory,
        lines: Vec<ServiceLine>,
    ) -> Result<Self, RecordError> {
        let now = Utc::now();
        let currency = lines
            .first()
            .map(|l| l.amount.currency())
            .unwrap_or(core_kernel::Currency::USD);
        let total_amount = lines
            .iter()
            .fold(Money::zero(currency), |acc, l| acc + l.amount);

        Ok(Self {
            id: RequestId::new_v7(),
            kind,
            request_number: request_number.into(),
            message_identifier: None,
            exchange_request_id: None,
            payer_id: payer_id.into(),
            provider_id: provider_id.into(),
            category,
            status: RequestStatus::Draft,
            lines,
            total_amount,
            source_approved: false,
            created_at: now,
            updated_at: now,
        })
    }

    /// Records the exchange-assigned message identifier at send time
    ///
    /// The identifier is immutable once set; a second call is a rule
    /// violation regardless of the new value.
    pub fn record_message_identifier(
        &mut self,
        message_identifier: impl Into<String>,
    ) -> Result<(), RecordError> {
        if let Some(existing) = &self.message_identifier {
            return Err(RecordError::MessageIdentifierAlreadySet {
                existing: existing.clone(),
            });
        }
        self.message_identifier = Some(message_identifier.into());
        self.status = RequestStatus::Submitted;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Updates the status through the guarded transition table
    pub fn update_status(&mut self, status: RequestStatus) -> Result<(), RecordError> {
        if status == self.status {
            return Ok(());
        }
        if !self.can_transition_to(status) {
            return Err(RecordError::InvalidStatusTransition {
                from: format!("{:?}", self.status),
                to: format!("{:?}", status),
            });
        }
        self.status = status;
        self.updated_at = Utc::now();
        Ok(())
    }

    fn can_transition_to(&self, target: RequestStatus) -> bool {
        use RequestStatus::*;
        matches!(
            (self.status, target),
            (Draft, Submitted)
                | (Submitted, Queued)
                | (Submitted, Approved)
                | (Submitted, Denied)
                | (Submitted, Error)
                | (Queued, Approved)
                | (Queued, Denied)
                | (Queued, Error)
                | (Error, Submitted)
        )
    }
}

/// Why a payer case was opened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PayerCaseKind {
    /// The payer originated an advance authorization
    AdvanceAuthorization,
    /// The payer opened a case of another shape
    Other,
}

/// A record created when the payer unilaterally opens a new case
///
/// Created only by the correlator; the outbound-submission path never
/// produces one of these.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayerCaseRecord {
    pub id: PayerCaseId,
    pub case_number: String,
    pub kind: PayerCaseKind,
    /// Identifier carried on the originating payload, used for later
    /// communication matching
    pub source_identifier: Option<String>,
    pub payer_id: Option<String>,
    /// Snapshot of the originating payload for manual review
    pub payload: serde_json::Value,
    pub received_at: DateTime<Utc>,
}

impl PayerCaseRecord {
    pub fn open(
        kind: PayerCaseKind,
        source_identifier: Option<String>,
        payer_id: Option<String>,
        payload: serde_json::Value,
    ) -> Self {
        let id = PayerCaseId::new_v7();
        Self {
            id,
            case_number: generate_case_number(&id),
            kind,
            source_identifier,
            payer_id,
            payload,
            received_at: Utc::now(),
        }
    }
}

/// Link from a stored communication record to its clinical parent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParentLink {
    PriorAuthorization(RequestId),
    Claim(RequestId),
    PayerCase(PayerCaseId),
}

/// A stored communication-request, kept so a later reply can resolve to the
/// original clinical case through the thread
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommunicationRecord {
    pub id: CommRecordId,
    /// Identifier of the communication-request payload on the wire
    pub exchange_identifier: Option<String>,
    pub parent: ParentLink,
    pub reason: Option<String>,
    pub received_at: DateTime<Utc>,
}

impl CommunicationRecord {
    pub fn new(
        exchange_identifier: Option<String>,
        parent: ParentLink,
        reason: Option<String>,
    ) -> Self {
        Self {
            id: CommRecordId::new_v7(),
            exchange_identifier,
            parent,
            reason,
            received_at: Utc::now(),
        }
    }
}

/// Case numbers carry the random tail of the record id, so cases opened in
/// the same instant still number distinctly.
fn generate_case_number(id: &PayerCaseId) -> String {
    let hex = id.as_uuid().simple().to_string();
    format!("PYC-{}", hex[hex.len() - 12..].to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_kernel::Currency;
    use rust_decimal_macros::dec;

    fn test_request() -> OutboundRequest {
        OutboundRequest::new(
            RequestKind::Claim,
            "REQ-2025-0001",
            "payer-a",
            "provider-x",
            ClaimCategory::Outpatient,
            vec![ServiceLine {
                item_code: "83036".to_string(),
                amount: Money::new(dec!(120.00), Currency::SAR),
            }],
        )
        .unwrap()
    }

    #[test]
    fn test_total_amount_from_lines() {
        let mut request = test_request();
        request.lines.push(ServiceLine {
            item_code: "80061".to_string(),
            amount: Money::new(dec!(30.00), Currency::SAR),
        });
        // total is fixed at construction; the second line was added after
        assert_eq!(request.total_amount.amount(), dec!(120.00));
    }

    #[test]
    fn test_message_identifier_is_immutable() {
        let mut request = test_request();
        request.record_message_identifier("MSG-001").unwrap();
        assert_eq!(request.status, RequestStatus::Submitted);

        let second = request.record_message_identifier("MSG-002");
        assert!(matches!(
            second,
            Err(RecordError::MessageIdentifierAlreadySet { .. })
        ));
        assert_eq!(request.message_identifier.as_deref(), Some("MSG-001"));
    }

    #[test]
    fn test_status_transitions() {
        let mut request = test_request();
        request.record_message_identifier("MSG-003").unwrap();

        assert!(request.update_status(RequestStatus::Queued).is_ok());
        assert!(request.update_status(RequestStatus::Approved).is_ok());
        // terminal: no way back to queued
        assert!(request.update_status(RequestStatus::Queued).is_err());
    }

    #[test]
    fn test_error_state_permits_resubmission() {
        let mut request = test_request();
        request.record_message_identifier("MSG-004").unwrap();
        request.update_status(RequestStatus::Error).unwrap();
        assert!(request.update_status(RequestStatus::Submitted).is_ok());
    }

    #[test]
    fn test_payer_case_numbering() {
        let case = PayerCaseRecord::open(
            PayerCaseKind::AdvanceAuthorization,
            Some("ADV-9".to_string()),
            Some("payer-a".to_string()),
            serde_json::Value::Null,
        );
        assert!(case.case_number.starts_with("PYC-"));
    }

    #[test]
    fn test_simultaneous_cases_get_distinct_numbers() {
        let open = || {
            PayerCaseRecord::open(PayerCaseKind::Other, None, None, serde_json::Value::Null)
        };
        let a = open();
        let b = open();
        assert_ne!(a.case_number, b.case_number);
    }
}
