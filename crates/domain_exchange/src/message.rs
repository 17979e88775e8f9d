//! Inbound message envelope and classification
//!
//! Every inbound bundle is an ephemeral envelope: a header plus one primary
//! payload resource of a known kind. Classification into solicited vs
//! unsolicited is a pure function of the header alone; payer-initiated
//! payloads of the same resource kind as solicited ones exist, so the payload
//! must never influence the decision.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::reconcile::OutcomeDescriptor;

/// Header of an inbound message bundle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageHeader {
    /// Identifier of this bundle, assigned by the sender
    pub message_identifier: Option<String>,
    /// Identifier of the outbound message this bundle replies to, if any
    pub response_identifier: Option<String>,
    /// Sending organization, when carried on the wire
    pub sender: Option<String>,
    /// When the transport layer received the bundle
    pub received_at: DateTime<Utc>,
}

impl MessageHeader {
    /// Creates a header for an unsolicited bundle
    pub fn unsolicited() -> Self {
        Self {
            message_identifier: None,
            response_identifier: None,
            sender: None,
            received_at: Utc::now(),
        }
    }

    /// Creates a header replying to the given outbound message identifier
    pub fn replying_to(response_identifier: impl Into<String>) -> Self {
        Self {
            message_identifier: None,
            response_identifier: Some(response_identifier.into()),
            sender: None,
            received_at: Utc::now(),
        }
    }
}

/// Result of classifying an inbound message header
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Classification {
    /// The message replies to something this system sent
    Solicited { response_identifier: String },
    /// The message carries no back-reference; payer-initiated or inferred
    Unsolicited,
}

/// Classifies a message as solicited or unsolicited
///
/// A message is solicited if and only if the header carries a non-empty
/// response identifier. Pure function of the header; the payload is never
/// inspected.
pub fn classify(header: &MessageHeader) -> Classification {
    match header.response_identifier.as_deref() {
        Some(id) if !id.trim().is_empty() => Classification::Solicited {
            response_identifier: id.to_string(),
        },
        _ => Classification::Unsolicited,
    }
}

/// A reference entry from a communication's "about" list
///
/// Each entry may carry a plain identifier value, a reference string whose
/// trailing path segment is treated as an identifier, or both.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AboutReference {
    pub identifier: Option<String>,
    pub reference: Option<String>,
}

impl AboutReference {
    /// Returns the trailing path segment of the reference string, if any
    ///
    /// `"ClaimResponse/CR-774"` yields `"CR-774"`.
    pub fn reference_tail(&self) -> Option<&str> {
        self.reference
            .as_deref()
            .and_then(|r| r.rsplit('/').next())
            .filter(|tail| !tail.is_empty())
    }
}

/// Response-shaped payload resource
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClaimResponsePayload {
    /// The payload's own identifier, assigned by the payer
    pub identifier: Option<String>,
    /// Reference to the request this response answers, when carried
    pub request_reference: Option<String>,
    /// Pre-authorization reference, present on advance authorizations
    pub pre_auth_ref: Option<String>,
    /// Exchange outcome code for the submission as a whole
    pub outcome: Option<String>,
    /// Exchange-assigned request identifier echoed back
    pub exchange_request_id: Option<String>,
    /// Free-text disposition
    pub disposition: Option<String>,
    /// Per-item outcomes, keyed by batch position for batch submissions
    pub item_outcomes: Vec<OutcomeDescriptor>,
}

/// Communication-request-shaped payload resource
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommunicationRequestPayload {
    pub identifier: Option<String>,
    pub about: Vec<AboutReference>,
    pub reason: Option<String>,
}

/// Communication-shaped payload resource
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommunicationPayload {
    pub identifier: Option<String>,
    pub about: Vec<AboutReference>,
    pub content: Option<String>,
}

/// Task-shaped payload resource
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskPayload {
    pub identifier: Option<String>,
    pub code: Option<String>,
}

/// The closed set of payload resource kinds this engine recognizes
///
/// The transport layer decodes whatever wire format the exchange speaks;
/// this engine only sees the structured result. Anything outside the known
/// kinds lands in `Unrecognized` and is reported, never guessed at.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Payload {
    ClaimResponse(ClaimResponsePayload),
    CommunicationRequest(CommunicationRequestPayload),
    Communication(CommunicationPayload),
    Task(TaskPayload),
    Unrecognized {
        resource_kind: String,
        #[serde(default)]
        raw: serde_json::Value,
    },
}

impl Payload {
    /// Human-readable resource kind, used in miss reports and logs
    pub fn kind(&self) -> &str {
        match self {
            Payload::ClaimResponse(_) => "ClaimResponse",
            Payload::CommunicationRequest(_) => "CommunicationRequest",
            Payload::Communication(_) => "Communication",
            Payload::Task(_) => "Task",
            Payload::Unrecognized { resource_kind, .. } => resource_kind,
        }
    }

    /// Returns true for kinds this engine knows how to correlate
    pub fn is_recognized(&self) -> bool {
        !matches!(self, Payload::Unrecognized { .. })
    }
}

/// An inbound message bundle: header plus an ordered list of typed resources
///
/// Not persisted as such; only the effect of processing it is.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    pub header: MessageHeader,
    pub resources: Vec<Payload>,
}

impl InboundMessage {
    pub fn new(header: MessageHeader, resources: Vec<Payload>) -> Self {
        Self { header, resources }
    }

    /// Extracts the primary payload: the first resource of a recognized kind
    pub fn primary_payload(&self) -> Option<&Payload> {
        self.resources.iter().find(|r| r.is_recognized())
    }
}
