//! Pre-built Test Fixtures
//!
//! Provides ready-to-use test data for common entities across the claims
//! exchange. These fixtures are designed to be consistent and predictable
//! for unit tests.

use core_kernel::{Currency, Money};
use domain_exchange::{
    AboutReference, ClaimCategory, ClaimResponsePayload, CommunicationRequestPayload,
    InboundMessage, MessageHeader, Payload,
};
use rust_decimal_macros::dec;

/// Fixture for Money test data
pub struct MoneyFixtures;

impl MoneyFixtures {
    /// Standard claim amount
    pub fn sar_100() -> Money {
        Money::new(dec!(100.00), Currency::SAR)
    }

    /// Larger amount for high-value claim scenarios
    pub fn sar_high_value() -> Money {
        Money::new(dec!(25000.00), Currency::SAR)
    }

    /// A zero amount
    pub fn sar_zero() -> Money {
        Money::zero(Currency::SAR)
    }

    /// USD amount for currency mismatch tests
    pub fn usd_100() -> Money {
        Money::new(dec!(100.00), Currency::USD)
    }
}

/// Fixture for common string identifiers
pub struct StringFixtures;

impl StringFixtures {
    pub fn payer_id() -> &'static str {
        "payer-insco"
    }

    pub fn other_payer_id() -> &'static str {
        "payer-rival"
    }

    pub fn provider_id() -> &'static str {
        "provider-clinic"
    }

    pub fn other_provider_id() -> &'static str {
        "provider-hospital"
    }

    pub fn batch_id() -> &'static str {
        "BATCH-2025-0001"
    }

    pub fn message_identifier() -> &'static str {
        "MSG-2025-0001"
    }

    /// A request number with a positional suffix
    pub fn request_number(n: u32) -> String {
        format!("REQ-2025-{n:04}")
    }
}

/// Fixture for inbound message bundles
pub struct MessageFixtures;

impl MessageFixtures {
    /// A solicited response bundle replying to the given message identifier
    pub fn solicited_response(
        response_identifier: &str,
        payload: ClaimResponsePayload,
    ) -> InboundMessage {
        InboundMessage::new(
            MessageHeader::replying_to(response_identifier),
            vec![Payload::ClaimResponse(payload)],
        )
    }

    /// An unsolicited response bundle
    pub fn unsolicited_response(payload: ClaimResponsePayload) -> InboundMessage {
        InboundMessage::new(
            MessageHeader::unsolicited(),
            vec![Payload::ClaimResponse(payload)],
        )
    }

    /// A payer-originated advance authorization: pre-auth reference present,
    /// request reference absent
    pub fn payer_initiated_response(identifier: &str) -> InboundMessage {
        Self::unsolicited_response(ClaimResponsePayload {
            identifier: Some(identifier.to_string()),
            pre_auth_ref: Some(format!("ADV-{identifier}")),
            request_reference: None,
            ..Default::default()
        })
    }

    /// An unsolicited communication-request about the given reference
    pub fn communication_request(identifier: &str, about_reference: &str) -> InboundMessage {
        InboundMessage::new(
            MessageHeader::unsolicited(),
            vec![Payload::CommunicationRequest(CommunicationRequestPayload {
                identifier: Some(identifier.to_string()),
                about: vec![AboutReference {
                    identifier: None,
                    reference: Some(about_reference.to_string()),
                }],
                reason: Some("additional documentation required".to_string()),
            })],
        )
    }
}

/// Fixture for claim categories
pub struct CategoryFixtures;

impl CategoryFixtures {
    pub fn outpatient() -> ClaimCategory {
        ClaimCategory::Outpatient
    }

    /// Same normalized group as outpatient
    pub fn professional() -> ClaimCategory {
        ClaimCategory::Professional
    }

    /// Different normalized group from outpatient
    pub fn dental() -> ClaimCategory {
        ClaimCategory::Dental
    }
}
