//! Property-Based Test Generators
//!
//! Provides proptest strategies for generating random test data
//! that maintains domain invariants.

use core_kernel::{Currency, Money};
use domain_exchange::{ClaimCategory, OutcomeDescriptor, MAX_BATCH_ITEMS, MIN_BATCH_ITEMS};
use proptest::prelude::*;

/// Strategy for generating valid Currency values
pub fn currency_strategy() -> impl Strategy<Value = Currency> {
    prop_oneof![
        Just(Currency::USD),
        Just(Currency::EUR),
        Just(Currency::GBP),
        Just(Currency::SAR),
        Just(Currency::AED),
        Just(Currency::INR),
    ]
}

/// Strategy for generating valid positive amounts in minor units
pub fn positive_amount_minor_strategy() -> impl Strategy<Value = i64> {
    1i64..1_000_000_000i64
}

/// Strategy for generating positive Money values in a single currency
pub fn sar_money_strategy() -> impl Strategy<Value = Money> {
    positive_amount_minor_strategy().prop_map(|amount| Money::from_minor(amount, Currency::SAR))
}

/// Strategy for generating claim categories
pub fn claim_category_strategy() -> impl Strategy<Value = ClaimCategory> {
    prop_oneof![
        Just(ClaimCategory::Institutional),
        Just(ClaimCategory::Inpatient),
        Just(ClaimCategory::DayCase),
        Just(ClaimCategory::Outpatient),
        Just(ClaimCategory::Professional),
        Just(ClaimCategory::Dental),
        Just(ClaimCategory::Oral),
        Just(ClaimCategory::Pharmacy),
        Just(ClaimCategory::Vision),
    ]
}

/// Strategy for generating a legal batch size
pub fn batch_size_strategy() -> impl Strategy<Value = usize> {
    MIN_BATCH_ITEMS..=MAX_BATCH_ITEMS
}

/// Strategy for generating per-item outcomes with positions inside `max_position`
pub fn outcome_descriptor_strategy(max_position: u32) -> impl Strategy<Value = OutcomeDescriptor> {
    (1..=max_position, 0u8..4u8).prop_map(|(position, shape)| match shape {
        0 => OutcomeDescriptor::approved(position),
        1 => OutcomeDescriptor::denied(position),
        2 => OutcomeDescriptor::queued(position),
        _ => OutcomeDescriptor {
            batch_position: position,
            outcome_code: Some("error".to_string()),
            errors: vec!["adjudication failed".to_string()],
            ..Default::default()
        },
    })
}

/// Strategy for a whole outcome delivery, possibly with repeated positions
pub fn outcome_batch_strategy(
    max_position: u32,
) -> impl Strategy<Value = Vec<OutcomeDescriptor>> {
    proptest::collection::vec(outcome_descriptor_strategy(max_position), 0..16)
}
