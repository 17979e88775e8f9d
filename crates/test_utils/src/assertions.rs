//! Custom Test Assertions
//!
//! Provides specialized assertion helpers for domain types that give
//! more meaningful error messages than standard assertions.

use domain_exchange::{ClaimBatch, LineOutcome};

/// Asserts that batch positions are dense and 1-based in storage order
///
/// # Panics
///
/// Panics with the offending position when a gap or duplicate exists.
pub fn assert_positions_dense(batch: &ClaimBatch) {
    for (index, item) in batch.items.iter().enumerate() {
        let expected = (index + 1) as u32;
        assert_eq!(
            item.position, expected,
            "Batch '{}' position is not dense: item {} holds position {} (expected {})",
            batch.batch_id, index, item.position, expected
        );
    }
}

/// Asserts that the batch aggregate matches a recount of its line items
///
/// # Panics
///
/// Panics when any counter disagrees with the items or the counters do not
/// sum to the total.
pub fn assert_batch_counts(batch: &ClaimBatch) {
    let approved = batch
        .items
        .iter()
        .filter(|i| i.outcome == LineOutcome::Approved)
        .count() as u32;
    let denied = batch
        .items
        .iter()
        .filter(|i| i.outcome == LineOutcome::Denied)
        .count() as u32;

    assert_eq!(
        batch.totals.claim_count,
        batch.items.len() as u32,
        "Batch '{}' claim count disagrees with item count",
        batch.batch_id
    );
    assert_eq!(
        batch.totals.approved, approved,
        "Batch '{}' approved count disagrees with items",
        batch.batch_id
    );
    assert_eq!(
        batch.totals.denied, denied,
        "Batch '{}' denied count disagrees with items",
        batch.batch_id
    );
    assert_eq!(
        batch.totals.approved + batch.totals.denied + batch.totals.pending,
        batch.totals.claim_count,
        "Batch '{}' counters do not sum to the claim count",
        batch.batch_id
    );
}

/// Asserts that every item's outcome audit trail is non-decreasing in time
///
/// # Panics
///
/// Panics when a later entry carries an earlier timestamp.
pub fn assert_histories_ordered(batch: &ClaimBatch) {
    for item in &batch.items {
        for pair in item.history.windows(2) {
            assert!(
                pair[0].observed_at <= pair[1].observed_at,
                "Batch '{}' position {} has out-of-order history entries",
                batch.batch_id,
                item.position
            );
        }
    }
}
