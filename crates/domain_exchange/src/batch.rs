//! Claim batch container and lifecycle state machine
//!
//! # Batch Lifecycle
//!
//! ```text
//! Draft -> Pending -> Submitted | Queued -> Processed* | Partial* | Rejected*
//!            |                                   ^
//!            v                                   |
//!          Error ----------(resubmit)------------+-> Pending
//! ```
//!
//! Aggregates (total amount, per-status counts) are never adjusted
//! incrementally: every mutation recomputes them as a pure function of the
//! line items, so partial failures mid-edit cannot make them drift.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{BatchId, Currency, LineItemId, Money, OutcomeRecordId, RequestId};

use crate::error::BatchError;

/// Minimum number of items a batch must carry to be submitted
pub const MIN_BATCH_ITEMS: usize = 2;
/// Maximum number of items a batch may carry
pub const MAX_BATCH_ITEMS: usize = 200;

/// Claim category as coded on the source item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClaimCategory {
    Institutional,
    Inpatient,
    DayCase,
    Outpatient,
    Professional,
    Dental,
    Oral,
    Pharmacy,
    Vision,
}

/// Normalized claim category bucket
///
/// The exchange treats near-synonym categories as one: a batch mixing
/// inpatient and day-case claims is homogeneous, one mixing dental and
/// pharmacy is not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CategoryGroup {
    Institutional,
    Professional,
    Dental,
    Pharmacy,
    Vision,
}

impl ClaimCategory {
    /// Collapses near-synonym categories into their normalized bucket
    pub fn normalize(&self) -> CategoryGroup {
        match self {
            ClaimCategory::Institutional | ClaimCategory::Inpatient | ClaimCategory::DayCase => {
                CategoryGroup::Institutional
            }
            ClaimCategory::Outpatient | ClaimCategory::Professional => CategoryGroup::Professional,
            ClaimCategory::Dental | ClaimCategory::Oral => CategoryGroup::Dental,
            ClaimCategory::Pharmacy => CategoryGroup::Pharmacy,
            ClaimCategory::Vision => CategoryGroup::Vision,
        }
    }
}

/// Batch status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatchStatus {
    /// Assembling; items may be added and removed
    Draft,
    /// Submit attempt in flight
    Pending,
    /// Sent; nothing heard back yet
    Submitted,
    /// Exchange acknowledged; some outcomes still outstanding
    Queued,
    /// All items approved (terminal)
    Processed,
    /// Full adjudication, mixed outcomes (terminal)
    Partial,
    /// All items denied (terminal)
    Rejected,
    /// Send failed; resubmission permitted
    Error,
}

impl BatchStatus {
    /// Terminal payer-adjudicated outcomes; no state may regress from these
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BatchStatus::Processed | BatchStatus::Partial | BatchStatus::Rejected
        )
    }

    /// States in which deferred polling is a legal operation
    pub fn is_pollable(&self) -> bool {
        matches!(
            self,
            BatchStatus::Submitted | BatchStatus::Queued | BatchStatus::Partial
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Draft => "draft",
            BatchStatus::Pending => "pending",
            BatchStatus::Submitted => "submitted",
            BatchStatus::Queued => "queued",
            BatchStatus::Processed => "processed",
            BatchStatus::Partial => "partial",
            BatchStatus::Rejected => "rejected",
            BatchStatus::Error => "error",
        }
    }
}

/// Current outcome of one claim inside a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LineOutcome {
    Pending,
    Approved,
    Denied,
    Queued,
    Error,
}

impl LineOutcome {
    /// Whether this outcome still awaits adjudication
    ///
    /// Queued and errored lines count as pending in aggregates: neither is a
    /// payer decision, and both keep the batch pollable.
    pub fn is_unresolved(&self) -> bool {
        matches!(
            self,
            LineOutcome::Pending | LineOutcome::Queued | LineOutcome::Error
        )
    }
}

/// Immutable audit entry for one observed outcome on a line item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeRecord {
    pub id: OutcomeRecordId,
    pub outcome_code: Option<String>,
    pub adjudication_code: Option<String>,
    pub disposition: Option<String>,
    pub claim_identifier: Option<String>,
    pub errors: Vec<String>,
    pub mapped_outcome: LineOutcome,
    pub observed_at: DateTime<Utc>,
}

impl OutcomeRecord {
    /// True when this entry observed the same wire-level outcome as `other`
    ///
    /// Used to avoid appending duplicate audit entries on re-polls; the
    /// timestamp and id are excluded from the comparison.
    pub fn observes_same(&self, other: &OutcomeRecord) -> bool {
        self.outcome_code == other.outcome_code
            && self.adjudication_code == other.adjudication_code
            && self.disposition == other.disposition
            && self.claim_identifier == other.claim_identifier
            && self.errors == other.errors
            && self.mapped_outcome == other.mapped_outcome
    }
}

/// One claim inside a batch, addressed by its 1-based batch position
///
/// The position is the sole key the exchange uses to tell claims inside a
/// batch apart in its responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchLineItem {
    pub id: LineItemId,
    /// Source item this line was assembled from
    pub source_request_id: RequestId,
    pub request_number: String,
    /// 1-based batch position, dense and gapless across the batch
    pub position: u32,
    pub category: ClaimCategory,
    pub amount: Money,
    pub outcome: LineOutcome,
    /// Exchange-assigned claim identifier once known
    pub claim_identifier: Option<String>,
    /// Immutable history of observed outcomes
    pub history: Vec<OutcomeRecord>,
}

/// Aggregate batch statistics, always recomputable from line-item state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchTotals {
    pub total_amount: Money,
    pub claim_count: u32,
    pub approved: u32,
    pub denied: u32,
    pub pending: u32,
}

impl BatchTotals {
    /// Recomputes totals as a pure function of the line items
    ///
    /// Never called incrementally; the result replaces the stored aggregate
    /// wholesale.
    pub fn compute(currency: Currency, items: &[BatchLineItem]) -> Self {
        let total_amount = items
            .iter()
            .fold(Money::zero(currency), |acc, item| acc + item.amount);

        let mut approved = 0;
        let mut denied = 0;
        let mut pending = 0;
        for item in items {
            match item.outcome {
                LineOutcome::Approved => approved += 1,
                LineOutcome::Denied => denied += 1,
                _ => pending += 1,
            }
        }

        Self {
            total_amount,
            claim_count: items.len() as u32,
            approved,
            denied,
            pending,
        }
    }

    /// Derives the aggregate batch status from the counts
    ///
    /// Idempotent: re-running against the same line-item state yields the
    /// same answer, which is what makes repeated polls safe.
    pub fn derive_status(&self) -> BatchStatus {
        if self.claim_count == 0 {
            return BatchStatus::Queued;
        }
        if self.denied == self.claim_count {
            BatchStatus::Rejected
        } else if self.approved == self.claim_count {
            BatchStatus::Processed
        } else if self.pending == 0 {
            BatchStatus::Partial
        } else {
            BatchStatus::Queued
        }
    }
}

/// A recorded batch status transition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusChange {
    pub status: BatchStatus,
    pub reason: Option<String>,
    pub changed_at: DateTime<Utc>,
}

/// An approved source item offered for batch assembly
#[derive(Debug, Clone)]
pub struct SourceClaim {
    pub request_id: RequestId,
    pub request_number: String,
    pub payer_id: String,
    pub provider_id: String,
    pub category: ClaimCategory,
    pub amount: Money,
    /// Source adjudication decision; only approved items may join a batch
    pub adjudication_approved: bool,
}

/// A container of claims submitted to the exchange together
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimBatch {
    pub id: BatchId,
    /// Caller-supplied batch identifier, unique across batches
    pub batch_id: String,
    pub payer_id: String,
    pub provider_id: String,
    pub category: CategoryGroup,
    pub currency: Currency,
    pub status: BatchStatus,
    /// Exchange-assigned message identifier, set on successful send
    pub message_identifier: Option<String>,
    pub totals: BatchTotals,
    pub items: Vec<BatchLineItem>,
    pub status_history: Vec<StatusChange>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ClaimBatch {
    /// Creates an empty Draft batch for one payer, provider, and category
    pub fn draft(
        batch_id: impl Into<String>,
        payer_id: impl Into<String>,
        provider_id: impl Into<String>,
        category: CategoryGroup,
        currency: Currency,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: BatchId::new_v7(),
            batch_id: batch_id.into(),
            payer_id: payer_id.into(),
            provider_id: provider_id.into(),
            category,
            currency,
            status: BatchStatus::Draft,
            message_identifier: None,
            totals: BatchTotals::compute(currency, &[]),
            items: Vec::new(),
            status_history: vec![StatusChange {
                status: BatchStatus::Draft,
                reason: None,
                changed_at: now,
            }],
            created_at: now,
            updated_at: now,
        }
    }

    /// Assembles a Draft batch from approved source items
    pub fn assemble(
        batch_id: impl Into<String>,
        currency: Currency,
        sources: Vec<SourceClaim>,
    ) -> Result<Self, BatchError> {
        let first = sources.first().ok_or(BatchError::TooFewItems {
            count: 0,
            min: MIN_BATCH_ITEMS,
        })?;

        let mut batch = Self::draft(
            batch_id,
            first.payer_id.clone(),
            first.provider_id.clone(),
            first.category.normalize(),
            currency,
        );
        for source in sources {
            batch.add_item(source)?;
        }
        Ok(batch)
    }

    /// Adds a source item to a Draft batch
    ///
    /// The item is always appended at the next position, including items
    /// that were previously removed; positions are never reused.
    pub fn add_item(&mut self, source: SourceClaim) -> Result<&BatchLineItem, BatchError> {
        self.ensure_draft()?;
        if self.items.len() >= MAX_BATCH_ITEMS {
            return Err(BatchError::TooManyItems {
                count: self.items.len() + 1,
                max: MAX_BATCH_ITEMS,
            });
        }
        if !source.adjudication_approved {
            return Err(BatchError::SourceNotApproved {
                request_number: source.request_number,
            });
        }
        if source.payer_id != self.payer_id {
            return Err(BatchError::MixedPayer {
                expected: self.payer_id.clone(),
                found: source.payer_id,
            });
        }
        if source.provider_id != self.provider_id {
            return Err(BatchError::MixedProvider {
                expected: self.provider_id.clone(),
                found: source.provider_id,
            });
        }
        if source.category.normalize() != self.category {
            return Err(BatchError::MixedCategory {
                expected: format!("{:?}", self.category),
                found: format!("{:?}", source.category),
            });
        }
        if source.amount.currency() != self.currency {
            return Err(BatchError::MixedCurrency {
                expected: self.currency.code().to_string(),
                found: source.amount.currency().code().to_string(),
            });
        }
        if self
            .items
            .iter()
            .any(|i| i.source_request_id == source.request_id)
        {
            return Err(BatchError::DuplicateItem {
                request_number: source.request_number,
            });
        }

        self.items.push(BatchLineItem {
            id: LineItemId::new_v7(),
            source_request_id: source.request_id,
            request_number: source.request_number,
            position: self.items.len() as u32 + 1,
            category: source.category,
            amount: source.amount,
            outcome: LineOutcome::Pending,
            claim_identifier: None,
            history: Vec::new(),
        });
        self.recompute_totals();
        self.updated_at = Utc::now();
        Ok(self.items.last().expect("item was just pushed"))
    }

    /// Removes the item at the given position from a Draft batch
    ///
    /// Remaining items are renumbered so positions stay a dense 1..N
    /// sequence, and totals are recomputed from the surviving items.
    pub fn remove_item(&mut self, position: u32) -> Result<BatchLineItem, BatchError> {
        self.ensure_draft()?;
        let index = self
            .items
            .iter()
            .position(|i| i.position == position)
            .ok_or(BatchError::UnknownPosition { position })?;

        let removed = self.items.remove(index);
        for (i, item) in self.items.iter_mut().enumerate() {
            item.position = i as u32 + 1;
        }
        self.recompute_totals();
        self.updated_at = Utc::now();
        Ok(removed)
    }

    /// Looks up a line item by batch position (batch-scoped, never global)
    pub fn item_at(&self, position: u32) -> Option<&BatchLineItem> {
        self.items.iter().find(|i| i.position == position)
    }

    pub fn item_at_mut(&mut self, position: u32) -> Option<&mut BatchLineItem> {
        self.items.iter_mut().find(|i| i.position == position)
    }

    /// Validates the Draft -> Pending submission preconditions
    ///
    /// On violation the batch stays in Draft and the error names the rule.
    pub fn validate_for_submission(&self) -> Result<(), BatchError> {
        self.ensure_draft()?;
        if self.items.len() < MIN_BATCH_ITEMS {
            return Err(BatchError::TooFewItems {
                count: self.items.len(),
                min: MIN_BATCH_ITEMS,
            });
        }
        if self.items.len() > MAX_BATCH_ITEMS {
            return Err(BatchError::TooManyItems {
                count: self.items.len(),
                max: MAX_BATCH_ITEMS,
            });
        }
        // Homogeneity was enforced item by item at assembly; recheck the
        // stored categories and currencies so a directly constructed batch
        // cannot slip by.
        for item in &self.items {
            if item.category.normalize() != self.category {
                return Err(BatchError::MixedCategory {
                    expected: format!("{:?}", self.category),
                    found: format!("{:?}", item.category),
                });
            }
            if item.amount.currency() != self.currency {
                return Err(BatchError::MixedCurrency {
                    expected: self.currency.code().to_string(),
                    found: item.amount.currency().code().to_string(),
                });
            }
        }
        Ok(())
    }

    /// Moves the batch to Pending after validating submission preconditions
    pub fn mark_pending(&mut self) -> Result<(), BatchError> {
        match self.status {
            BatchStatus::Draft => self.validate_for_submission()?,
            BatchStatus::Error => {}
            _ => {
                return Err(BatchError::InvalidStatusTransition {
                    from: self.status.as_str().to_string(),
                    to: BatchStatus::Pending.as_str().to_string(),
                })
            }
        }
        self.transition_to(BatchStatus::Pending, None)
    }

    /// Applies a status transition through the guarded table
    pub fn transition_to(
        &mut self,
        status: BatchStatus,
        reason: Option<String>,
    ) -> Result<(), BatchError> {
        if status == self.status {
            return Ok(());
        }
        if !self.can_transition_to(status) {
            return Err(BatchError::InvalidStatusTransition {
                from: self.status.as_str().to_string(),
                to: status.as_str().to_string(),
            });
        }
        self.status = status;
        self.status_history.push(StatusChange {
            status,
            reason,
            changed_at: Utc::now(),
        });
        self.updated_at = Utc::now();
        Ok(())
    }

    fn can_transition_to(&self, target: BatchStatus) -> bool {
        use BatchStatus::*;
        matches!(
            (self.status, target),
            (Draft, Pending)
                | (Pending, Submitted)
                | (Pending, Queued)
                | (Pending, Error)
                | (Error, Pending)
                | (Submitted, Queued)
                | (Submitted, Processed)
                | (Submitted, Partial)
                | (Submitted, Rejected)
                | (Queued, Processed)
                | (Queued, Partial)
                | (Queued, Rejected)
                | (Partial, Processed)
        )
    }

    /// Recomputes the aggregate totals from current line-item state
    pub fn recompute_totals(&mut self) {
        self.totals = BatchTotals::compute(self.currency, &self.items);
    }

    fn ensure_draft(&self) -> Result<(), BatchError> {
        if self.status != BatchStatus::Draft {
            return Err(BatchError::NotDraft {
                status: self.status.as_str().to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn source(n: u32, amount: i64) -> SourceClaim {
        SourceClaim {
            request_id: RequestId::new_v7(),
            request_number: format!("REQ-{n:04}"),
            payer_id: "payer-a".to_string(),
            provider_id: "provider-x".to_string(),
            category: ClaimCategory::Outpatient,
            amount: Money::from_minor(amount, Currency::SAR),
            adjudication_approved: true,
        }
    }

    fn draft_batch(items: u32) -> ClaimBatch {
        let sources = (1..=items).map(|n| source(n, 10_000)).collect();
        ClaimBatch::assemble("BATCH-001", Currency::SAR, sources).unwrap()
    }

    #[test]
    fn test_category_normalization_collapses_synonyms() {
        assert_eq!(
            ClaimCategory::Inpatient.normalize(),
            ClaimCategory::DayCase.normalize()
        );
        assert_eq!(
            ClaimCategory::Dental.normalize(),
            ClaimCategory::Oral.normalize()
        );
        assert_ne!(
            ClaimCategory::Dental.normalize(),
            ClaimCategory::Pharmacy.normalize()
        );
    }

    #[test]
    fn test_assemble_assigns_dense_positions() {
        let batch = draft_batch(4);
        let positions: Vec<u32> = batch.items.iter().map(|i| i.position).collect();
        assert_eq!(positions, vec![1, 2, 3, 4]);
        assert_eq!(batch.totals.claim_count, 4);
        assert_eq!(batch.totals.total_amount.amount(), dec!(400.00));
    }

    #[test]
    fn test_remove_renumbers_and_recomputes() {
        let mut batch = draft_batch(4);
        let removed = batch.remove_item(2).unwrap();
        assert_eq!(removed.position, 2);

        let positions: Vec<u32> = batch.items.iter().map(|i| i.position).collect();
        assert_eq!(positions, vec![1, 2, 3]);
        // total recomputed from the surviving 3 items, not decremented
        assert_eq!(batch.totals.total_amount.amount(), dec!(300.00));
        assert_eq!(batch.totals.claim_count, 3);
    }

    #[test]
    fn test_readded_item_appends_at_max_position() {
        let mut batch = draft_batch(3);
        let removed = batch.remove_item(1).unwrap();

        batch
            .add_item(SourceClaim {
                request_id: removed.source_request_id,
                request_number: removed.request_number.clone(),
                payer_id: batch.payer_id.clone(),
                provider_id: batch.provider_id.clone(),
                category: removed.category,
                amount: removed.amount,
                adjudication_approved: true,
            })
            .unwrap();

        let readded = batch
            .items
            .iter()
            .find(|i| i.source_request_id == removed.source_request_id)
            .unwrap();
        assert_eq!(readded.position, 3);
    }

    #[test]
    fn test_add_rejects_mixed_payer() {
        let mut batch = draft_batch(2);
        let mut other = source(9, 5_000);
        other.payer_id = "payer-b".to_string();
        assert!(matches!(
            batch.add_item(other),
            Err(BatchError::MixedPayer { .. })
        ));
    }

    #[test]
    fn test_add_rejects_mixed_category_after_normalization() {
        let mut batch = draft_batch(2);
        let mut other = source(9, 5_000);
        other.category = ClaimCategory::Dental;
        assert!(matches!(
            batch.add_item(other),
            Err(BatchError::MixedCategory { .. })
        ));
    }

    #[test]
    fn test_add_accepts_synonym_category() {
        let sources = vec![
            SourceClaim {
                category: ClaimCategory::Inpatient,
                ..source(1, 10_000)
            },
            SourceClaim {
                category: ClaimCategory::DayCase,
                ..source(2, 10_000)
            },
        ];
        let batch = ClaimBatch::assemble("BATCH-002", Currency::SAR, sources).unwrap();
        assert_eq!(batch.category, CategoryGroup::Institutional);
        assert_eq!(batch.items.len(), 2);
    }

    #[test]
    fn test_assemble_rejects_mixed_currency_sources() {
        let sources = vec![
            source(1, 10_000),
            SourceClaim {
                amount: Money::from_minor(10_000, Currency::USD),
                ..source(2, 10_000)
            },
        ];
        let result = ClaimBatch::assemble("BATCH-003", Currency::SAR, sources);
        assert!(matches!(result, Err(BatchError::MixedCurrency { .. })));
    }

    #[test]
    fn test_add_rejects_foreign_currency_item() {
        let mut batch = draft_batch(2);
        let mut other = source(9, 5_000);
        other.amount = Money::from_minor(5_000, Currency::USD);
        assert!(matches!(
            batch.add_item(other),
            Err(BatchError::MixedCurrency { .. })
        ));
        // the rejected item left the totals untouched
        assert_eq!(batch.totals.claim_count, 2);
        assert_eq!(batch.totals.total_amount.amount(), dec!(200.00));
    }

    #[test]
    fn test_add_rejects_unapproved_source() {
        let mut batch = draft_batch(2);
        let mut other = source(9, 5_000);
        other.adjudication_approved = false;
        assert!(matches!(
            batch.add_item(other),
            Err(BatchError::SourceNotApproved { .. })
        ));
    }

    #[test]
    fn test_submission_requires_two_items() {
        let mut batch = draft_batch(2);
        batch.remove_item(2).unwrap();
        let err = batch.mark_pending().unwrap_err();
        assert!(matches!(err, BatchError::TooFewItems { count: 1, .. }));
        assert_eq!(batch.status, BatchStatus::Draft);
    }

    #[test]
    fn test_edits_rejected_outside_draft() {
        let mut batch = draft_batch(2);
        batch.mark_pending().unwrap();
        assert!(matches!(
            batch.add_item(source(9, 5_000)),
            Err(BatchError::NotDraft { .. })
        ));
        assert!(matches!(
            batch.remove_item(1),
            Err(BatchError::NotDraft { .. })
        ));
    }

    #[test]
    fn test_no_regression_from_terminal_status() {
        let mut batch = draft_batch(2);
        batch.mark_pending().unwrap();
        batch.transition_to(BatchStatus::Queued, None).unwrap();
        batch.transition_to(BatchStatus::Rejected, None).unwrap();

        assert!(batch.transition_to(BatchStatus::Draft, None).is_err());
        assert!(batch.transition_to(BatchStatus::Pending, None).is_err());
    }

    #[test]
    fn test_error_state_permits_resubmission() {
        let mut batch = draft_batch(2);
        batch.mark_pending().unwrap();
        batch
            .transition_to(BatchStatus::Error, Some("connection refused".to_string()))
            .unwrap();
        assert!(batch.mark_pending().is_ok());
        assert_eq!(batch.status, BatchStatus::Pending);
    }

    #[test]
    fn test_derive_status_mapping() {
        let mut batch = draft_batch(3);
        batch.items[0].outcome = LineOutcome::Approved;
        batch.items[1].outcome = LineOutcome::Denied;
        batch.recompute_totals();
        assert_eq!(batch.totals.derive_status(), BatchStatus::Queued);

        batch.items[2].outcome = LineOutcome::Approved;
        batch.recompute_totals();
        assert_eq!(batch.totals.derive_status(), BatchStatus::Partial);

        for item in &mut batch.items {
            item.outcome = LineOutcome::Denied;
        }
        batch.recompute_totals();
        assert_eq!(batch.totals.derive_status(), BatchStatus::Rejected);

        for item in &mut batch.items {
            item.outcome = LineOutcome::Approved;
        }
        batch.recompute_totals();
        assert_eq!(batch.totals.derive_status(), BatchStatus::Processed);
    }

    #[test]
    fn test_counts_always_sum_to_total() {
        let mut batch = draft_batch(5);
        batch.items[0].outcome = LineOutcome::Approved;
        batch.items[1].outcome = LineOutcome::Error;
        batch.items[2].outcome = LineOutcome::Queued;
        batch.recompute_totals();

        let t = batch.totals;
        assert_eq!(t.approved + t.denied + t.pending, t.claim_count);
    }
}
