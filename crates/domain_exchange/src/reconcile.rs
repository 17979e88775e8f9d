//! Response reconciliation: folding per-item outcomes into batch state
//!
//! Each outcome is independent: an unknown batch position is skipped and
//! reported, never aborts the call. After the fold, the batch aggregate is
//! recomputed in one step as a pure function of line-item state, which makes
//! repeated application of the same outcomes a no-op.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use core_kernel::OutcomeRecordId;

use crate::batch::{BatchStatus, BatchTotals, ClaimBatch, LineOutcome, OutcomeRecord};
use crate::error::{BatchError, RecordError};
use crate::records::{OutboundRequest, RequestStatus};

/// One per-item outcome as delivered by the exchange
///
/// The batch position is the only key the exchange uses to tell claims in a
/// batch apart; it is scoped to the batch, never global.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutcomeDescriptor {
    pub batch_position: u32,
    /// Exchange outcome code (e.g. "complete", "queued", "error")
    pub outcome_code: Option<String>,
    /// Payer adjudication code (e.g. "approved", "denied")
    pub adjudication_code: Option<String>,
    /// Free-text disposition
    pub disposition: Option<String>,
    /// Exchange-assigned claim identifier
    pub claim_identifier: Option<String>,
    /// Processing errors reported by the exchange
    pub errors: Vec<String>,
}

impl OutcomeDescriptor {
    pub fn approved(position: u32) -> Self {
        Self {
            batch_position: position,
            outcome_code: Some("complete".to_string()),
            adjudication_code: Some("approved".to_string()),
            ..Default::default()
        }
    }

    pub fn denied(position: u32) -> Self {
        Self {
            batch_position: position,
            outcome_code: Some("complete".to_string()),
            adjudication_code: Some("denied".to_string()),
            ..Default::default()
        }
    }

    pub fn queued(position: u32) -> Self {
        Self {
            batch_position: position,
            outcome_code: Some("queued".to_string()),
            ..Default::default()
        }
    }
}

/// Maps exchange outcome and adjudication codes to the normalized line status
///
/// Fixed precedence, in order:
/// 1. completed outcome with approved adjudication is approved
/// 2. denied adjudication is denied regardless of outcome code
/// 3. queued outcome is queued
/// 4. error outcome is error
/// 5. anything else leaves the line pending
///
/// The ordering is load-bearing; reordering changes results silently.
pub fn map_outcome(descriptor: &OutcomeDescriptor) -> LineOutcome {
    let outcome = normalized(descriptor.outcome_code.as_deref());
    let adjudication = normalized(descriptor.adjudication_code.as_deref());

    if matches!(outcome.as_deref(), Some("complete" | "completed"))
        && matches!(adjudication.as_deref(), Some("approved" | "approval"))
    {
        return LineOutcome::Approved;
    }
    if matches!(adjudication.as_deref(), Some("denied" | "rejected")) {
        return LineOutcome::Denied;
    }
    if matches!(outcome.as_deref(), Some("queued" | "pended")) {
        return LineOutcome::Queued;
    }
    if matches!(outcome.as_deref(), Some("error")) || !descriptor.errors.is_empty() {
        return LineOutcome::Error;
    }
    LineOutcome::Pending
}

fn normalized(code: Option<&str>) -> Option<String> {
    code.map(|c| c.trim().to_ascii_lowercase())
        .filter(|c| !c.is_empty())
}

/// An outcome that could not be applied, with the reason
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkippedOutcome {
    pub batch_position: u32,
    pub reason: String,
}

/// Result of one reconciliation call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationReport {
    /// Number of outcomes folded onto line items
    pub applied: u32,
    /// Outcomes skipped because their position is unknown in this batch
    pub skipped: Vec<SkippedOutcome>,
    pub status: BatchStatus,
    pub totals: BatchTotals,
}

/// Applies per-item outcomes to a batch and recomputes its aggregate
///
/// The caller is responsible for the per-batch mutual exclusion boundary;
/// this function itself is a synchronous fold over in-memory state.
pub fn apply_outcomes(
    batch: &mut ClaimBatch,
    outcomes: &[OutcomeDescriptor],
) -> Result<ReconciliationReport, BatchError> {
    let mut applied = 0u32;
    let mut skipped = Vec::new();

    for descriptor in outcomes {
        let Some(item) = batch.item_at_mut(descriptor.batch_position) else {
            debug!(
                batch_id = %batch.batch_id,
                position = descriptor.batch_position,
                "skipping outcome for unknown batch position"
            );
            skipped.push(SkippedOutcome {
                batch_position: descriptor.batch_position,
                reason: "no item at this batch position".to_string(),
            });
            continue;
        };

        let mapped = map_outcome(descriptor);
        let record = OutcomeRecord {
            id: OutcomeRecordId::new_v7(),
            outcome_code: descriptor.outcome_code.clone(),
            adjudication_code: descriptor.adjudication_code.clone(),
            disposition: descriptor.disposition.clone(),
            claim_identifier: descriptor.claim_identifier.clone(),
            errors: descriptor.errors.clone(),
            mapped_outcome: mapped,
            observed_at: Utc::now(),
        };

        // Re-polls replay the same outcome; a duplicate observation neither
        // changes the line nor grows the audit trail.
        let duplicate = item
            .history
            .last()
            .map(|last| last.observes_same(&record))
            .unwrap_or(false);

        if mapped != LineOutcome::Pending {
            item.outcome = mapped;
        }
        if let Some(claim_identifier) = &descriptor.claim_identifier {
            item.claim_identifier = Some(claim_identifier.clone());
        }
        if !duplicate {
            item.history.push(record);
        }
        applied += 1;
    }

    // Single atomic recomputation step over all line items. Skipped only
    // when nothing was applied, so a zero-outcome poll leaves the batch
    // byte-for-byte unchanged.
    if applied > 0 {
        batch.recompute_totals();
        let derived = batch.totals.derive_status();
        if derived != batch.status {
            batch.transition_to(derived, None)?;
        }
        info!(
            batch_id = %batch.batch_id,
            applied,
            skipped = skipped.len(),
            status = batch.status.as_str(),
            approved = batch.totals.approved,
            denied = batch.totals.denied,
            pending = batch.totals.pending,
            "reconciled batch outcomes"
        );
    }

    Ok(ReconciliationReport {
        applied,
        skipped,
        status: batch.status,
        totals: batch.totals,
    })
}

/// Applies a solicited response outcome to a single outbound request
///
/// The same mapping precedence as batch lines, folded onto the request's own
/// status machine; the exchange-assigned request identifier is recorded when
/// echoed back.
pub fn apply_request_outcome(
    request: &mut OutboundRequest,
    descriptor: &OutcomeDescriptor,
    exchange_request_id: Option<&str>,
) -> Result<RequestStatus, RecordError> {
    let target = match map_outcome(descriptor) {
        LineOutcome::Approved => Some(RequestStatus::Approved),
        LineOutcome::Denied => Some(RequestStatus::Denied),
        LineOutcome::Queued => Some(RequestStatus::Queued),
        LineOutcome::Error => Some(RequestStatus::Error),
        LineOutcome::Pending => None,
    };

    if let Some(id) = exchange_request_id {
        request.exchange_request_id = Some(id.to_string());
    }
    if let Some(status) = target {
        request.update_status(status)?;
    }
    Ok(request.status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::{ClaimCategory, SourceClaim};
    use core_kernel::{Currency, Money, RequestId};

    fn batch_of(n: u32) -> ClaimBatch {
        let sources = (1..=n)
            .map(|i| SourceClaim {
                request_id: RequestId::new_v7(),
                request_number: format!("REQ-{i:04}"),
                payer_id: "payer-a".to_string(),
                provider_id: "provider-x".to_string(),
                category: ClaimCategory::Outpatient,
                amount: Money::from_minor(10_000, Currency::SAR),
                adjudication_approved: true,
            })
            .collect();
        let mut batch = ClaimBatch::assemble("BATCH-R", Currency::SAR, sources).unwrap();
        batch.mark_pending().unwrap();
        batch.transition_to(BatchStatus::Queued, None).unwrap();
        batch
    }

    #[test]
    fn test_mapping_precedence() {
        assert_eq!(map_outcome(&OutcomeDescriptor::approved(1)), LineOutcome::Approved);

        // denied adjudication wins regardless of outcome code
        let denied_while_queued = OutcomeDescriptor {
            batch_position: 1,
            outcome_code: Some("queued".to_string()),
            adjudication_code: Some("denied".to_string()),
            ..Default::default()
        };
        assert_eq!(map_outcome(&denied_while_queued), LineOutcome::Denied);

        assert_eq!(map_outcome(&OutcomeDescriptor::queued(1)), LineOutcome::Queued);

        let errored = OutcomeDescriptor {
            batch_position: 1,
            outcome_code: Some("error".to_string()),
            errors: vec!["bad segment".to_string()],
            ..Default::default()
        };
        assert_eq!(map_outcome(&errored), LineOutcome::Error);

        // approved adjudication without a completed outcome stays pending
        let unfinished = OutcomeDescriptor {
            batch_position: 1,
            adjudication_code: Some("approved".to_string()),
            ..Default::default()
        };
        assert_eq!(map_outcome(&unfinished), LineOutcome::Pending);
    }

    #[test]
    fn test_partial_responses_leave_batch_queued() {
        let mut batch = batch_of(3);
        let report = apply_outcomes(
            &mut batch,
            &[OutcomeDescriptor::approved(1), OutcomeDescriptor::denied(3)],
        )
        .unwrap();

        assert_eq!(report.applied, 2);
        assert_eq!(report.status, BatchStatus::Queued);
        assert_eq!(report.totals.approved, 1);
        assert_eq!(report.totals.denied, 1);
        assert_eq!(report.totals.pending, 1);
    }

    #[test]
    fn test_unknown_position_is_skipped_not_fatal() {
        let mut batch = batch_of(2);
        let report = apply_outcomes(
            &mut batch,
            &[OutcomeDescriptor::approved(1), OutcomeDescriptor::approved(7)],
        )
        .unwrap();

        assert_eq!(report.applied, 1);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].batch_position, 7);
    }

    #[test]
    fn test_idempotent_application() {
        let mut batch = batch_of(2);
        apply_outcomes(&mut batch, &[OutcomeDescriptor::approved(1)]).unwrap();
        let first = (batch.items[0].outcome, batch.totals, batch.status);
        let history_len = batch.items[0].history.len();

        apply_outcomes(&mut batch, &[OutcomeDescriptor::approved(1)]).unwrap();
        let second = (batch.items[0].outcome, batch.totals, batch.status);

        assert_eq!(first, second);
        assert_eq!(batch.items[0].history.len(), history_len);
    }

    #[test]
    fn test_full_reconciliation_reaches_terminal_status() {
        let mut batch = batch_of(2);
        let report = apply_outcomes(
            &mut batch,
            &[OutcomeDescriptor::approved(1), OutcomeDescriptor::approved(2)],
        )
        .unwrap();
        assert_eq!(report.status, BatchStatus::Processed);

        let mut batch = batch_of(2);
        let report = apply_outcomes(
            &mut batch,
            &[OutcomeDescriptor::denied(1), OutcomeDescriptor::denied(2)],
        )
        .unwrap();
        assert_eq!(report.status, BatchStatus::Rejected);
    }

    #[test]
    fn test_audit_entry_recorded() {
        let mut batch = batch_of(2);
        let mut descriptor = OutcomeDescriptor::approved(1);
        descriptor.claim_identifier = Some("CLM-EX-1".to_string());
        descriptor.disposition = Some("clean claim".to_string());

        apply_outcomes(&mut batch, &[descriptor]).unwrap();

        let item = batch.item_at(1).unwrap();
        assert_eq!(item.claim_identifier.as_deref(), Some("CLM-EX-1"));
        assert_eq!(item.history.len(), 1);
        assert_eq!(item.history[0].mapped_outcome, LineOutcome::Approved);
        assert_eq!(item.history[0].disposition.as_deref(), Some("clean claim"));
    }

    #[test]
    fn test_request_outcome_application() {
        use crate::records::{RequestKind, ServiceLine};

        let mut request = OutboundRequest::new(
            RequestKind::PriorAuthorization,
            "REQ-9000",
            "payer-a",
            "provider-x",
            ClaimCategory::Outpatient,
            vec![ServiceLine {
                item_code: "99213".to_string(),
                amount: Money::from_minor(15_000, Currency::SAR),
            }],
        )
        .unwrap();
        request.record_message_identifier("MSG-42").unwrap();

        let status = apply_request_outcome(
            &mut request,
            &OutcomeDescriptor::approved(0),
            Some("EXR-77"),
        )
        .unwrap();

        assert_eq!(status, RequestStatus::Approved);
        assert_eq!(request.exchange_request_id.as_deref(), Some("EXR-77"));
    }
}
