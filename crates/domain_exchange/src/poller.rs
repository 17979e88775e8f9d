//! Deferred outcome polling
//!
//! Queued adjudication means responses arrive whenever the payer finishes;
//! polling asks the exchange for whatever is ready now. An empty poll is a
//! normal outcome and changes nothing.

use tracing::{debug, info};

use crate::batch::BatchStatus;
use crate::error::ExchangeError;
use crate::reconcile::ReconciliationReport;
use crate::service::ExchangeService;

/// Result of one poll call against one batch
#[derive(Debug, Clone)]
pub struct PollReport {
    pub batch_id: String,
    /// Outcomes fetched from the exchange on this call
    pub outcomes_fetched: usize,
    /// Reconciliation result, absent when the poll returned nothing
    pub reconciliation: Option<ReconciliationReport>,
    pub status: BatchStatus,
}

impl ExchangeService {
    /// Polls the exchange for deferred outcomes on one batch
    ///
    /// Legal only while the batch awaits responses (submitted, queued, or
    /// partially processed); polling a draft or fully terminal batch is a
    /// precondition failure, not a transport call. Outcome application runs
    /// under the batch's mutual-exclusion boundary and reloads current state,
    /// so overlapping polls for the same batch converge instead of clobbering
    /// each other.
    pub async fn poll_batch(&self, batch_id: &str) -> Result<PollReport, ExchangeError> {
        let batch = self
            .store()
            .find_batch(batch_id)
            .await?
            .ok_or_else(|| ExchangeError::BatchNotFound(batch_id.to_string()))?;

        if !batch.status.is_pollable() {
            return Err(ExchangeError::precondition(format!(
                "batch '{}' is {}; polling requires a submitted, queued, or partially processed batch",
                batch.batch_id,
                batch.status.as_str()
            )));
        }

        let outcomes = self.gateway().fetch_outcomes(&batch).await?;
        if outcomes.is_empty() {
            debug!(batch_id = %batch.batch_id, "poll returned no outcomes");
            return Ok(PollReport {
                batch_id: batch.batch_id,
                outcomes_fetched: 0,
                reconciliation: None,
                status: batch.status,
            });
        }

        let report = self.reconcile_batch(batch_id, &outcomes).await?;
        info!(
            batch_id = %batch_id,
            fetched = outcomes.len(),
            applied = report.applied,
            status = report.status.as_str(),
            "poll reconciled deferred outcomes"
        );
        Ok(PollReport {
            batch_id: batch_id.to_string(),
            outcomes_fetched: outcomes.len(),
            status: report.status,
            reconciliation: Some(report),
        })
    }

    /// Polls every batch in the given list, skipping non-pollable ones
    ///
    /// Used by the scheduled sweep: precondition failures are expected there
    /// (a batch may have reached a terminal status since it was listed) and
    /// are filtered out rather than surfaced.
    pub async fn poll_batches(&self, batch_ids: &[String]) -> Vec<Result<PollReport, ExchangeError>> {
        let mut reports = Vec::with_capacity(batch_ids.len());
        for batch_id in batch_ids {
            match self.poll_batch(batch_id).await {
                Err(ExchangeError::Precondition { rule }) => {
                    debug!(batch_id = %batch_id, rule = %rule, "skipping non-pollable batch");
                }
                result => reports.push(result),
            }
        }
        reports
    }
}
