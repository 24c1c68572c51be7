use serde::Serialize;
use tracing::{info, instrument, warn};

use stockledger_core::{BatchId, DomainError, TenantId};
use stockledger_inventory::NewTransaction;

use super::{ApplyOutcome, BatchFailure, ReconcileError, RevertOutcome, StockReconciler};
use crate::store::{InventoryStore, TransactionFilter};

/// Result of a fully applied batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchOutcome {
    pub batch_id: BatchId,
    pub lines: Vec<ApplyOutcome>,
}

impl<S> StockReconciler<S>
where
    S: InventoryStore,
{
    /// Apply the lines of a multi-line sale or purchase under one batch id.
    ///
    /// All lines are validated before any write. If a line fails, the lines
    /// applied before it are reverted in reverse order and the error reports
    /// which line failed plus any compensation that failed in turn.
    #[instrument(skip_all, fields(lines = lines.len()))]
    pub async fn apply_batch(&self, lines: Vec<NewTransaction>) -> Result<BatchOutcome, ReconcileError> {
        let (tenant_id, batch_id) = validate_batch(&lines)?;

        let mut applied: Vec<ApplyOutcome> = Vec::with_capacity(lines.len());
        for (idx, mut line) in lines.into_iter().enumerate() {
            line.batch_id = Some(batch_id);

            match self.apply(line).await {
                Ok(outcome) => applied.push(outcome),
                Err(cause) => {
                    warn!(batch_id = %batch_id, failed_line = idx, error = %cause, "batch line failed; compensating");
                    let compensation_failures = self.compensate(tenant_id, &applied, &cause).await;
                    return Err(ReconcileError::Batch(Box::new(BatchFailure {
                        batch_id,
                        failed_line: idx,
                        cause,
                        compensation_failures,
                    })));
                }
            }
        }

        info!(batch_id = %batch_id, lines = applied.len(), "batch applied");
        Ok(BatchOutcome {
            batch_id,
            lines: applied,
        })
    }

    /// Revert every transaction of a batch, stopping at the first failure.
    #[instrument(skip_all, fields(tenant_id = %tenant_id, batch_id = %batch_id))]
    pub async fn revert_batch(
        &self,
        tenant_id: TenantId,
        batch_id: BatchId,
    ) -> Result<Vec<RevertOutcome>, ReconcileError> {
        let lines = self
            .list_transactions(tenant_id, TransactionFilter::for_batch(batch_id))
            .await?;

        let mut reverted = Vec::with_capacity(lines.len());
        for line in lines {
            if let Some(outcome) = self.revert(tenant_id, line.id).await? {
                reverted.push(outcome);
            }
        }
        Ok(reverted)
    }

    async fn compensate(
        &self,
        tenant_id: TenantId,
        applied: &[ApplyOutcome],
        cause: &ReconcileError,
    ) -> Vec<ReconcileError> {
        let mut failures = Vec::new();

        // The failing line may itself have left an orphaned transaction.
        if let ReconcileError::PartialApply(partial) = cause {
            if let Err(e) = self.rollback_apply(partial).await {
                failures.push(e);
            }
        }

        for outcome in applied.iter().rev() {
            if let Err(e) = self.revert(tenant_id, outcome.transaction.id).await {
                failures.push(e);
            }
        }

        failures
    }
}

fn validate_batch(lines: &[NewTransaction]) -> Result<(TenantId, BatchId), DomainError> {
    let first = lines
        .first()
        .ok_or_else(|| DomainError::validation("batch must have at least one line"))?;

    let tenant_id = first.tenant_id;
    let batch_id = lines
        .iter()
        .find_map(|line| line.batch_id)
        .unwrap_or_default();

    for (idx, line) in lines.iter().enumerate() {
        if line.tenant_id != tenant_id {
            return Err(DomainError::validation(format!(
                "line {idx} belongs to a different tenant"
            )));
        }
        if line.batch_id.is_some_and(|id| id != batch_id) {
            return Err(DomainError::validation(format!(
                "line {idx} carries a different batch id"
            )));
        }
        line.validate()
            .map_err(|e| DomainError::validation(format!("line {idx}: {e}")))?;
    }

    Ok((tenant_id, batch_id))
}
