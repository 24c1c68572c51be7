//! Stock ledger reconciliation.
//!
//! Keeps `Item.stock` equal to the signed sum of the item's transactions while
//! the two live in separate records with no cross-record transaction.
//!
//! ## Write ordering
//!
//! Both `apply` and `revert` are **log first, counter second**:
//!
//! ```text
//! apply:  create_transaction  ->  increment_stock(+delta)
//! revert: delete_transaction  ->  increment_stock(-delta)
//! ```
//!
//! A failure between the two steps therefore always leaves the transaction
//! log correct and only the counter stale. `repair_item` rebuilds the counter
//! from the log, so every partial state has the same recovery path.
//!
//! Stock changes are relative (`increment_stock`), evaluated by the store, so
//! concurrent sessions never lose each other's deltas. Every store call is
//! bounded by `ReconcilerConfig::store_timeout`.

use std::future::Future;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use stockledger_core::{ItemId, TenantId, TransactionId};
use stockledger_inventory::{Item, NewTransaction, Transaction};

use crate::config::ReconcilerConfig;
use crate::store::{InventoryStore, StoreError};

mod batch;
mod error;
mod items;

pub use batch::BatchOutcome;
pub use error::{BatchFailure, PartialApply, PartialRevert, ReconcileError, StepError};
pub use items::{CreatedItem, InventorySnapshot, RepairOutcome};

/// Result of a successful `apply`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplyOutcome {
    pub transaction: Transaction,
    /// The item as re-read from the store after both writes.
    pub item: Item,
}

/// Result of a `revert` that found its transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RevertOutcome {
    pub transaction: Transaction,
    /// New stock, or `None` when the item no longer exists.
    pub stock: Option<i64>,
}

/// Result of `rollback_transaction`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RollbackOutcome {
    pub transaction: Transaction,
    /// `None` when the item no longer exists.
    pub repair: Option<RepairOutcome>,
}

/// Applies and reverts stock transactions against an `InventoryStore`.
#[derive(Debug, Clone)]
pub struct StockReconciler<S> {
    store: S,
    timeout: Duration,
}

impl<S> StockReconciler<S> {
    pub fn new(store: S, config: ReconcilerConfig) -> Self {
        Self {
            store,
            timeout: config.store_timeout,
        }
    }
}

impl<S> StockReconciler<S>
where
    S: InventoryStore,
{
    /// Run one store call under the configured timeout.
    async fn call<T>(
        &self,
        operation: &'static str,
        fut: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StepError> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(source)) => Err(StepError::Store { operation, source }),
            Err(_) => Err(StepError::Timeout {
                operation,
                after: self.timeout,
            }),
        }
    }

    /// Record a new transaction and move the item's stock by its delta.
    ///
    /// Fails with `Reference` (no writes) when the item is missing,
    /// `Persistence`/`Timeout` when the transaction write fails (no stock
    /// write attempted), and `PartialApply` when only the transaction landed.
    #[instrument(
        skip_all,
        fields(tenant_id = %new.tenant_id, item_id = %new.item_id, kind = %new.kind, quantity = new.quantity)
    )]
    pub async fn apply(&self, new: NewTransaction) -> Result<ApplyOutcome, ReconcileError> {
        new.validate()?;

        let item = self
            .call("get_item", self.store.get_item(new.tenant_id, new.item_id))
            .await?
            .ok_or(ReconcileError::Reference { item_id: new.item_id })?;

        let transaction = new.into_transaction(TransactionId::new());
        self.call(
            "create_transaction",
            self.store.create_transaction(transaction.clone()),
        )
        .await?;

        let delta = transaction.apply_delta();
        let stock = match self
            .call(
                "increment_stock",
                self.store
                    .increment_stock(transaction.tenant_id, transaction.item_id, delta),
            )
            .await
        {
            Ok(stock) => stock,
            Err(cause) => {
                warn!(
                    transaction_id = %transaction.id,
                    error = %cause,
                    "transaction recorded but stock not updated"
                );
                return Err(ReconcileError::PartialApply(Box::new(PartialApply {
                    transaction,
                    cause,
                })));
            }
        };

        info!(transaction_id = %transaction.id, delta, stock, "transaction applied");

        // Both writes landed; a failed re-read only costs freshness.
        let item = match self
            .call("get_item", self.store.get_item(transaction.tenant_id, transaction.item_id))
            .await
        {
            Ok(Some(fresh)) => fresh,
            Ok(None) => Item { stock, ..item },
            Err(e) => {
                debug!(error = %e, "re-read after apply failed; using returned stock");
                Item { stock, ..item }
            }
        };

        Ok(ApplyOutcome { transaction, item })
    }

    /// Delete a transaction and undo its effect on stock.
    ///
    /// Unknown ids are a silent no-op (`Ok(None)`), as is losing a race with a
    /// concurrent revert of the same transaction. When the item is gone the
    /// stock step is skipped and the deletion still counts as success.
    #[instrument(skip_all, fields(tenant_id = %tenant_id, transaction_id = %transaction_id))]
    pub async fn revert(
        &self,
        tenant_id: TenantId,
        transaction_id: TransactionId,
    ) -> Result<Option<RevertOutcome>, ReconcileError> {
        let Some(transaction) = self
            .call(
                "get_transaction",
                self.store.get_transaction(tenant_id, transaction_id),
            )
            .await?
        else {
            debug!("transaction not found; nothing to revert");
            return Ok(None);
        };

        let deleted = self
            .call(
                "delete_transaction",
                self.store.delete_transaction(tenant_id, transaction_id),
            )
            .await?;
        if !deleted {
            debug!("transaction already deleted by another caller");
            return Ok(None);
        }

        let delta = transaction.revert_delta();
        match self
            .call(
                "increment_stock",
                self.store
                    .increment_stock(tenant_id, transaction.item_id, delta),
            )
            .await
        {
            Ok(stock) => {
                info!(item_id = %transaction.item_id, delta, stock, "transaction reverted");
                Ok(Some(RevertOutcome {
                    transaction,
                    stock: Some(stock),
                }))
            }
            Err(StepError::Store {
                source: StoreError::NotFound(_),
                ..
            }) => {
                info!(item_id = %transaction.item_id, "item no longer exists; stock step skipped");
                Ok(Some(RevertOutcome {
                    transaction,
                    stock: None,
                }))
            }
            Err(cause) => {
                warn!(error = %cause, "transaction deleted but stock not restored");
                Err(ReconcileError::PartialRevert(Box::new(PartialRevert {
                    transaction,
                    cause,
                })))
            }
        }
    }

    /// Re-issue the stock step of a partial apply.
    ///
    /// Only allowed when the original failure was definite; after a timeout
    /// the increment may already have landed, so use `repair_item` instead.
    pub async fn retry_stock(&self, partial: &PartialApply) -> Result<i64, ReconcileError> {
        self.retry_increment(&partial.transaction, partial.transaction.apply_delta(), &partial.cause)
            .await
    }

    /// Re-issue the stock step of a partial revert. Same rules as `retry_stock`.
    pub async fn complete_revert(&self, partial: &PartialRevert) -> Result<i64, ReconcileError> {
        self.retry_increment(&partial.transaction, partial.transaction.revert_delta(), &partial.cause)
            .await
    }

    async fn retry_increment(
        &self,
        transaction: &Transaction,
        delta: i64,
        cause: &StepError,
    ) -> Result<i64, ReconcileError> {
        if !cause.is_definite() {
            return Err(ReconcileError::Conflict(format!(
                "outcome of {} for transaction {} is unknown; repair item {} instead",
                cause.operation(),
                transaction.id,
                transaction.item_id
            )));
        }

        let stock = self
            .call(
                "increment_stock",
                self.store
                    .increment_stock(transaction.tenant_id, transaction.item_id, delta),
            )
            .await?;

        info!(transaction_id = %transaction.id, delta, stock, "stock step retried");
        Ok(stock)
    }

    /// Undo a partial apply by deleting the orphaned transaction, then
    /// rebuilding the item's counter from its log.
    pub async fn rollback_apply(&self, partial: &PartialApply) -> Result<RepairOutcome, ReconcileError> {
        let transaction = &partial.transaction;
        self.call(
            "delete_transaction",
            self.store
                .delete_transaction(transaction.tenant_id, transaction.id),
        )
        .await?;

        info!(transaction_id = %transaction.id, "orphaned transaction rolled back");
        self.repair_item(transaction.tenant_id, transaction.item_id).await
    }

    /// Delete a transaction without touching stock, then rebuild the item's
    /// counter from the remaining log.
    ///
    /// The by-id form of `rollback_apply` for callers that only kept the
    /// transaction id. Unlike `revert`, this never subtracts a delta that may
    /// not have been added, so it is safe on an orphan of a partial apply.
    /// Unknown ids return `Ok(None)`.
    #[instrument(skip_all, fields(tenant_id = %tenant_id, transaction_id = %transaction_id))]
    pub async fn rollback_transaction(
        &self,
        tenant_id: TenantId,
        transaction_id: TransactionId,
    ) -> Result<Option<RollbackOutcome>, ReconcileError> {
        let Some(transaction) = self
            .call(
                "get_transaction",
                self.store.get_transaction(tenant_id, transaction_id),
            )
            .await?
        else {
            return Ok(None);
        };

        self.call(
            "delete_transaction",
            self.store.delete_transaction(tenant_id, transaction_id),
        )
        .await?;
        info!(item_id = %transaction.item_id, "transaction rolled back");

        let repair = match self.repair_item(tenant_id, transaction.item_id).await {
            Ok(repair) => Some(repair),
            Err(ReconcileError::Reference { .. }) => None,
            Err(e) => return Err(e),
        };

        Ok(Some(RollbackOutcome { transaction, repair }))
    }

    /// Fetch an item, failing with `Reference` when it does not exist.
    pub async fn get_item(&self, tenant_id: TenantId, item_id: ItemId) -> Result<Item, ReconcileError> {
        self.call("get_item", self.store.get_item(tenant_id, item_id))
            .await?
            .ok_or(ReconcileError::Reference { item_id })
    }
}
