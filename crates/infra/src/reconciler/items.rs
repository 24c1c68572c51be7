use chrono::Utc;
use serde::Serialize;
use tracing::{info, instrument, warn};

use stockledger_core::{ItemId, TenantId};
use stockledger_inventory::{
    Item, ItemPatch, NewItem, NewTransaction, StockAudit, Transaction, TransactionKind, adjustment_for,
};

use super::{ApplyOutcome, ReconcileError, StockReconciler};
use crate::store::{InventoryStore, TransactionFilter};

/// Compare-and-set attempts before `repair_item` gives up with `Conflict`.
const REPAIR_ATTEMPTS: usize = 3;

/// A newly created item and its opening transaction, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreatedItem {
    pub item: Item,
    pub opening: Option<Transaction>,
}

/// Every item and transaction of a tenant, read in one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InventorySnapshot {
    pub items: Vec<Item>,
    pub transactions: Vec<Transaction>,
}

/// Result of `repair_item`: the audit taken before repairing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepairOutcome {
    pub audit: StockAudit,
    pub repaired: bool,
}

impl<S> StockReconciler<S>
where
    S: InventoryStore,
{
    /// Create an item with zero stock, then record its opening stock (if any)
    /// as an `opening` transaction.
    ///
    /// If the opening transaction fails outright the item is removed again,
    /// so a retry does not leave a duplicate SKU behind. A `PartialApply` is
    /// returned as is: the item and its opening transaction both exist.
    #[instrument(skip_all, fields(tenant_id = %new.tenant_id, sku = %new.sku))]
    pub async fn create_item(&self, new: NewItem) -> Result<CreatedItem, ReconcileError> {
        new.validate()?;

        let opening_stock = new.opening_stock;
        let item = new.into_item(ItemId::new(), Utc::now());
        self.call("insert_item", self.store.insert_item(item.clone()))
            .await?;
        info!(item_id = %item.id, "item created");

        if opening_stock == 0 {
            return Ok(CreatedItem { item, opening: None });
        }

        let applied = self
            .apply(NewTransaction {
                tenant_id: item.tenant_id,
                batch_id: None,
                item_id: item.id,
                kind: TransactionKind::Opening,
                quantity: opening_stock,
                unit_price: item.unit_cost,
                remarks: Some("opening stock".to_string()),
                occurred_at: item.created_at,
            })
            .await;

        match applied {
            Ok(ApplyOutcome { transaction, item }) => Ok(CreatedItem {
                item,
                opening: Some(transaction),
            }),
            // Item and opening transaction both exist; the error carries their ids.
            Err(e @ ReconcileError::PartialApply(_)) => Err(e),
            Err(e) => {
                self.discard_item(item.tenant_id, item.id).await;
                Err(e)
            }
        }
    }

    /// Best-effort removal of an item whose opening transaction failed.
    ///
    /// A timed-out transaction write may still have landed, so any
    /// transaction of the item goes too.
    async fn discard_item(&self, tenant_id: TenantId, item_id: ItemId) {
        match self
            .list_transactions(tenant_id, TransactionFilter::for_item(item_id))
            .await
        {
            Ok(orphans) => {
                for orphan in orphans {
                    if let Err(e) = self
                        .call("delete_transaction", self.store.delete_transaction(tenant_id, orphan.id))
                        .await
                    {
                        warn!(transaction_id = %orphan.id, error = %e, "failed to discard opening transaction");
                    }
                }
            }
            Err(e) => warn!(error = %e, "failed to list transactions of discarded item"),
        }

        match self.call("delete_item", self.store.delete_item(tenant_id, item_id)).await {
            Ok(_) => info!(item_id = %item_id, "item discarded after failed opening stock"),
            Err(e) => warn!(item_id = %item_id, error = %e, "failed to discard item; it remains with zero stock"),
        }
    }

    /// Edit descriptive fields. Stock is never written here.
    #[instrument(skip_all, fields(tenant_id = %tenant_id, item_id = %item_id))]
    pub async fn update_item(
        &self,
        tenant_id: TenantId,
        item_id: ItemId,
        patch: ItemPatch,
    ) -> Result<Item, ReconcileError> {
        let mut item = self.get_item(tenant_id, item_id).await?;
        patch.apply_to(&mut item)?;
        self.call("put_item", self.store.put_item(item.clone()))
            .await?;
        Ok(item)
    }

    /// Remove an item. Its transactions stay in the log.
    pub async fn delete_item(&self, tenant_id: TenantId, item_id: ItemId) -> Result<bool, ReconcileError> {
        let deleted = self
            .call("delete_item", self.store.delete_item(tenant_id, item_id))
            .await?;
        if deleted {
            info!(tenant_id = %tenant_id, item_id = %item_id, "item deleted");
        }
        Ok(deleted)
    }

    pub async fn list_items(&self, tenant_id: TenantId) -> Result<Vec<Item>, ReconcileError> {
        Ok(self
            .call("list_items", self.store.list_items(tenant_id))
            .await?)
    }

    pub async fn list_transactions(
        &self,
        tenant_id: TenantId,
        filter: TransactionFilter,
    ) -> Result<Vec<Transaction>, ReconcileError> {
        Ok(self
            .call(
                "list_transactions",
                self.store.list_transactions(tenant_id, filter),
            )
            .await?)
    }

    /// Bring stock to `target` by recording an adjustment transaction.
    ///
    /// Returns `None` when stock already equals `target`. The difference is
    /// computed from the stock read here; a concurrent movement between that
    /// read and the apply shifts the landing point by its own delta.
    #[instrument(skip_all, fields(tenant_id = %tenant_id, item_id = %item_id, target_stock = target))]
    pub async fn adjust_stock(
        &self,
        tenant_id: TenantId,
        item_id: ItemId,
        target: i64,
        remarks: Option<String>,
    ) -> Result<Option<ApplyOutcome>, ReconcileError> {
        let item = self.get_item(tenant_id, item_id).await?;

        let Some((kind, quantity)) = adjustment_for(item.stock, target)? else {
            return Ok(None);
        };

        let outcome = self
            .apply(NewTransaction {
                tenant_id,
                batch_id: None,
                item_id,
                kind,
                quantity,
                unit_price: item.unit_cost,
                remarks,
                occurred_at: Utc::now(),
            })
            .await?;

        Ok(Some(outcome))
    }

    /// Everything the consuming layer needs to rebuild its view.
    pub async fn snapshot(&self, tenant_id: TenantId) -> Result<InventorySnapshot, ReconcileError> {
        let items = self.list_items(tenant_id).await?;
        let transactions = self
            .list_transactions(tenant_id, TransactionFilter::all())
            .await?;
        Ok(InventorySnapshot { items, transactions })
    }

    /// Items whose stock is at or below their reorder threshold.
    pub async fn low_stock(&self, tenant_id: TenantId) -> Result<Vec<Item>, ReconcileError> {
        let items = self.list_items(tenant_id).await?;
        Ok(items.into_iter().filter(Item::needs_reorder).collect())
    }

    /// Compare an item's stock counter with its transaction log.
    pub async fn audit_item(&self, tenant_id: TenantId, item_id: ItemId) -> Result<StockAudit, ReconcileError> {
        let item = self.get_item(tenant_id, item_id).await?;
        let log = self
            .list_transactions(tenant_id, TransactionFilter::for_item(item_id))
            .await?;
        Ok(StockAudit::of(&item, &log)?)
    }

    /// Audit every item of a tenant.
    pub async fn audit_tenant(&self, tenant_id: TenantId) -> Result<Vec<StockAudit>, ReconcileError> {
        let InventorySnapshot { items, transactions } = self.snapshot(tenant_id).await?;
        let audits = items
            .iter()
            .map(|item| StockAudit::of(item, &transactions))
            .collect::<Result<Vec<_>, _>>()?;

        let drifted = audits.iter().filter(|a| !a.is_consistent()).count();
        if drifted > 0 {
            warn!(tenant_id = %tenant_id, drifted, "stock drift detected");
        }
        Ok(audits)
    }

    /// Rewrite the stock counter to the value derived from the log.
    ///
    /// Uses compare-and-set so a concurrent stock change is never
    /// overwritten; after `REPAIR_ATTEMPTS` lost races this fails with
    /// `Conflict`. Must not run while an apply of the same item sits between
    /// its two writes, or that apply's delta is counted twice.
    #[instrument(skip_all, fields(tenant_id = %tenant_id, item_id = %item_id))]
    pub async fn repair_item(&self, tenant_id: TenantId, item_id: ItemId) -> Result<RepairOutcome, ReconcileError> {
        for _ in 0..REPAIR_ATTEMPTS {
            let audit = self.audit_item(tenant_id, item_id).await?;
            if audit.is_consistent() {
                return Ok(RepairOutcome {
                    audit,
                    repaired: false,
                });
            }

            let swapped = self
                .call(
                    "compare_and_set_stock",
                    self.store
                        .compare_and_set_stock(tenant_id, item_id, audit.recorded, audit.derived),
                )
                .await?;

            if swapped {
                warn!(
                    recorded = audit.recorded,
                    derived = audit.derived,
                    "stock counter rebuilt from transaction log"
                );
                return Ok(RepairOutcome {
                    audit,
                    repaired: true,
                });
            }
        }

        Err(ReconcileError::Conflict(format!(
            "stock of item {item_id} kept changing during repair"
        )))
    }
}
