use std::sync::Arc;

use thiserror::Error;

use stockledger_core::{BatchId, ItemId, TenantId, TransactionId};
use stockledger_inventory::{Item, Transaction};

/// Persistence operation error.
///
/// These are **infrastructure errors** as opposed to domain errors
/// (validation, invariants).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("record not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("backend failure: {0}")]
    Backend(String),
}

/// Selects transactions by item and/or batch. An empty filter matches every
/// transaction of the tenant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransactionFilter {
    pub item_id: Option<ItemId>,
    pub batch_id: Option<BatchId>,
}

impl TransactionFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn for_item(item_id: ItemId) -> Self {
        Self {
            item_id: Some(item_id),
            batch_id: None,
        }
    }

    pub fn for_batch(batch_id: BatchId) -> Self {
        Self {
            item_id: None,
            batch_id: Some(batch_id),
        }
    }

    pub fn matches(&self, t: &Transaction) -> bool {
        self.item_id.is_none_or(|id| t.item_id == id)
            && self.batch_id.is_none_or(|id| t.batch_id == Some(id))
    }
}

/// Tenant-scoped persistence for items and their stock transactions.
///
/// Items and transactions are separate records with no cross-record
/// transaction. Stock is only ever changed through `increment_stock`
/// (relative, evaluated by the store) or `compare_and_set_stock`; `put_item`
/// must leave the stock column untouched.
///
/// Listings are ordered deterministically: items by SKU, transactions by
/// `occurred_at` then id.
#[async_trait::async_trait]
pub trait InventoryStore: Send + Sync {
    async fn get_item(&self, tenant_id: TenantId, item_id: ItemId) -> Result<Option<Item>, StoreError>;

    async fn list_items(&self, tenant_id: TenantId) -> Result<Vec<Item>, StoreError>;

    /// Insert a new item. `Conflict` if the id is taken.
    async fn insert_item(&self, item: Item) -> Result<(), StoreError>;

    /// Overwrite an item's descriptive fields. `NotFound` if absent.
    async fn put_item(&self, item: Item) -> Result<(), StoreError>;

    /// Returns `false` when the item did not exist.
    async fn delete_item(&self, tenant_id: TenantId, item_id: ItemId) -> Result<bool, StoreError>;

    /// Atomically add `delta` to the stored stock and return the new value.
    /// `NotFound` if the item does not exist.
    async fn increment_stock(
        &self,
        tenant_id: TenantId,
        item_id: ItemId,
        delta: i64,
    ) -> Result<i64, StoreError>;

    /// Set stock to `new` only if it currently equals `expected`.
    /// `NotFound` if the item does not exist.
    async fn compare_and_set_stock(
        &self,
        tenant_id: TenantId,
        item_id: ItemId,
        expected: i64,
        new: i64,
    ) -> Result<bool, StoreError>;

    async fn get_transaction(
        &self,
        tenant_id: TenantId,
        transaction_id: TransactionId,
    ) -> Result<Option<Transaction>, StoreError>;

    async fn list_transactions(
        &self,
        tenant_id: TenantId,
        filter: TransactionFilter,
    ) -> Result<Vec<Transaction>, StoreError>;

    /// Insert a transaction. `Conflict` if the id is taken.
    async fn create_transaction(&self, transaction: Transaction) -> Result<(), StoreError>;

    /// Returns `false` when the transaction was already gone.
    async fn delete_transaction(
        &self,
        tenant_id: TenantId,
        transaction_id: TransactionId,
    ) -> Result<bool, StoreError>;
}

#[async_trait::async_trait]
impl<S> InventoryStore for Arc<S>
where
    S: InventoryStore + ?Sized,
{
    async fn get_item(&self, tenant_id: TenantId, item_id: ItemId) -> Result<Option<Item>, StoreError> {
        (**self).get_item(tenant_id, item_id).await
    }

    async fn list_items(&self, tenant_id: TenantId) -> Result<Vec<Item>, StoreError> {
        (**self).list_items(tenant_id).await
    }

    async fn insert_item(&self, item: Item) -> Result<(), StoreError> {
        (**self).insert_item(item).await
    }

    async fn put_item(&self, item: Item) -> Result<(), StoreError> {
        (**self).put_item(item).await
    }

    async fn delete_item(&self, tenant_id: TenantId, item_id: ItemId) -> Result<bool, StoreError> {
        (**self).delete_item(tenant_id, item_id).await
    }

    async fn increment_stock(
        &self,
        tenant_id: TenantId,
        item_id: ItemId,
        delta: i64,
    ) -> Result<i64, StoreError> {
        (**self).increment_stock(tenant_id, item_id, delta).await
    }

    async fn compare_and_set_stock(
        &self,
        tenant_id: TenantId,
        item_id: ItemId,
        expected: i64,
        new: i64,
    ) -> Result<bool, StoreError> {
        (**self)
            .compare_and_set_stock(tenant_id, item_id, expected, new)
            .await
    }

    async fn get_transaction(
        &self,
        tenant_id: TenantId,
        transaction_id: TransactionId,
    ) -> Result<Option<Transaction>, StoreError> {
        (**self).get_transaction(tenant_id, transaction_id).await
    }

    async fn list_transactions(
        &self,
        tenant_id: TenantId,
        filter: TransactionFilter,
    ) -> Result<Vec<Transaction>, StoreError> {
        (**self).list_transactions(tenant_id, filter).await
    }

    async fn create_transaction(&self, transaction: Transaction) -> Result<(), StoreError> {
        (**self).create_transaction(transaction).await
    }

    async fn delete_transaction(
        &self,
        tenant_id: TenantId,
        transaction_id: TransactionId,
    ) -> Result<bool, StoreError> {
        (**self).delete_transaction(tenant_id, transaction_id).await
    }
}
