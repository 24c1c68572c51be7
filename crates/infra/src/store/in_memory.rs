use std::collections::HashMap;
use std::sync::{Mutex, RwLock};

use stockledger_core::{Entity, ItemId, TenantId, TransactionId};
use stockledger_inventory::{Item, Transaction, next_stock};

use super::r#trait::{InventoryStore, StoreError, TransactionFilter};

/// Store operation, used to target injected faults.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum StoreOp {
    GetItem,
    ListItems,
    InsertItem,
    PutItem,
    DeleteItem,
    IncrementStock,
    CompareAndSetStock,
    GetTransaction,
    ListTransactions,
    CreateTransaction,
    DeleteTransaction,
}

/// Injected misbehaviour for the next call of an operation.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Fault {
    /// Return `StoreError::Backend` without touching state.
    Fail,
    /// Never complete (simulates a hung network call).
    Hang,
}

/// In-memory tenant-isolated inventory store.
///
/// Intended for tests/dev. Supports one-shot fault injection per operation so
/// partial-failure paths can be exercised.
#[derive(Debug, Default)]
pub struct InMemoryInventoryStore {
    items: RwLock<HashMap<(TenantId, ItemId), Item>>,
    transactions: RwLock<HashMap<(TenantId, TransactionId), Transaction>>,
    faults: Mutex<HashMap<StoreOp, Fault>>,
}

impl InMemoryInventoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next call of `op` fail with a backend error.
    pub fn fail_next(&self, op: StoreOp) {
        self.inject(op, Fault::Fail);
    }

    /// Make the next call of `op` hang forever.
    pub fn hang_next(&self, op: StoreOp) {
        self.inject(op, Fault::Hang);
    }

    pub fn inject(&self, op: StoreOp, fault: Fault) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.insert(op, fault);
        }
    }

    /// Overwrite stock without a transaction, bypassing the ledger.
    ///
    /// Simulates drift from a legacy direct edit; dev/test only.
    pub fn force_stock(&self, tenant_id: TenantId, item_id: ItemId, stock: i64) -> bool {
        match self.items.write() {
            Ok(mut items) => match items.get_mut(&(tenant_id, item_id)) {
                Some(item) => {
                    item.stock = stock;
                    true
                }
                None => false,
            },
            Err(_) => false,
        }
    }

    async fn check(&self, op: StoreOp) -> Result<(), StoreError> {
        let fault = self
            .faults
            .lock()
            .map_err(|_| poisoned())?
            .remove(&op);

        match fault {
            Some(Fault::Fail) => Err(StoreError::Backend(format!("injected failure in {op:?}"))),
            Some(Fault::Hang) => {
                std::future::pending::<()>().await;
                Ok(())
            }
            None => Ok(()),
        }
    }
}

fn poisoned() -> StoreError {
    StoreError::Backend("lock poisoned".to_string())
}

fn entity_key<E: Entity>(entity: &E) -> (TenantId, E::Id) {
    (entity.tenant_id(), entity.id())
}

#[async_trait::async_trait]
impl InventoryStore for InMemoryInventoryStore {
    async fn get_item(&self, tenant_id: TenantId, item_id: ItemId) -> Result<Option<Item>, StoreError> {
        self.check(StoreOp::GetItem).await?;
        let items = self.items.read().map_err(|_| poisoned())?;
        Ok(items.get(&(tenant_id, item_id)).cloned())
    }

    async fn list_items(&self, tenant_id: TenantId) -> Result<Vec<Item>, StoreError> {
        self.check(StoreOp::ListItems).await?;
        let items = self.items.read().map_err(|_| poisoned())?;
        let mut out: Vec<Item> = items
            .iter()
            .filter_map(|((t, _), item)| (*t == tenant_id).then(|| item.clone()))
            .collect();
        out.sort_by(|a, b| a.sku.cmp(&b.sku).then(a.id.cmp(&b.id)));
        Ok(out)
    }

    async fn insert_item(&self, item: Item) -> Result<(), StoreError> {
        self.check(StoreOp::InsertItem).await?;
        let mut items = self.items.write().map_err(|_| poisoned())?;
        let key = entity_key(&item);
        if items.contains_key(&key) {
            return Err(StoreError::Conflict(format!("item {} already exists", item.id)));
        }
        items.insert(key, item);
        Ok(())
    }

    async fn put_item(&self, item: Item) -> Result<(), StoreError> {
        self.check(StoreOp::PutItem).await?;
        let mut items = self.items.write().map_err(|_| poisoned())?;
        let existing = items
            .get_mut(&entity_key(&item))
            .ok_or_else(|| StoreError::NotFound(format!("item {}", item.id)))?;

        let stock = existing.stock;
        *existing = Item { stock, ..item };
        Ok(())
    }

    async fn delete_item(&self, tenant_id: TenantId, item_id: ItemId) -> Result<bool, StoreError> {
        self.check(StoreOp::DeleteItem).await?;
        let mut items = self.items.write().map_err(|_| poisoned())?;
        Ok(items.remove(&(tenant_id, item_id)).is_some())
    }

    async fn increment_stock(
        &self,
        tenant_id: TenantId,
        item_id: ItemId,
        delta: i64,
    ) -> Result<i64, StoreError> {
        self.check(StoreOp::IncrementStock).await?;
        let mut items = self.items.write().map_err(|_| poisoned())?;
        let item = items
            .get_mut(&(tenant_id, item_id))
            .ok_or_else(|| StoreError::NotFound(format!("item {item_id}")))?;

        item.stock = next_stock(item.stock, delta).map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(item.stock)
    }

    async fn compare_and_set_stock(
        &self,
        tenant_id: TenantId,
        item_id: ItemId,
        expected: i64,
        new: i64,
    ) -> Result<bool, StoreError> {
        self.check(StoreOp::CompareAndSetStock).await?;
        let mut items = self.items.write().map_err(|_| poisoned())?;
        let item = items
            .get_mut(&(tenant_id, item_id))
            .ok_or_else(|| StoreError::NotFound(format!("item {item_id}")))?;

        if item.stock != expected {
            return Ok(false);
        }
        item.stock = new;
        Ok(true)
    }

    async fn get_transaction(
        &self,
        tenant_id: TenantId,
        transaction_id: TransactionId,
    ) -> Result<Option<Transaction>, StoreError> {
        self.check(StoreOp::GetTransaction).await?;
        let transactions = self.transactions.read().map_err(|_| poisoned())?;
        Ok(transactions.get(&(tenant_id, transaction_id)).cloned())
    }

    async fn list_transactions(
        &self,
        tenant_id: TenantId,
        filter: TransactionFilter,
    ) -> Result<Vec<Transaction>, StoreError> {
        self.check(StoreOp::ListTransactions).await?;
        let transactions = self.transactions.read().map_err(|_| poisoned())?;
        let mut out: Vec<Transaction> = transactions
            .iter()
            .filter_map(|((t, _), tx)| (*t == tenant_id && filter.matches(tx)).then(|| tx.clone()))
            .collect();
        out.sort_by(|a, b| a.occurred_at.cmp(&b.occurred_at).then(a.id.cmp(&b.id)));
        Ok(out)
    }

    async fn create_transaction(&self, transaction: Transaction) -> Result<(), StoreError> {
        self.check(StoreOp::CreateTransaction).await?;
        let mut transactions = self.transactions.write().map_err(|_| poisoned())?;
        let key = entity_key(&transaction);
        if transactions.contains_key(&key) {
            return Err(StoreError::Conflict(format!(
                "transaction {} already exists",
                transaction.id
            )));
        }
        transactions.insert(key, transaction);
        Ok(())
    }

    async fn delete_transaction(
        &self,
        tenant_id: TenantId,
        transaction_id: TransactionId,
    ) -> Result<bool, StoreError> {
        self.check(StoreOp::DeleteTransaction).await?;
        let mut transactions = self.transactions.write().map_err(|_| poisoned())?;
        Ok(transactions.remove(&(tenant_id, transaction_id)).is_some())
    }
}
