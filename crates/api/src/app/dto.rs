use chrono::{DateTime, Utc};
use serde::Deserialize;

use stockledger_core::{BatchId, ItemId, TenantId};
use stockledger_inventory::{NewItem, NewTransaction, TransactionKind};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct CreateItemRequest {
    pub sku: String,
    pub name: String,
    #[serde(default)]
    pub unit_cost: i64,
    #[serde(default)]
    pub selling_price: i64,
    #[serde(default)]
    pub reorder_threshold: Option<i64>,
    #[serde(default)]
    pub remarks: Option<String>,
    #[serde(default)]
    pub opening_stock: u32,
}

impl CreateItemRequest {
    pub fn into_new_item(self, tenant_id: TenantId) -> NewItem {
        NewItem {
            tenant_id,
            sku: self.sku,
            name: self.name,
            unit_cost: self.unit_cost,
            selling_price: self.selling_price,
            reorder_threshold: self.reorder_threshold,
            remarks: self.remarks,
            opening_stock: self.opening_stock,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AdjustStockRequest {
    pub target: i64,
    #[serde(default)]
    pub remarks: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ApplyTransactionRequest {
    pub item_id: ItemId,
    pub kind: TransactionKind,
    pub quantity: u32,
    #[serde(default)]
    pub unit_price: i64,
    #[serde(default)]
    pub remarks: Option<String>,
    /// Defaults to the time the request is handled.
    #[serde(default)]
    pub occurred_at: Option<DateTime<Utc>>,
}

impl ApplyTransactionRequest {
    pub fn into_new_transaction(self, tenant_id: TenantId, batch_id: Option<BatchId>) -> NewTransaction {
        NewTransaction {
            tenant_id,
            batch_id,
            item_id: self.item_id,
            kind: self.kind,
            quantity: self.quantity,
            unit_price: self.unit_price,
            remarks: self.remarks,
            occurred_at: self.occurred_at.unwrap_or_else(Utc::now),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ApplyBatchRequest {
    #[serde(default)]
    pub batch_id: Option<BatchId>,
    pub lines: Vec<ApplyTransactionRequest>,
}

impl ApplyBatchRequest {
    pub fn into_lines(self, tenant_id: TenantId) -> Vec<NewTransaction> {
        let batch_id = Some(self.batch_id.unwrap_or_default());
        self.lines
            .into_iter()
            .map(|line| line.into_new_transaction(tenant_id, batch_id))
            .collect()
    }
}

/// Query string of `GET /transactions`.
#[derive(Debug, Default, Deserialize)]
pub struct TransactionQuery {
    pub item_id: Option<ItemId>,
    pub batch_id: Option<BatchId>,
}
