//! Postgres-backed inventory store.
//!
//! Stock is changed server-side with relative updates
//! (`SET stock = stock + $delta`), so two sessions moving the same item never
//! lose each other's delta. Schema lives in `crates/infra/migrations/`.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (unique violation) | `23505` | `Conflict` |
//! | Database (other) | any other | `Backend` |
//! | PoolClosed / RowNotFound / other | N/A | `Backend` |

use std::sync::Arc;

use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::instrument;
use uuid::Uuid;

use stockledger_core::{BatchId, ItemId, TenantId, TransactionId};
use stockledger_inventory::{Item, Transaction, TransactionKind};

use super::r#trait::{InventoryStore, StoreError, TransactionFilter};

const ITEM_COLUMNS: &str = "tenant_id, id, sku, name, stock, unit_cost, selling_price, \
                            reorder_threshold, remarks, created_at";

const TRANSACTION_COLUMNS: &str = "tenant_id, id, batch_id, item_id, kind, quantity, unit_price, \
                                   remarks, occurred_at";

/// Postgres-backed inventory store.
///
/// Every query includes `tenant_id` in the WHERE clause or primary key, so a
/// caller can never read or move another tenant's stock.
#[derive(Debug, Clone)]
pub struct PostgresInventoryStore {
    pool: Arc<PgPool>,
}

impl PostgresInventoryStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Apply pending schema migrations.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&*self.pool)
            .await
            .map_err(|e| StoreError::Backend(format!("migration failed: {e}")))
    }
}

#[async_trait::async_trait]
impl InventoryStore for PostgresInventoryStore {
    #[instrument(skip_all, fields(tenant_id = %tenant_id, item_id = %item_id), err)]
    async fn get_item(&self, tenant_id: TenantId, item_id: ItemId) -> Result<Option<Item>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {ITEM_COLUMNS} FROM items WHERE tenant_id = $1 AND id = $2"
        ))
        .bind(tenant_id.as_uuid())
        .bind(item_id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_item", e))?;

        row.as_ref().map(item_from_row).transpose()
    }

    #[instrument(skip_all, fields(tenant_id = %tenant_id), err)]
    async fn list_items(&self, tenant_id: TenantId) -> Result<Vec<Item>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {ITEM_COLUMNS} FROM items WHERE tenant_id = $1 ORDER BY sku ASC, id ASC"
        ))
        .bind(tenant_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_items", e))?;

        rows.iter().map(item_from_row).collect()
    }

    #[instrument(skip_all, fields(tenant_id = %item.tenant_id, item_id = %item.id), err)]
    async fn insert_item(&self, item: Item) -> Result<(), StoreError> {
        sqlx::query(&format!(
            "INSERT INTO items ({ITEM_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)"
        ))
        .bind(item.tenant_id.as_uuid())
        .bind(item.id.as_uuid())
        .bind(&item.sku)
        .bind(&item.name)
        .bind(item.stock)
        .bind(item.unit_cost)
        .bind(item.selling_price)
        .bind(item.reorder_threshold)
        .bind(&item.remarks)
        .bind(item.created_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_item", e))?;

        Ok(())
    }

    #[instrument(skip_all, fields(tenant_id = %item.tenant_id, item_id = %item.id), err)]
    async fn put_item(&self, item: Item) -> Result<(), StoreError> {
        // Stock is not part of the update.
        let result = sqlx::query(
            r#"
            UPDATE items
            SET sku = $3,
                name = $4,
                unit_cost = $5,
                selling_price = $6,
                reorder_threshold = $7,
                remarks = $8
            WHERE tenant_id = $1 AND id = $2
            "#,
        )
        .bind(item.tenant_id.as_uuid())
        .bind(item.id.as_uuid())
        .bind(&item.sku)
        .bind(&item.name)
        .bind(item.unit_cost)
        .bind(item.selling_price)
        .bind(item.reorder_threshold)
        .bind(&item.remarks)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("put_item", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("item {}", item.id)));
        }
        Ok(())
    }

    #[instrument(skip_all, fields(tenant_id = %tenant_id, item_id = %item_id), err)]
    async fn delete_item(&self, tenant_id: TenantId, item_id: ItemId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM items WHERE tenant_id = $1 AND id = $2")
            .bind(tenant_id.as_uuid())
            .bind(item_id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_item", e))?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip_all, fields(tenant_id = %tenant_id, item_id = %item_id), err)]
    async fn increment_stock(
        &self,
        tenant_id: TenantId,
        item_id: ItemId,
        delta: i64,
    ) -> Result<i64, StoreError> {
        let row = sqlx::query(
            "UPDATE items SET stock = stock + $3 WHERE tenant_id = $1 AND id = $2 RETURNING stock",
        )
        .bind(tenant_id.as_uuid())
        .bind(item_id.as_uuid())
        .bind(delta)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("increment_stock", e))?;

        match row {
            Some(row) => row
                .try_get::<i64, _>("stock")
                .map_err(|e| map_sqlx_error("increment_stock", e)),
            None => Err(StoreError::NotFound(format!("item {item_id}"))),
        }
    }

    #[instrument(skip_all, fields(tenant_id = %tenant_id, item_id = %item_id), err)]
    async fn compare_and_set_stock(
        &self,
        tenant_id: TenantId,
        item_id: ItemId,
        expected: i64,
        new: i64,
    ) -> Result<bool, StoreError> {
        let row = sqlx::query(
            r#"
            WITH target AS (
                SELECT stock FROM items WHERE tenant_id = $1 AND id = $2
            ), updated AS (
                UPDATE items SET stock = $4
                WHERE tenant_id = $1 AND id = $2 AND stock = $3
                RETURNING 1
            )
            SELECT
                EXISTS (SELECT 1 FROM target) AS found,
                EXISTS (SELECT 1 FROM updated) AS swapped
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(item_id.as_uuid())
        .bind(expected)
        .bind(new)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("compare_and_set_stock", e))?;

        let found: bool = row
            .try_get("found")
            .map_err(|e| map_sqlx_error("compare_and_set_stock", e))?;
        if !found {
            return Err(StoreError::NotFound(format!("item {item_id}")));
        }

        row.try_get("swapped")
            .map_err(|e| map_sqlx_error("compare_and_set_stock", e))
    }

    #[instrument(skip_all, fields(tenant_id = %tenant_id, transaction_id = %transaction_id), err)]
    async fn get_transaction(
        &self,
        tenant_id: TenantId,
        transaction_id: TransactionId,
    ) -> Result<Option<Transaction>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM stock_transactions WHERE tenant_id = $1 AND id = $2"
        ))
        .bind(tenant_id.as_uuid())
        .bind(transaction_id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_transaction", e))?;

        row.as_ref().map(transaction_from_row).transpose()
    }

    #[instrument(skip_all, fields(tenant_id = %tenant_id), err)]
    async fn list_transactions(
        &self,
        tenant_id: TenantId,
        filter: TransactionFilter,
    ) -> Result<Vec<Transaction>, StoreError> {
        let item_param: Option<Uuid> = filter.item_id.map(Uuid::from);
        let batch_param: Option<Uuid> = filter.batch_id.map(Uuid::from);

        let rows = sqlx::query(&format!(
            r#"
            SELECT {TRANSACTION_COLUMNS}
            FROM stock_transactions
            WHERE tenant_id = $1
                AND ($2::uuid IS NULL OR item_id = $2)
                AND ($3::uuid IS NULL OR batch_id = $3)
            ORDER BY occurred_at ASC, id ASC
            "#
        ))
        .bind(tenant_id.as_uuid())
        .bind(item_param)
        .bind(batch_param)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_transactions", e))?;

        rows.iter().map(transaction_from_row).collect()
    }

    #[instrument(
        skip_all,
        fields(tenant_id = %transaction.tenant_id, transaction_id = %transaction.id),
        err
    )]
    async fn create_transaction(&self, transaction: Transaction) -> Result<(), StoreError> {
        sqlx::query(&format!(
            "INSERT INTO stock_transactions ({TRANSACTION_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)"
        ))
        .bind(transaction.tenant_id.as_uuid())
        .bind(transaction.id.as_uuid())
        .bind(transaction.batch_id.map(Uuid::from))
        .bind(transaction.item_id.as_uuid())
        .bind(transaction.kind.as_str())
        .bind(i64::from(transaction.quantity))
        .bind(transaction.unit_price)
        .bind(&transaction.remarks)
        .bind(transaction.occurred_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("create_transaction", e))?;

        Ok(())
    }

    #[instrument(skip_all, fields(tenant_id = %tenant_id, transaction_id = %transaction_id), err)]
    async fn delete_transaction(
        &self,
        tenant_id: TenantId,
        transaction_id: TransactionId,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM stock_transactions WHERE tenant_id = $1 AND id = $2")
            .bind(tenant_id.as_uuid())
            .bind(transaction_id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_transaction", e))?;

        Ok(result.rows_affected() > 0)
    }
}

fn item_from_row(row: &PgRow) -> Result<Item, StoreError> {
    let read = |e| map_sqlx_error("decode item", e);
    Ok(Item {
        tenant_id: TenantId::from_uuid(row.try_get("tenant_id").map_err(read)?),
        id: ItemId::from_uuid(row.try_get("id").map_err(read)?),
        sku: row.try_get("sku").map_err(read)?,
        name: row.try_get("name").map_err(read)?,
        stock: row.try_get("stock").map_err(read)?,
        unit_cost: row.try_get("unit_cost").map_err(read)?,
        selling_price: row.try_get("selling_price").map_err(read)?,
        reorder_threshold: row.try_get("reorder_threshold").map_err(read)?,
        remarks: row.try_get("remarks").map_err(read)?,
        created_at: row.try_get("created_at").map_err(read)?,
    })
}

fn transaction_from_row(row: &PgRow) -> Result<Transaction, StoreError> {
    let read = |e| map_sqlx_error("decode transaction", e);

    let kind: String = row.try_get("kind").map_err(read)?;
    let kind = TransactionKind::parse(&kind).map_err(|e| StoreError::Backend(e.to_string()))?;

    let quantity: i64 = row.try_get("quantity").map_err(read)?;
    let quantity = u32::try_from(quantity)
        .map_err(|_| StoreError::Backend(format!("stored quantity {quantity} out of range")))?;

    let batch_id: Option<Uuid> = row.try_get("batch_id").map_err(read)?;

    Ok(Transaction {
        tenant_id: TenantId::from_uuid(row.try_get("tenant_id").map_err(read)?),
        id: TransactionId::from_uuid(row.try_get("id").map_err(read)?),
        batch_id: batch_id.map(BatchId::from_uuid),
        item_id: ItemId::from_uuid(row.try_get("item_id").map_err(read)?),
        kind,
        quantity,
        unit_price: row.try_get("unit_price").map_err(read)?,
        remarks: row.try_get("remarks").map_err(read)?,
        occurred_at: row.try_get("occurred_at").map_err(read)?,
    })
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => StoreError::Conflict(msg),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            StoreError::Backend(format!("connection pool closed in {operation}"))
        }
        _ => StoreError::Backend(format!("sqlx error in {operation}: {err}")),
    }
}
