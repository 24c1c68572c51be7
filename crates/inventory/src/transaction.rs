use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::{BatchId, DomainError, DomainResult, Entity, ItemId, TenantId, TransactionId};

/// Kind of stock movement.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    /// Initial load of stock for an item.
    Opening,
    /// Goods received from a vendor.
    Purchase,
    /// Goods sold to a customer.
    Sale,
    /// Manual correction that adds stock.
    AdjustmentIn,
    /// Manual correction that removes stock.
    AdjustmentOut,
}

impl TransactionKind {
    /// +1 for movements that add stock, -1 for movements that remove it.
    pub fn sign(self) -> i64 {
        match self {
            TransactionKind::Opening | TransactionKind::Purchase | TransactionKind::AdjustmentIn => 1,
            TransactionKind::Sale | TransactionKind::AdjustmentOut => -1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TransactionKind::Opening => "opening",
            TransactionKind::Purchase => "purchase",
            TransactionKind::Sale => "sale",
            TransactionKind::AdjustmentIn => "adjustment_in",
            TransactionKind::AdjustmentOut => "adjustment_out",
        }
    }

    pub fn parse(s: &str) -> DomainResult<Self> {
        match s {
            "opening" => Ok(TransactionKind::Opening),
            "purchase" => Ok(TransactionKind::Purchase),
            "sale" => Ok(TransactionKind::Sale),
            "adjustment_in" => Ok(TransactionKind::AdjustmentIn),
            "adjustment_out" => Ok(TransactionKind::AdjustmentOut),
            other => Err(DomainError::validation(format!(
                "unknown transaction kind '{other}'"
            ))),
        }
    }
}

impl core::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One immutable line of an item's stock ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub tenant_id: TenantId,
    pub batch_id: Option<BatchId>,
    pub item_id: ItemId,
    pub kind: TransactionKind,
    /// Always positive; direction comes from `kind`.
    pub quantity: u32,
    /// Unit price at the time of the movement (smallest currency unit).
    pub unit_price: i64,
    pub remarks: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl Transaction {
    /// Stock delta produced by applying this transaction.
    pub fn apply_delta(&self) -> i64 {
        crate::ledger::apply_delta(self.kind, self.quantity)
    }

    /// Stock delta that undoes this transaction.
    pub fn revert_delta(&self) -> i64 {
        crate::ledger::revert_delta(self.kind, self.quantity)
    }
}

impl Entity for Transaction {
    type Id = TransactionId;

    fn id(&self) -> TransactionId {
        self.id
    }

    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}

/// A user-constructed transaction that has not been assigned an identifier yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTransaction {
    pub tenant_id: TenantId,
    #[serde(default)]
    pub batch_id: Option<BatchId>,
    pub item_id: ItemId,
    pub kind: TransactionKind,
    pub quantity: u32,
    #[serde(default)]
    pub unit_price: i64,
    #[serde(default)]
    pub remarks: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl NewTransaction {
    pub fn validate(&self) -> DomainResult<()> {
        if self.quantity == 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }
        if self.unit_price < 0 {
            return Err(DomainError::validation("unit_price cannot be negative"));
        }
        Ok(())
    }

    pub fn into_transaction(self, id: TransactionId) -> Transaction {
        Transaction {
            id,
            tenant_id: self.tenant_id,
            batch_id: self.batch_id,
            item_id: self.item_id,
            kind: self.kind,
            quantity: self.quantity,
            unit_price: self.unit_price,
            remarks: self.remarks,
            occurred_at: self.occurred_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_tx(kind: TransactionKind, quantity: u32) -> NewTransaction {
        NewTransaction {
            tenant_id: TenantId::new(),
            batch_id: None,
            item_id: ItemId::new(),
            kind,
            quantity,
            unit_price: 100,
            remarks: None,
            occurred_at: Utc::now(),
        }
    }

    #[test]
    fn zero_quantity_is_rejected() {
        let err = new_tx(TransactionKind::Sale, 0).validate().unwrap_err();
        assert_eq!(err, DomainError::validation("quantity must be positive"));
    }

    #[test]
    fn sale_removes_and_purchase_adds() {
        let sale = new_tx(TransactionKind::Sale, 8).into_transaction(TransactionId::new());
        let purchase = new_tx(TransactionKind::Purchase, 20).into_transaction(TransactionId::new());
        assert_eq!(sale.apply_delta(), -8);
        assert_eq!(sale.revert_delta(), 8);
        assert_eq!(purchase.apply_delta(), 20);
        assert_eq!(purchase.revert_delta(), -20);
    }

    #[test]
    fn kind_uses_snake_case_on_the_wire() {
        let json = serde_json::to_string(&TransactionKind::AdjustmentOut).unwrap();
        assert_eq!(json, "\"adjustment_out\"");
        assert_eq!(TransactionKind::parse("adjustment_out").unwrap(), TransactionKind::AdjustmentOut);
        assert!(TransactionKind::parse("refund").is_err());
    }
}
