//! Stock ledger arithmetic.
//!
//! Pure functions relating an item's stock counter to its transaction log:
//! `stock == sum(kind.sign() * quantity)` over every transaction of the item.

use serde::{Deserialize, Serialize};

use stockledger_core::{DomainError, DomainResult, ItemId};

use crate::item::Item;
use crate::transaction::{Transaction, TransactionKind};

/// Stock delta produced by applying a movement.
pub fn apply_delta(kind: TransactionKind, quantity: u32) -> i64 {
    kind.sign() * i64::from(quantity)
}

/// Stock delta that undoes a movement.
pub fn revert_delta(kind: TransactionKind, quantity: u32) -> i64 {
    -apply_delta(kind, quantity)
}

/// `current + delta`, refusing to wrap.
pub fn next_stock(current: i64, delta: i64) -> DomainResult<i64> {
    current
        .checked_add(delta)
        .ok_or_else(|| DomainError::overflow(format!("{current} + {delta}")))
}

/// Stock implied by a transaction log.
pub fn derive_stock<'a>(transactions: impl IntoIterator<Item = &'a Transaction>) -> DomainResult<i64> {
    transactions
        .into_iter()
        .try_fold(0i64, |stock, t| next_stock(stock, t.apply_delta()))
}

/// Adjustment transaction needed to move stock from `current` to `target`.
///
/// Returns `None` when they are already equal.
pub fn adjustment_for(current: i64, target: i64) -> DomainResult<Option<(TransactionKind, u32)>> {
    let diff = target
        .checked_sub(current)
        .ok_or_else(|| DomainError::overflow(format!("{target} - {current}")))?;

    if diff == 0 {
        return Ok(None);
    }

    let quantity = u32::try_from(diff.unsigned_abs())
        .map_err(|_| DomainError::validation(format!("adjustment of {diff} exceeds a single transaction")))?;

    let kind = if diff > 0 {
        TransactionKind::AdjustmentIn
    } else {
        TransactionKind::AdjustmentOut
    };

    Ok(Some((kind, quantity)))
}

/// Comparison of an item's recorded stock against its transaction log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAudit {
    pub item_id: ItemId,
    pub recorded: i64,
    pub derived: i64,
    pub transaction_count: usize,
}

impl StockAudit {
    /// Build an audit for `item` from the transactions that reference it.
    ///
    /// Transactions belonging to other items are ignored.
    pub fn of(item: &Item, transactions: &[Transaction]) -> DomainResult<Self> {
        let own: Vec<&Transaction> = transactions
            .iter()
            .filter(|t| t.item_id == item.id && t.tenant_id == item.tenant_id)
            .collect();

        Ok(Self {
            item_id: item.id,
            recorded: item.stock,
            derived: derive_stock(own.iter().copied())?,
            transaction_count: own.len(),
        })
    }

    /// Recorded minus derived; positive means the counter is ahead of the log.
    pub fn discrepancy(&self) -> i64 {
        self.recorded - self.derived
    }

    pub fn is_consistent(&self) -> bool {
        self.recorded == self.derived
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use proptest::prelude::*;
    use stockledger_core::{TenantId, TransactionId};

    fn tx(tenant_id: TenantId, item_id: ItemId, kind: TransactionKind, quantity: u32) -> Transaction {
        Transaction {
            id: TransactionId::new(),
            tenant_id,
            batch_id: None,
            item_id,
            kind,
            quantity,
            unit_price: 0,
            remarks: None,
            occurred_at: Utc::now(),
        }
    }

    fn item(tenant_id: TenantId, stock: i64) -> Item {
        Item {
            id: ItemId::new(),
            tenant_id,
            sku: "SKU-1".to_string(),
            name: "Widget".to_string(),
            stock,
            unit_cost: 0,
            selling_price: 0,
            reorder_threshold: None,
            remarks: None,
            created_at: Utc::now(),
        }
    }

    fn kind_strategy() -> impl Strategy<Value = TransactionKind> {
        prop_oneof![
            Just(TransactionKind::Opening),
            Just(TransactionKind::Purchase),
            Just(TransactionKind::Sale),
            Just(TransactionKind::AdjustmentIn),
            Just(TransactionKind::AdjustmentOut),
        ]
    }

    #[test]
    fn example_ledger_walk() {
        let tenant_id = TenantId::new();
        let item = item(tenant_id, 0);

        let opening = tx(tenant_id, item.id, TransactionKind::Opening, 15);
        let purchase = tx(tenant_id, item.id, TransactionKind::Purchase, 20);
        let sale = tx(tenant_id, item.id, TransactionKind::Sale, 8);

        let mut stock = 0;
        stock = next_stock(stock, opening.apply_delta()).unwrap();
        assert_eq!(stock, 15);
        stock = next_stock(stock, purchase.apply_delta()).unwrap();
        assert_eq!(stock, 35);
        stock = next_stock(stock, sale.apply_delta()).unwrap();
        assert_eq!(stock, 27);
        stock = next_stock(stock, sale.revert_delta()).unwrap();
        assert_eq!(stock, 35);
        stock = next_stock(stock, purchase.revert_delta()).unwrap();
        assert_eq!(stock, 15);

        assert_eq!(derive_stock([&opening]).unwrap(), 15);
    }

    #[test]
    fn next_stock_refuses_overflow() {
        assert!(matches!(next_stock(i64::MAX, 1), Err(DomainError::Overflow(_))));
    }

    #[test]
    fn adjustment_for_picks_direction() {
        assert_eq!(adjustment_for(10, 10).unwrap(), None);
        assert_eq!(
            adjustment_for(10, 14).unwrap(),
            Some((TransactionKind::AdjustmentIn, 4))
        );
        assert_eq!(
            adjustment_for(10, -2).unwrap(),
            Some((TransactionKind::AdjustmentOut, 12))
        );
        assert!(adjustment_for(0, i64::from(u32::MAX) + 1).is_err());
    }

    #[test]
    fn audit_ignores_other_items_and_reports_drift() {
        let tenant_id = TenantId::new();
        let mut widget = item(tenant_id, 0);
        let other = ItemId::new();

        let log = vec![
            tx(tenant_id, widget.id, TransactionKind::Opening, 10),
            tx(tenant_id, other, TransactionKind::Opening, 99),
            tx(tenant_id, widget.id, TransactionKind::Sale, 3),
        ];

        widget.stock = 7;
        let audit = StockAudit::of(&widget, &log).unwrap();
        assert!(audit.is_consistent());
        assert_eq!(audit.transaction_count, 2);

        widget.stock = 9;
        let audit = StockAudit::of(&widget, &log).unwrap();
        assert!(!audit.is_consistent());
        assert_eq!(audit.discrepancy(), 2);
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Applying then reverting any movement restores the starting stock.
        #[test]
        fn apply_then_revert_is_identity(
            start in -1_000_000i64..1_000_000i64,
            kind in kind_strategy(),
            quantity in 1u32..100_000u32,
        ) {
            let applied = next_stock(start, apply_delta(kind, quantity)).unwrap();
            let reverted = next_stock(applied, revert_delta(kind, quantity)).unwrap();
            prop_assert_eq!(reverted, start);
            prop_assert_eq!((applied - start).abs(), i64::from(quantity));
        }

        /// Folding deltas one at a time agrees with deriving stock from the log.
        #[test]
        fn incremental_stock_matches_derived(
            moves in prop::collection::vec((kind_strategy(), 1u32..10_000u32), 0..40)
        ) {
            let tenant_id = TenantId::new();
            let item_id = ItemId::new();
            let log: Vec<Transaction> = moves
                .iter()
                .map(|(kind, q)| tx(tenant_id, item_id, *kind, *q))
                .collect();

            let mut stock = 0i64;
            for t in &log {
                stock = next_stock(stock, t.apply_delta()).unwrap();
            }

            prop_assert_eq!(stock, derive_stock(&log).unwrap());
        }

        /// An adjustment always lands exactly on the target.
        #[test]
        fn adjustment_reaches_target(
            current in -1_000_000i64..1_000_000i64,
            target in -1_000_000i64..1_000_000i64,
        ) {
            let landed = match adjustment_for(current, target).unwrap() {
                Some((kind, q)) => next_stock(current, apply_delta(kind, q)).unwrap(),
                None => current,
            };
            prop_assert_eq!(landed, target);
        }
    }
}
