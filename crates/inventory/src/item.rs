use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::{DomainError, DomainResult, Entity, ItemId, TenantId};

/// A stocked product.
///
/// `stock` is a derived counter: it must equal the signed sum of the item's
/// transactions. Nothing outside the reconciler writes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub tenant_id: TenantId,
    pub sku: String,
    pub name: String,
    pub stock: i64,
    /// Smallest currency unit (e.g. cents).
    pub unit_cost: i64,
    /// Smallest currency unit (e.g. cents).
    pub selling_price: i64,
    pub reorder_threshold: Option<i64>,
    pub remarks: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Item {
    /// True when a reorder threshold is set and stock has fallen to it.
    pub fn needs_reorder(&self) -> bool {
        self.reorder_threshold
            .is_some_and(|threshold| self.stock <= threshold)
    }
}

impl Entity for Item {
    type Id = ItemId;

    fn id(&self) -> ItemId {
        self.id
    }

    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}

/// Input for creating an item.
///
/// Opening stock is not written to the item directly; it is recorded as an
/// `opening` transaction after the item exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewItem {
    pub tenant_id: TenantId,
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

impl NewItem {
    pub fn validate(&self) -> DomainResult<()> {
        if self.sku.trim().is_empty() {
            return Err(DomainError::validation("sku cannot be empty"));
        }
        if self.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        validate_prices(self.unit_cost, self.selling_price)?;
        validate_threshold(self.reorder_threshold)
    }

    /// Build the persisted record with zero stock.
    pub fn into_item(self, id: ItemId, created_at: DateTime<Utc>) -> Item {
        Item {
            id,
            tenant_id: self.tenant_id,
            sku: self.sku.trim().to_string(),
            name: self.name.trim().to_string(),
            stock: 0,
            unit_cost: self.unit_cost,
            selling_price: self.selling_price,
            reorder_threshold: self.reorder_threshold,
            remarks: self.remarks,
            created_at,
        }
    }
}

/// Edit of an item's descriptive fields.
///
/// Stock is not editable here; stock changes go through adjustment
/// transactions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ItemPatch {
    pub sku: Option<String>,
    pub name: Option<String>,
    pub unit_cost: Option<i64>,
    pub selling_price: Option<i64>,
    pub reorder_threshold: Option<i64>,
    pub clear_reorder_threshold: bool,
    pub remarks: Option<String>,
    pub clear_remarks: bool,
}

impl ItemPatch {
    /// Apply the patch to `item`, validating the result.
    ///
    /// On error `item` is left untouched.
    pub fn apply_to(&self, item: &mut Item) -> DomainResult<()> {
        let mut next = item.clone();

        if let Some(sku) = &self.sku {
            if sku.trim().is_empty() {
                return Err(DomainError::validation("sku cannot be empty"));
            }
            next.sku = sku.trim().to_string();
        }
        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                return Err(DomainError::validation("name cannot be empty"));
            }
            next.name = name.trim().to_string();
        }
        if let Some(cost) = self.unit_cost {
            next.unit_cost = cost;
        }
        if let Some(price) = self.selling_price {
            next.selling_price = price;
        }
        if self.clear_reorder_threshold {
            next.reorder_threshold = None;
        } else if let Some(threshold) = self.reorder_threshold {
            next.reorder_threshold = Some(threshold);
        }
        if self.clear_remarks {
            next.remarks = None;
        } else if let Some(remarks) = &self.remarks {
            next.remarks = Some(remarks.clone());
        }

        validate_prices(next.unit_cost, next.selling_price)?;
        validate_threshold(next.reorder_threshold)?;

        *item = next;
        Ok(())
    }
}

fn validate_prices(unit_cost: i64, selling_price: i64) -> DomainResult<()> {
    if unit_cost < 0 {
        return Err(DomainError::validation("unit_cost cannot be negative"));
    }
    if selling_price < 0 {
        return Err(DomainError::validation("selling_price cannot be negative"));
    }
    Ok(())
}

fn validate_threshold(threshold: Option<i64>) -> DomainResult<()> {
    match threshold {
        Some(t) if t < 0 => Err(DomainError::validation("reorder_threshold cannot be negative")),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_item() -> NewItem {
        NewItem {
            tenant_id: TenantId::new(),
            sku: " SKU-1 ".to_string(),
            name: "Widget".to_string(),
            unit_cost: 250,
            selling_price: 499,
            reorder_threshold: Some(5),
            remarks: None,
            opening_stock: 15,
        }
    }

    #[test]
    fn new_item_starts_with_zero_stock() {
        let input = new_item();
        input.validate().unwrap();
        let item = input.into_item(ItemId::new(), Utc::now());
        assert_eq!(item.stock, 0);
        assert_eq!(item.sku, "SKU-1");
    }

    #[test]
    fn blank_sku_is_rejected() {
        let mut input = new_item();
        input.sku = "   ".to_string();
        match input.validate() {
            Err(DomainError::Validation(msg)) => assert!(msg.contains("sku")),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn patch_leaves_stock_alone() {
        let mut item = new_item().into_item(ItemId::new(), Utc::now());
        item.stock = 42;

        let patch = ItemPatch {
            name: Some("Renamed".to_string()),
            selling_price: Some(599),
            clear_reorder_threshold: true,
            ..ItemPatch::default()
        };
        patch.apply_to(&mut item).unwrap();

        assert_eq!(item.stock, 42);
        assert_eq!(item.name, "Renamed");
        assert_eq!(item.selling_price, 599);
        assert_eq!(item.reorder_threshold, None);
    }

    #[test]
    fn patch_can_clear_remarks() {
        let mut item = new_item().into_item(ItemId::new(), Utc::now());
        item.remarks = Some("back shelf".to_string());

        let keep = ItemPatch {
            name: Some("Renamed".to_string()),
            ..ItemPatch::default()
        };
        keep.apply_to(&mut item).unwrap();
        assert_eq!(item.remarks.as_deref(), Some("back shelf"));

        let clear = ItemPatch {
            remarks: Some("ignored".to_string()),
            clear_remarks: true,
            ..ItemPatch::default()
        };
        clear.apply_to(&mut item).unwrap();
        assert_eq!(item.remarks, None);
    }

    #[test]
    fn invalid_patch_is_atomic() {
        let mut item = new_item().into_item(ItemId::new(), Utc::now());
        let before = item.clone();

        let patch = ItemPatch {
            name: Some("Renamed".to_string()),
            unit_cost: Some(-1),
            ..ItemPatch::default()
        };
        assert!(patch.apply_to(&mut item).is_err());
        assert_eq!(item, before);
    }

    #[test]
    fn needs_reorder_at_or_below_threshold() {
        let mut item = new_item().into_item(ItemId::new(), Utc::now());
        item.stock = 6;
        assert!(!item.needs_reorder());
        item.stock = 5;
        assert!(item.needs_reorder());
        item.reorder_threshold = None;
        assert!(!item.needs_reorder());
    }
}
