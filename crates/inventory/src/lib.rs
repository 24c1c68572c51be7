//! Inventory domain module: items, stock transactions and ledger arithmetic.
//!
//! This crate contains business rules only, implemented as deterministic
//! domain logic (no IO, no HTTP, no storage).

pub mod item;
pub mod ledger;
pub mod transaction;

pub use item::{Item, ItemPatch, NewItem};
pub use ledger::{StockAudit, adjustment_for, apply_delta, derive_stock, next_stock, revert_delta};
pub use transaction::{NewTransaction, Transaction, TransactionKind};
