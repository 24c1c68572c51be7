//! Persistence boundary for items and stock transactions.
//!
//! The reconciler only talks to the `InventoryStore` trait; backends live
//! behind it (in-memory for tests/dev, Postgres for production).

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::{Fault, InMemoryInventoryStore, StoreOp};
pub use postgres::PostgresInventoryStore;
pub use r#trait::{InventoryStore, StoreError, TransactionFilter};
