//! Infrastructure layer: persistence, configuration, and the stock reconciler.

pub mod config;
pub mod reconciler;
pub mod store;


pub use config::{AppConfig, ConfigError, ReconcilerConfig};
pub use reconciler::{ApplyOutcome, ReconcileError, RevertOutcome, StockReconciler};
