use std::sync::Arc;

use sqlx::PgPool;

use stockledger_infra::store::{InMemoryInventoryStore, InventoryStore, PostgresInventoryStore};
use stockledger_infra::{AppConfig, ReconcilerConfig, StockReconciler};

/// Store-agnostic reconciler used by the handlers.
pub type Reconciler = StockReconciler<Arc<dyn InventoryStore>>;

/// Shared services injected into every domain handler.
pub struct AppServices {
    reconciler: Reconciler,
}

impl AppServices {
    pub fn new(store: Arc<dyn InventoryStore>, config: ReconcilerConfig) -> Self {
        Self {
            reconciler: StockReconciler::new(store, config),
        }
    }

    /// In-memory wiring (dev/test).
    pub fn in_memory(config: ReconcilerConfig) -> Self {
        Self::new(Arc::new(InMemoryInventoryStore::new()), config)
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }
}

/// Postgres when `DATABASE_URL` is set, in-memory otherwise.
pub async fn build_services(config: &AppConfig) -> anyhow::Result<AppServices> {
    let Some(database_url) = config.database_url.as_deref() else {
        tracing::warn!("DATABASE_URL not set; using in-memory store");
        return Ok(AppServices::in_memory(config.reconciler));
    };

    let pool = PgPool::connect(database_url).await?;
    let store = PostgresInventoryStore::new(pool);
    store.migrate().await?;
    tracing::info!("connected to postgres; migrations applied");

    Ok(AppServices::new(Arc::new(store), config.reconciler))
}
