use std::sync::Arc;

use axum::{Extension, Router, routing::get};

use stockledger_infra::AppConfig;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

pub use services::AppServices;

/// Build the application router from process configuration.
pub async fn build_app(config: &AppConfig) -> anyhow::Result<Router> {
    let services = Arc::new(services::build_services(config).await?);
    Ok(router(services))
}

/// Wire routes around already-built services.
pub fn router(services: Arc<AppServices>) -> Router {
    // Domain routes: require tenant context.
    let tenant_scoped = routes::router()
        .layer(Extension(services))
        .layer(axum::middleware::from_fn(middleware::tenant_middleware));

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(tenant_scoped)
}
