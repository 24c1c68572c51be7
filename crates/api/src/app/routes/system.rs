use std::sync::Arc;

use axum::{Json, extract::Extension, http::StatusCode, response::IntoResponse};

use crate::app::{errors, services::AppServices};
use crate::context::TenantContext;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

/// Every item and transaction of the tenant, for a full client resync.
pub async fn snapshot(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
) -> axum::response::Response {
    match services.reconciler().snapshot(tenant.tenant_id()).await {
        Ok(snapshot) => (StatusCode::OK, Json(snapshot)).into_response(),
        Err(e) => errors::reconcile_error_to_response(e),
    }
}
