use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
};

use stockledger_core::ItemId;
use stockledger_inventory::ItemPatch;

use crate::app::{dto, errors, services::AppServices};
use crate::context::TenantContext;

pub async fn list_items(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
) -> axum::response::Response {
    match services.reconciler().list_items(tenant.tenant_id()).await {
        Ok(items) => (StatusCode::OK, Json(items)).into_response(),
        Err(e) => errors::reconcile_error_to_response(e),
    }
}

pub async fn create_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Json(body): Json<dto::CreateItemRequest>,
) -> axum::response::Response {
    let new = body.into_new_item(tenant.tenant_id());
    match services.reconciler().create_item(new).await {
        Ok(created) => (StatusCode::CREATED, Json(created)).into_response(),
        Err(e) => errors::reconcile_error_to_response(e),
    }
}

pub async fn get_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let item_id: ItemId = match errors::parse_id(&id, "item") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.reconciler().get_item(tenant.tenant_id(), item_id).await {
        Ok(item) => (StatusCode::OK, Json(item)).into_response(),
        Err(e) => errors::reconcile_error_to_response(e),
    }
}

/// Descriptive edits only; stock changes go through `/adjust`.
pub async fn update_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
    Json(patch): Json<ItemPatch>,
) -> axum::response::Response {
    let item_id: ItemId = match errors::parse_id(&id, "item") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services
        .reconciler()
        .update_item(tenant.tenant_id(), item_id, patch)
        .await
    {
        Ok(item) => (StatusCode::OK, Json(item)).into_response(),
        Err(e) => errors::reconcile_error_to_response(e),
    }
}

pub async fn delete_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let item_id: ItemId = match errors::parse_id(&id, "item") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.reconciler().delete_item(tenant.tenant_id(), item_id).await {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => errors::json_error(StatusCode::NOT_FOUND, "not_found", "item not found"),
        Err(e) => errors::reconcile_error_to_response(e),
    }
}

pub async fn adjust_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::AdjustStockRequest>,
) -> axum::response::Response {
    let item_id: ItemId = match errors::parse_id(&id, "item") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services
        .reconciler()
        .adjust_stock(tenant.tenant_id(), item_id, body.target, body.remarks)
        .await
    {
        Ok(Some(outcome)) => (StatusCode::OK, Json(outcome)).into_response(),
        Ok(None) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "item_id": item_id,
                "stock": body.target,
                "transaction": null,
            })),
        )
            .into_response(),
        Err(e) => errors::reconcile_error_to_response(e),
    }
}

pub async fn audit_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let item_id: ItemId = match errors::parse_id(&id, "item") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.reconciler().audit_item(tenant.tenant_id(), item_id).await {
        Ok(audit) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "item_id": audit.item_id,
                "recorded": audit.recorded,
                "derived": audit.derived,
                "transaction_count": audit.transaction_count,
                "discrepancy": audit.discrepancy(),
                "consistent": audit.is_consistent(),
            })),
        )
            .into_response(),
        Err(e) => errors::reconcile_error_to_response(e),
    }
}

pub async fn repair_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let item_id: ItemId = match errors::parse_id(&id, "item") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.reconciler().repair_item(tenant.tenant_id(), item_id).await {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(e) => errors::reconcile_error_to_response(e),
    }
}

pub async fn low_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
) -> axum::response::Response {
    match services.reconciler().low_stock(tenant.tenant_id()).await {
        Ok(items) => (StatusCode::OK, Json(items)).into_response(),
        Err(e) => errors::reconcile_error_to_response(e),
    }
}
