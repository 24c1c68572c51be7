use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
};

use stockledger_core::{BatchId, TransactionId};
use stockledger_infra::store::TransactionFilter;

use crate::app::{dto, errors, services::AppServices};
use crate::context::TenantContext;

pub async fn list_transactions(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Query(query): Query<dto::TransactionQuery>,
) -> axum::response::Response {
    let filter = TransactionFilter {
        item_id: query.item_id,
        batch_id: query.batch_id,
    };

    match services
        .reconciler()
        .list_transactions(tenant.tenant_id(), filter)
        .await
    {
        Ok(transactions) => (StatusCode::OK, Json(transactions)).into_response(),
        Err(e) => errors::reconcile_error_to_response(e),
    }
}

pub async fn apply(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Json(body): Json<dto::ApplyTransactionRequest>,
) -> axum::response::Response {
    let new = body.into_new_transaction(tenant.tenant_id(), None);
    match services.reconciler().apply(new).await {
        Ok(outcome) => (StatusCode::CREATED, Json(outcome)).into_response(),
        Err(e) => errors::reconcile_error_to_response(e),
    }
}

pub async fn apply_batch(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Json(body): Json<dto::ApplyBatchRequest>,
) -> axum::response::Response {
    let lines = body.into_lines(tenant.tenant_id());
    match services.reconciler().apply_batch(lines).await {
        Ok(outcome) => (StatusCode::CREATED, Json(outcome)).into_response(),
        Err(e) => errors::reconcile_error_to_response(e),
    }
}

/// Unknown ids succeed with `reverted: false`.
pub async fn revert(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let transaction_id: TransactionId = match errors::parse_id(&id, "transaction") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services
        .reconciler()
        .revert(tenant.tenant_id(), transaction_id)
        .await
    {
        Ok(Some(outcome)) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "reverted": true,
                "transaction": outcome.transaction,
                "stock": outcome.stock,
            })),
        )
            .into_response(),
        Ok(None) => (StatusCode::OK, Json(serde_json::json!({ "reverted": false }))).into_response(),
        Err(e) => errors::reconcile_error_to_response(e),
    }
}

/// Drop a transaction without undoing its delta, then rebuild the item's
/// stock from the remaining log. Recovery path for a `partial_apply` orphan.
pub async fn rollback(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let transaction_id: TransactionId = match errors::parse_id(&id, "transaction") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services
        .reconciler()
        .rollback_transaction(tenant.tenant_id(), transaction_id)
        .await
    {
        Ok(Some(outcome)) => (StatusCode::OK, Json(outcome)).into_response(),
        Ok(None) => errors::json_error(StatusCode::NOT_FOUND, "not_found", "transaction not found"),
        Err(e) => errors::reconcile_error_to_response(e),
    }
}

pub async fn revert_batch(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let batch_id: BatchId = match errors::parse_id(&id, "batch") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services
        .reconciler()
        .revert_batch(tenant.tenant_id(), batch_id)
        .await
    {
        Ok(reverted) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "batch_id": batch_id,
                "reverted": reverted.len(),
                "transactions": reverted,
            })),
        )
            .into_response(),
        Err(e) => errors::reconcile_error_to_response(e),
    }
}
