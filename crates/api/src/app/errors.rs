use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::{Value, json};

use stockledger_infra::ReconcileError;
use stockledger_infra::store::StoreError;

pub fn reconcile_error_to_response(err: ReconcileError) -> axum::response::Response {
    let code = err.code();
    let message = err.to_string();

    match &err {
        ReconcileError::Validation(_) => json_error(StatusCode::BAD_REQUEST, code, message),
        ReconcileError::Reference { item_id } => json_error_with(
            StatusCode::NOT_FOUND,
            code,
            message,
            json!({ "item_id": item_id }),
        ),
        ReconcileError::Persistence { operation, source } => {
            let status = match source {
                StoreError::NotFound(_) => StatusCode::NOT_FOUND,
                StoreError::Conflict(_) => StatusCode::CONFLICT,
                StoreError::Backend(_) => StatusCode::INTERNAL_SERVER_ERROR,
            };
            tracing::error!(operation, error = %source, "store call failed");
            json_error_with(status, code, message, json!({ "operation": operation }))
        }
        ReconcileError::Timeout { operation, .. } => json_error_with(
            StatusCode::GATEWAY_TIMEOUT,
            code,
            message,
            json!({ "operation": operation }),
        ),
        ReconcileError::PartialApply(partial) => json_error_with(
            StatusCode::CONFLICT,
            code,
            message,
            json!({
                "transaction_id": partial.transaction_id(),
                "item_id": partial.item_id(),
                "succeeded": "create_transaction",
                "failed": partial.cause.operation(),
                // Never DELETE the orphan: revert would subtract a delta that was not added.
                "recovery": {
                    "keep": format!("POST /items/{}/repair", partial.item_id()),
                    "discard": format!("POST /transactions/{}/rollback", partial.transaction_id()),
                },
            }),
        ),
        ReconcileError::PartialRevert(partial) => json_error_with(
            StatusCode::CONFLICT,
            code,
            message,
            json!({
                "transaction_id": partial.transaction_id(),
                "item_id": partial.item_id(),
                "succeeded": "delete_transaction",
                "failed": partial.cause.operation(),
                "recovery": {
                    "complete": format!("POST /items/{}/repair", partial.item_id()),
                    "restore": "POST /transactions",
                },
                "transaction": partial.transaction,
            }),
        ),
        ReconcileError::Conflict(_) => json_error(StatusCode::CONFLICT, code, message),
        ReconcileError::Batch(failure) => json_error_with(
            StatusCode::CONFLICT,
            code,
            message,
            json!({
                "batch_id": failure.batch_id,
                "failed_line": failure.failed_line,
                "cause": failure.cause.code(),
                "compensation_failures": failure
                    .compensation_failures
                    .iter()
                    .map(|e| e.to_string())
                    .collect::<Vec<_>>(),
            }),
        ),
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

/// Like `json_error`, with extra context fields merged into the body.
pub fn json_error_with(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
    context: Value,
) -> axum::response::Response {
    let mut body = json!({
        "error": code,
        "message": message.into(),
    });
    if let (Some(body), Value::Object(extra)) = (body.as_object_mut(), context) {
        body.extend(extra);
    }
    (status, axum::Json(body)).into_response()
}

pub fn parse_id<T: std::str::FromStr>(raw: &str, what: &str) -> Result<T, axum::response::Response> {
    raw.parse()
        .map_err(|_| json_error(StatusCode::BAD_REQUEST, "invalid_id", format!("invalid {what} id")))
}
