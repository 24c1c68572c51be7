use axum::{
    Router,
    routing::{delete, get, post},
};

pub mod items;
pub mod system;
pub mod transactions;

/// Router for all tenant-scoped endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/snapshot", get(system::snapshot))
        .route("/items", get(items::list_items).post(items::create_item))
        .route("/items/low-stock", get(items::low_stock))
        .route(
            "/items/:id",
            get(items::get_item)
                .patch(items::update_item)
                .delete(items::delete_item),
        )
        .route("/items/:id/adjust", post(items::adjust_stock))
        .route("/items/:id/audit", get(items::audit_item))
        .route("/items/:id/repair", post(items::repair_item))
        .route("/transactions", get(transactions::list_transactions).post(transactions::apply))
        .route("/transactions/batch", post(transactions::apply_batch))
        .route("/transactions/batch/:id", delete(transactions::revert_batch))
        .route("/transactions/:id", delete(transactions::revert))
        .route("/transactions/:id/rollback", post(transactions::rollback))
}
