use std::sync::Arc;

use reqwest::StatusCode;
use serde_json::{Value, json};

use std::time::Duration;

use stockledger_api::app::{self, AppServices};
use stockledger_core::TenantId;
use stockledger_infra::ReconcilerConfig;
use stockledger_infra::store::{InMemoryInventoryStore, StoreOp};

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        Self::spawn_with(AppServices::in_memory(ReconcilerConfig::default())).await
    }

    /// Serve over a caller-held store so tests can inject faults.
    async fn spawn_with_store(store: Arc<InMemoryInventoryStore>, config: ReconcilerConfig) -> Self {
        Self::spawn_with(AppServices::new(store, config)).await
    }

    async fn spawn_with(services: AppServices) -> Self {
        // Same router as prod, on an ephemeral port.
        let app = app::router(Arc::new(services));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn create_item(client: &reqwest::Client, srv: &TestServer, tenant: TenantId, body: Value) -> Value {
    let res = client
        .post(srv.url("/items"))
        .header("x-tenant-id", tenant.to_string())
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    res.json().await.unwrap()
}

async fn post_transaction(
    client: &reqwest::Client,
    srv: &TestServer,
    tenant: TenantId,
    item_id: &str,
    kind: &str,
    quantity: u32,
) -> Value {
    let res = client
        .post(srv.url("/transactions"))
        .header("x-tenant-id", tenant.to_string())
        .json(&json!({ "item_id": item_id, "kind": kind, "quantity": quantity, "unit_price": 300 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    res.json().await.unwrap()
}

#[tokio::test]
async fn health_needs_no_tenant() {
    let srv = TestServer::spawn().await;
    let res = reqwest::get(srv.url("/health")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn tenant_header_is_required() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client.get(srv.url("/items")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "missing_tenant");

    let res = client
        .get(srv.url("/items"))
        .header("x-tenant-id", "not-a-uuid")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invalid_tenant");
}

#[tokio::test]
async fn stock_follows_transactions_and_reverts() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let tenant = TenantId::new();

    let created = create_item(&client, &srv, tenant, json!({ "sku": "SKU-1", "name": "Widget" })).await;
    let item_id = created["item"]["id"].as_str().unwrap().to_string();
    assert_eq!(created["item"]["stock"], 0);
    assert!(created["opening"].is_null());

    let opening = post_transaction(&client, &srv, tenant, &item_id, "opening", 15).await;
    assert_eq!(opening["item"]["stock"], 15);
    let purchase = post_transaction(&client, &srv, tenant, &item_id, "purchase", 20).await;
    assert_eq!(purchase["item"]["stock"], 35);
    let sale = post_transaction(&client, &srv, tenant, &item_id, "sale", 8).await;
    assert_eq!(sale["item"]["stock"], 27);

    let sale_id = sale["transaction"]["id"].as_str().unwrap();
    let res = client
        .delete(srv.url(&format!("/transactions/{sale_id}")))
        .header("x-tenant-id", tenant.to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["reverted"], true);
    assert_eq!(body["stock"], 35);

    // Second revert of the same id is a no-op.
    let res = client
        .delete(srv.url(&format!("/transactions/{sale_id}")))
        .header("x-tenant-id", tenant.to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["reverted"], false);

    let res = client
        .get(srv.url(&format!("/items/{item_id}/audit")))
        .header("x-tenant-id", tenant.to_string())
        .send()
        .await
        .unwrap();
    let audit: Value = res.json().await.unwrap();
    assert_eq!(audit["recorded"], 35);
    assert_eq!(audit["consistent"], true);
    assert_eq!(audit["transaction_count"], 2);
}

#[tokio::test]
async fn unknown_item_is_a_reference_error() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let tenant = TenantId::new();
    let missing = stockledger_core::ItemId::new().to_string();

    let res = client
        .post(srv.url("/transactions"))
        .header("x-tenant-id", tenant.to_string())
        .json(&json!({ "item_id": missing, "kind": "sale", "quantity": 1 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "reference_error");
    assert_eq!(body["item_id"], missing);
}

#[tokio::test]
async fn zero_quantity_is_a_validation_error() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let tenant = TenantId::new();

    let created = create_item(&client, &srv, tenant, json!({ "sku": "SKU-1", "name": "Widget" })).await;
    let item_id = created["item"]["id"].as_str().unwrap();

    let res = client
        .post(srv.url("/transactions"))
        .header("x-tenant-id", tenant.to_string())
        .json(&json!({ "item_id": item_id, "kind": "purchase", "quantity": 0 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "validation_error");
}

#[tokio::test]
async fn adjust_and_low_stock() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let tenant = TenantId::new();

    let created = create_item(
        &client,
        &srv,
        tenant,
        json!({ "sku": "SKU-1", "name": "Widget", "opening_stock": 10, "reorder_threshold": 4 }),
    )
    .await;
    let item_id = created["item"]["id"].as_str().unwrap().to_string();
    assert_eq!(created["item"]["stock"], 10);
    assert_eq!(created["opening"]["kind"], "opening");

    let res = client
        .post(srv.url(&format!("/items/{item_id}/adjust")))
        .header("x-tenant-id", tenant.to_string())
        .json(&json!({ "target": 3, "remarks": "cycle count" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["transaction"]["kind"], "adjustment_out");
    assert_eq!(body["transaction"]["quantity"], 7);
    assert_eq!(body["item"]["stock"], 3);

    let res = client
        .get(srv.url("/items/low-stock"))
        .header("x-tenant-id", tenant.to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let low: Value = res.json().await.unwrap();
    assert_eq!(low.as_array().unwrap().len(), 1);
    assert_eq!(low[0]["id"], item_id.as_str());
}

#[tokio::test]
async fn tenants_do_not_see_each_other() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let tenant_a = TenantId::new();
    let tenant_b = TenantId::new();

    let created = create_item(&client, &srv, tenant_a, json!({ "sku": "SKU-1", "name": "Widget" })).await;
    let item_id = created["item"]["id"].as_str().unwrap();

    let res = client
        .get(srv.url(&format!("/items/{item_id}")))
        .header("x-tenant-id", tenant_b.to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = client
        .get(srv.url("/snapshot"))
        .header("x-tenant-id", tenant_b.to_string())
        .send()
        .await
        .unwrap();
    let snapshot: Value = res.json().await.unwrap();
    assert!(snapshot["items"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn failed_batch_leaves_nothing_behind() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let tenant = TenantId::new();

    let created = create_item(
        &client,
        &srv,
        tenant,
        json!({ "sku": "SKU-1", "name": "Widget", "opening_stock": 5 }),
    )
    .await;
    let item_id = created["item"]["id"].as_str().unwrap();
    let missing = stockledger_core::ItemId::new().to_string();

    let res = client
        .post(srv.url("/transactions/batch"))
        .header("x-tenant-id", tenant.to_string())
        .json(&json!({
            "lines": [
                { "item_id": item_id, "kind": "sale", "quantity": 2 },
                { "item_id": missing, "kind": "sale", "quantity": 1 },
            ]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "batch_failed");
    assert_eq!(body["failed_line"], 1);
    assert_eq!(body["cause"], "reference_error");

    let res = client
        .get(srv.url(&format!("/items/{item_id}")))
        .header("x-tenant-id", tenant.to_string())
        .send()
        .await
        .unwrap();
    let item: Value = res.json().await.unwrap();
    assert_eq!(item["stock"], 5);
}

#[tokio::test]
async fn partial_apply_is_reported_and_rolled_back() {
    let store = Arc::new(InMemoryInventoryStore::new());
    let srv = TestServer::spawn_with_store(store.clone(), ReconcilerConfig::default()).await;
    let client = reqwest::Client::new();
    let tenant = TenantId::new();

    let created = create_item(
        &client,
        &srv,
        tenant,
        json!({ "sku": "SKU-1", "name": "Widget", "opening_stock": 10 }),
    )
    .await;
    let item_id = created["item"]["id"].as_str().unwrap().to_string();
    store.fail_next(StoreOp::IncrementStock);

    let res = client
        .post(srv.url("/transactions"))
        .header("x-tenant-id", tenant.to_string())
        .json(&json!({ "item_id": item_id, "kind": "purchase", "quantity": 6 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "partial_apply");
    assert_eq!(body["item_id"], item_id.as_str());
    assert_eq!(body["failed"], "increment_stock");
    let orphan_id = body["transaction_id"].as_str().unwrap().to_string();
    assert_eq!(
        body["recovery"]["discard"],
        format!("POST /transactions/{orphan_id}/rollback")
    );

    let res = client
        .post(srv.url(&format!("/transactions/{orphan_id}/rollback")))
        .header("x-tenant-id", tenant.to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["transaction"]["id"], orphan_id.as_str());
    assert_eq!(body["repair"]["audit"]["derived"], 10);

    let res = client
        .get(srv.url(&format!("/items/{item_id}/audit")))
        .header("x-tenant-id", tenant.to_string())
        .send()
        .await
        .unwrap();
    let audit: Value = res.json().await.unwrap();
    assert_eq!(audit["recorded"], 10);
    assert_eq!(audit["consistent"], true);
    assert_eq!(audit["transaction_count"], 1);

    // Already gone.
    let res = client
        .post(srv.url(&format!("/transactions/{orphan_id}/rollback")))
        .header("x-tenant-id", tenant.to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn partial_apply_can_be_kept_through_repair() {
    let store = Arc::new(InMemoryInventoryStore::new());
    let srv = TestServer::spawn_with_store(store.clone(), ReconcilerConfig::default()).await;
    let client = reqwest::Client::new();
    let tenant = TenantId::new();

    let created = create_item(
        &client,
        &srv,
        tenant,
        json!({ "sku": "SKU-1", "name": "Widget", "opening_stock": 10 }),
    )
    .await;
    let item_id = created["item"]["id"].as_str().unwrap().to_string();
    store.fail_next(StoreOp::IncrementStock);

    let res = client
        .post(srv.url("/transactions"))
        .header("x-tenant-id", tenant.to_string())
        .json(&json!({ "item_id": item_id, "kind": "purchase", "quantity": 6 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["recovery"]["keep"], format!("POST /items/{item_id}/repair"));

    let res = client
        .post(srv.url(&format!("/items/{item_id}/repair")))
        .header("x-tenant-id", tenant.to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["repaired"], true);

    let res = client
        .get(srv.url(&format!("/items/{item_id}")))
        .header("x-tenant-id", tenant.to_string())
        .send()
        .await
        .unwrap();
    let item: Value = res.json().await.unwrap();
    assert_eq!(item["stock"], 16);
}

#[tokio::test]
async fn hung_store_call_is_a_gateway_timeout() {
    let store = Arc::new(InMemoryInventoryStore::new());
    let config = ReconcilerConfig {
        store_timeout: Duration::from_millis(50),
    };
    let srv = TestServer::spawn_with_store(store.clone(), config).await;
    let client = reqwest::Client::new();
    let tenant = TenantId::new();

    let created = create_item(&client, &srv, tenant, json!({ "sku": "SKU-1", "name": "Widget" })).await;
    let item_id = created["item"]["id"].as_str().unwrap().to_string();
    store.hang_next(StoreOp::CreateTransaction);

    let res = client
        .post(srv.url("/transactions"))
        .header("x-tenant-id", tenant.to_string())
        .json(&json!({ "item_id": item_id, "kind": "purchase", "quantity": 1 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::GATEWAY_TIMEOUT);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "timeout");
    assert_eq!(body["operation"], "create_transaction");
}
