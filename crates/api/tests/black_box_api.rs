use reqwest::StatusCode;
use serde_json::json;

use gasflow_api::config::Config;
use gasflow_core::UserId;

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod, bound to an ephemeral port.
        let app = gasflow_api::app::build_app(&Config::default()).await;
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
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn admin_id() -> String {
    UserId::new().to_string()
}

fn post(
    client: &reqwest::Client,
    url: String,
    actor_id: &str,
    role: &str,
    idempotency_key: &str,
    body: serde_json::Value,
) -> reqwest::RequestBuilder {
    client
        .post(url)
        .header("x-actor-id", actor_id)
        .header("x-actor-role", role)
        .header("idempotency-key", idempotency_key)
        .json(&body)
}

fn get(
    client: &reqwest::Client,
    url: String,
    actor_id: &str,
    role: &str,
) -> reqwest::RequestBuilder {
    client
        .get(url)
        .header("x-actor-id", actor_id)
        .header("x-actor-role", role)
}

#[tokio::test]
async fn health_is_open() {
    let srv = TestServer::spawn().await;
    let res = reqwest::get(format!("{}/health", srv.base_url)).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn actor_headers_are_required() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{}/whoami", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client
        .get(format!("{}/whoami", srv.base_url))
        .header("x-actor-id", "not-a-uuid")
        .header("x-actor-role", "admin")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn roles_gate_capabilities() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let actor = admin_id();

    // Sales may not register depots.
    let res = post(
        &client,
        format!("{}/depots", srv.base_url),
        &actor,
        "sales",
        "k-depot-1",
        json!({ "code": "D1" }),
    )
    .send()
    .await
    .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    // Supervisors may not record sales.
    let res = post(
        &client,
        format!("{}/sales/meter", srv.base_url),
        &actor,
        "supervisor",
        "k-sale-1",
        json!({ "customer_id": UserId::new().to_string(), "latest_reading": 10 }),
    )
    .send()
    .await
    .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn mutating_requests_require_an_idempotency_key() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let actor = admin_id();

    let res = client
        .post(format!("{}/depots", srv.base_url))
        .header("x-actor-id", &actor)
        .header("x-actor-role", "admin")
        .json(&json!({ "code": "D1" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "missing_idempotency_key");
}

#[tokio::test]
async fn stock_movements_roundtrip_through_the_api() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let actor = admin_id();

    let res = post(
        &client,
        format!("{}/depots", srv.base_url),
        &actor,
        "admin",
        "k-depot",
        json!({ "code": "D1" }),
    )
    .send()
    .await
    .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let depot: serde_json::Value = res.json().await.unwrap();
    let depot_id = depot["id"].as_str().unwrap().to_string();

    let res = post(
        &client,
        format!("{}/distributions", srv.base_url),
        &actor,
        "admin",
        "k-in",
        json!({ "depot_id": depot_id, "equipment": "14kg", "quantity": 100, "movement": "empty_return" }),
    )
    .send()
    .await
    .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);

    let res = post(
        &client,
        format!("{}/distributions", srv.base_url),
        &actor,
        "admin",
        "k-out",
        json!({ "depot_id": depot_id, "equipment": "14kg", "quantity": 30, "movement": "collection" }),
    )
    .send()
    .await
    .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);

    // Overdraw: rejected with 422, stock unchanged.
    let res = post(
        &client,
        format!("{}/distributions", srv.base_url),
        &actor,
        "admin",
        "k-overdraw",
        json!({ "depot_id": depot_id, "equipment": "14kg", "quantity": 200, "movement": "collection" }),
    )
    .send()
    .await
    .unwrap();
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let res = get(
        &client,
        format!("{}/depots/{}/stock", srv.base_url, depot_id),
        &actor,
        "admin",
    )
    .send()
    .await
    .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let stock: serde_json::Value = res.json().await.unwrap();
    assert_eq!(stock["items"][0]["equipment"], "14kg");
    assert_eq!(stock["items"][0]["quantity"], 70);
}

#[tokio::test]
async fn billing_flow_from_sale_to_invoice() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let actor = admin_id();

    let res = post(
        &client,
        format!("{}/customers", srv.base_url),
        &actor,
        "admin",
        "k-customer",
        json!({
            "name": "Acme Eatery",
            "meter_rate_cents": 200,
            "opening_meter_reading": 500,
        }),
    )
    .send()
    .await
    .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let customer: serde_json::Value = res.json().await.unwrap();
    let customer_id = customer["id"].as_str().unwrap().to_string();

    let sale_body = json!({ "customer_id": customer_id, "latest_reading": 520 });
    let res = post(
        &client,
        format!("{}/sales/meter", srv.base_url),
        &actor,
        "admin",
        "k-sale",
        sale_body.clone(),
    )
    .send()
    .await
    .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let txn: serde_json::Value = res.json().await.unwrap();
    assert_eq!(txn["total_cents"], 4_000);
    let txn_id = txn["id"].as_str().unwrap().to_string();

    // Same key, same payload: replayed, not re-executed.
    let res = post(
        &client,
        format!("{}/sales/meter", srv.base_url),
        &actor,
        "admin",
        "k-sale",
        sale_body.clone(),
    )
    .send()
    .await
    .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let replay: serde_json::Value = res.json().await.unwrap();
    assert_eq!(replay["id"], txn["id"]);
    assert_eq!(replay["number"], txn["number"]);

    // Same key, different payload: conflict.
    let res = post(
        &client,
        format!("{}/sales/meter", srv.base_url),
        &actor,
        "admin",
        "k-sale",
        json!({ "customer_id": customer_id, "latest_reading": 999 }),
    )
    .send()
    .await
    .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let res = post(
        &client,
        format!("{}/transactions/{}/paid", srv.base_url, txn_id),
        &actor,
        "admin",
        "k-paid",
        json!({}),
    )
    .send()
    .await
    .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = post(
        &client,
        format!("{}/transactions/{}/invoice", srv.base_url, txn_id),
        &actor,
        "admin",
        "k-invoice",
        json!({ "year": 2026, "month": 1 }),
    )
    .send()
    .await
    .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let invoice: serde_json::Value = res.json().await.unwrap();
    assert_eq!(invoice["number"], "INV-202601-00001");
    assert_eq!(invoice["subtotal_cents"], 4_000);
    assert_eq!(invoice["gst_cents"], 400);
    assert_eq!(invoice["total_cents"], 4_400);

    // Second issuance for the same transaction is a conflict.
    let res = post(
        &client,
        format!("{}/transactions/{}/invoice", srv.base_url, txn_id),
        &actor,
        "admin",
        "k-invoice-2",
        json!({ "year": 2026, "month": 1 }),
    )
    .send()
    .await
    .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let res = get(
        &client,
        format!("{}/transactions/{}", srv.base_url, txn_id),
        &actor,
        "admin",
    )
    .send()
    .await
    .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["paid"], true);
    assert_eq!(body["invoice"]["number"], "INV-202601-00001");

    let res = get(&client, format!("{}/audit", srv.base_url), &actor, "admin")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let audit: serde_json::Value = res.json().await.unwrap();
    let actions: Vec<&str> = audit["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["action"].as_str().unwrap())
        .collect();
    assert_eq!(
        actions,
        [
            "customer.registered",
            "sale.meter",
            "transaction.paid",
            "invoice.issued",
        ]
    );
}
