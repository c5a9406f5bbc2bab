mod common;

use axum::http::{Method, StatusCode};
use rust_decimal_macros::dec;
use serde_json::json;

use common::{expect_json, TestApp};

/// Decimals serialize as JSON strings; compare them scale-insensitively.
fn decimal_field(value: &serde_json::Value) -> rust_decimal::Decimal {
    value
        .as_str()
        .expect("decimal field serialized as string")
        .parse()
        .expect("decimal field parses")
}

async fn seed_prices(app: &TestApp) {
    // Customer C1 has a dedicated quantity-break price next to the general one
    let payload = json!({
        "itemPrices": [
            {
                "itemNo": "ITEM-X",
                "salesType": "All Customers",
                "salesCode": "",
                "minimumQuantity": "1",
                "unitPrice": "10",
                "lastModified": "2025-03-01T08:00:00Z"
            },
            {
                "itemNo": "ITEM-X",
                "salesType": "Customer",
                "salesCode": "C1",
                "minimumQuantity": "5",
                "unitPrice": "8",
                "lastModified": "2025-03-01T08:00:00Z"
            }
        ]
    });
    let response = app
        .request(Method::POST, "/api/v1/bc-item-prices/sync", Some(payload))
        .await;
    expect_json(response, StatusCode::OK).await;
}

async fn seed_customer(app: &TestApp, no: &str) -> i64 {
    let response = app
        .request(
            Method::POST,
            "/api/v1/bc-customers/sync",
            Some(json!({
                "customers": [{
                    "bcId": format!("bc-{}", no),
                    "no": no,
                    "displayName": format!("Customer {}", no),
                    "lastModified": "2025-03-01T08:00:00Z"
                }]
            })),
        )
        .await;
    expect_json(response, StatusCode::OK).await;

    use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
    vansale_api::entities::bc_customer::Entity::find()
        .filter(vansale_api::entities::bc_customer::Column::No.eq(no))
        .one(&*app.state.db)
        .await
        .unwrap()
        .expect("customer row")
        .id
}

#[tokio::test]
async fn customer_quantity_break_wins_over_the_general_price() {
    // Scenario: qty 6 for customer C1 resolves to the customer tier price 8
    let app = TestApp::new().await;
    seed_prices(&app).await;
    let customer_id = seed_customer(&app, "C1").await;

    let response = app
        .request(
            Method::GET,
            &format!(
                "/api/v1/stock/price?item_no=ITEM-X&customer_id={}&qte=6",
                customer_id
            ),
            None,
        )
        .await;
    let body = expect_json(response, StatusCode::OK).await;
    assert_eq!(decimal_field(&body["unit_price"]), dec!(8));
    assert_eq!(body["tier"], "Customer");
}

#[tokio::test]
async fn other_customers_fall_back_to_the_general_tier() {
    let app = TestApp::new().await;
    seed_prices(&app).await;
    let customer_id = seed_customer(&app, "C2").await;

    let response = app
        .request(
            Method::GET,
            &format!(
                "/api/v1/stock/price?item_no=ITEM-X&customer_id={}&qte=6",
                customer_id
            ),
            None,
        )
        .await;
    let body = expect_json(response, StatusCode::OK).await;
    assert_eq!(decimal_field(&body["unit_price"]), dec!(10));
    assert_eq!(body["tier"], "AllCustomers");
}

#[tokio::test]
async fn missing_price_rows_return_no_price_found() {
    let app = TestApp::new().await;

    let response = app
        .request(
            Method::GET,
            "/api/v1/stock/price?item_no=UNPRICED&qte=1",
            None,
        )
        .await;
    let body = expect_json(response, StatusCode::NOT_FOUND).await;
    assert!(body["message"].as_str().unwrap().contains("UNPRICED"));
}

#[tokio::test]
async fn consultation_joins_snapshot_and_ledger_stock() {
    let app = TestApp::new().await;
    app.seed_bc_item("ITEM-X", Some(dec!(120))).await;
    let product_id = app.seed_product("P-1", Some("ITEM-X")).await;

    // Receive 5 into the salesperson's depot through a full PO lifecycle
    let response = app
        .request(
            Method::POST,
            "/api/v1/purchase-orders",
            Some(json!({
                "salesperson_id": 9,
                "lines": [{ "product_id": product_id, "qte": 5 }]
            })),
        )
        .await;
    let body = expect_json(response, StatusCode::CREATED).await;
    let po_id = body["purchase_order"]["id"].as_i64().unwrap();
    let line_id = body["lines"][0]["id"].as_i64().unwrap();

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/purchase-orders/{}/validate", po_id),
            None,
        )
        .await;
    expect_json(response, StatusCode::OK).await;
    app.state
        .services
        .settlement
        .record_bc_submission(po_id, "PO-CONS", None)
        .await
        .unwrap();
    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/purchase-orders/{}/mark-as-expedie", po_id),
            Some(json!({ "lines": [{ "line_id": line_id, "qte_recue": 5 }] })),
        )
        .await;
    expect_json(response, StatusCode::OK).await;

    let response = app
        .request(
            Method::GET,
            "/api/v1/stock/consultation?salesperson_id=9",
            None,
        )
        .await;
    let body = expect_json(response, StatusCode::OK).await;
    let rows = body.as_array().expect("consultation rows");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["code"], "P-1");
    assert_eq!(rows[0]["local_stock"], 5);
    assert_eq!(decimal_field(&rows[0]["bc_inventory"]), dec!(120));

    // Another salesperson sees no local stock for the same product
    let response = app
        .request(
            Method::GET,
            "/api/v1/stock/consultation?salesperson_id=2",
            None,
        )
        .await;
    let body = expect_json(response, StatusCode::OK).await;
    assert_eq!(body[0]["local_stock"], 0);
}

#[tokio::test]
async fn by_location_exposes_the_mirrored_snapshot() {
    let app = TestApp::new().await;
    app.seed_bc_item("ITEM-X", Some(dec!(40))).await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/bc-locations/sync",
            Some(json!({
                "locations": [
                    { "bcId": "loc-1", "code": "DEPOT-NORD", "displayName": "Depot Nord" },
                    { "bcId": "loc-2", "code": "DEPOT-SUD", "displayName": "Depot Sud" }
                ]
            })),
        )
        .await;
    expect_json(response, StatusCode::OK).await;

    let response = app
        .request(
            Method::GET,
            "/api/v1/stock/by-location?location_code=DEPOT-NORD",
            None,
        )
        .await;
    let body = expect_json(response, StatusCode::OK).await;
    let rows = body.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["location_code"], "DEPOT-NORD");
    assert_eq!(rows[0]["item_no"], "ITEM-X");
    assert_eq!(decimal_field(&rows[0]["inventory"]), dec!(40));
}
