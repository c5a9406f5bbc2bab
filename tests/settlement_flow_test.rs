mod common;

use axum::http::{Method, StatusCode};
use sea_orm::{EntityTrait, PaginatorTrait};
use serde_json::json;
use vansale_api::entities::stock_transaction;

use common::{expect_json, response_json, TestApp};

async fn create_purchase_order(app: &TestApp, product_id: i64, qte: i32) -> (i64, i64) {
    let response = app
        .request(
            Method::POST,
            "/api/v1/purchase-orders",
            Some(json!({
                "salesperson_id": 1,
                "lines": [{ "product_id": product_id, "qte": qte }]
            })),
        )
        .await;
    let body = expect_json(response, StatusCode::CREATED).await;
    let po_id = body["purchase_order"]["id"].as_i64().expect("po id");
    let line_id = body["lines"][0]["id"].as_i64().expect("line id");
    (po_id, line_id)
}

/// Drives a purchase order through its full lifecycle into salesperson stock.
async fn receive_stock(app: &TestApp, product_id: i64, qte: i32) -> i64 {
    let (po_id, line_id) = create_purchase_order(app, product_id, qte).await;

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/purchase-orders/{}/validate", po_id),
            None,
        )
        .await;
    expect_json(response, StatusCode::OK).await;

    // BC confirmed the document out-of-band
    app.state
        .services
        .settlement
        .record_bc_submission(po_id, "PO-SEED", Some("Open"))
        .await
        .expect("record bc submission");

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/purchase-orders/{}/mark-as-expedie", po_id),
            Some(json!({ "lines": [{ "line_id": line_id, "qte_recue": qte }] })),
        )
        .await;
    expect_json(response, StatusCode::OK).await;

    po_id
}

async fn ledger_row_count(app: &TestApp) -> u64 {
    stock_transaction::Entity::find()
        .count(&*app.state.db)
        .await
        .expect("count ledger rows")
}

#[tokio::test]
async fn purchase_order_lifecycle_books_entree_once() {
    // Scenario: PO with one line of 5, driven non_valide -> valide ->
    // envoye_bc -> expedie; expedie books one entree of qty 5
    let app = TestApp::new().await;
    let product_id = app.seed_product("P-10", None).await;

    let (po_id, line_id) = create_purchase_order(&app, product_id, 5).await;

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/purchase-orders/{}/validate", po_id),
            None,
        )
        .await;
    let body = expect_json(response, StatusCode::OK).await;
    assert_eq!(body["purchase_order"]["status"], "valide");
    assert_eq!(body["already_applied"], false);

    let settlement = app
        .state
        .services
        .settlement
        .record_bc_submission(po_id, "PO-001", Some("Open"))
        .await
        .expect("envoye_bc transition");
    assert_eq!(settlement.document.status, "envoye_bc");
    assert_eq!(settlement.document.bc_number.as_deref(), Some("PO-001"));

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/purchase-orders/{}/mark-as-expedie", po_id),
            Some(json!({ "lines": [{ "line_id": line_id, "qte_recue": 5 }] })),
        )
        .await;
    let body = expect_json(response, StatusCode::OK).await;
    assert_eq!(body["purchase_order"]["status"], "expedie");
    let movements = body["movements"].as_array().expect("movements array");
    assert_eq!(movements.len(), 1);
    assert_eq!(movements[0]["type"], "entree");
    assert_eq!(movements[0]["qte"], 5);

    let stock = app
        .state
        .services
        .ledger
        .current_stock(product_id, 1)
        .await
        .expect("current stock");
    assert_eq!(stock, 5);

    // Replaying the expedie transition returns the stored result and books
    // nothing new
    let rows_before = ledger_row_count(&app).await;
    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/purchase-orders/{}/mark-as-expedie", po_id),
            Some(json!({})),
        )
        .await;
    let body = expect_json(response, StatusCode::OK).await;
    assert_eq!(body["already_applied"], true);
    assert_eq!(ledger_row_count(&app).await, rows_before);
}

#[tokio::test]
async fn delivery_note_validation_books_sortie_and_is_idempotent() {
    // Scenarios B and C: a delivery note of 2 against a stock of 5 leaves 3,
    // and a second validate call changes nothing
    let app = TestApp::new().await;
    let product_id = app.seed_product("P-10", None).await;
    receive_stock(&app, product_id, 5).await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/delivery-notes",
            Some(json!({
                "salesperson_id": 1,
                "lines": [{ "product_id": product_id, "qte": 2 }]
            })),
        )
        .await;
    let body = expect_json(response, StatusCode::CREATED).await;
    let dn_id = body["delivery_note"]["id"].as_i64().expect("dn id");

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/delivery-notes/{}/validate", dn_id),
            None,
        )
        .await;
    let body = expect_json(response, StatusCode::OK).await;
    assert_eq!(body["delivery_note"]["status"], "valide");
    assert_eq!(body["movements"].as_array().unwrap().len(), 1);
    assert_eq!(body["movements"][0]["type"], "sortie");

    let stock = app
        .state
        .services
        .ledger
        .current_stock(product_id, 1)
        .await
        .unwrap();
    assert_eq!(stock, 3);

    // Scenario C: revalidation returns the prior result, no second sortie
    let rows_before = ledger_row_count(&app).await;
    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/delivery-notes/{}/validate", dn_id),
            None,
        )
        .await;
    let body = expect_json(response, StatusCode::OK).await;
    assert_eq!(body["already_applied"], true);
    assert_eq!(ledger_row_count(&app).await, rows_before);

    let stock = app
        .state
        .services
        .ledger
        .current_stock(product_id, 1)
        .await
        .unwrap();
    assert_eq!(stock, 3);
}

#[tokio::test]
async fn concurrent_duplicate_validations_book_one_movement_set() {
    let app = TestApp::new().await;
    let product_id = app.seed_product("P-77", None).await;
    receive_stock(&app, product_id, 10).await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/delivery-notes",
            Some(json!({
                "salesperson_id": 1,
                "lines": [{ "product_id": product_id, "qte": 4 }]
            })),
        )
        .await;
    let body = expect_json(response, StatusCode::CREATED).await;
    let dn_id = body["delivery_note"]["id"].as_i64().unwrap();

    let settlement = &app.state.services.settlement;
    let (a, b) = tokio::join!(
        settlement.validate_delivery_note(dn_id),
        settlement.validate_delivery_note(dn_id)
    );
    let a = a.expect("first caller");
    let b = b.expect("second caller");

    // Exactly one caller performed the transition; the other got the
    // stored result
    assert!(a.already_applied != b.already_applied);

    let rows = stock_transaction::Entity::find()
        .count(&*app.state.db)
        .await
        .unwrap();
    // 1 entree from receiving + exactly 1 sortie
    assert_eq!(rows, 2);

    let stock = app
        .state
        .services
        .ledger
        .current_stock(product_id, 1)
        .await
        .unwrap();
    assert_eq!(stock, 6);
}

#[tokio::test]
async fn illegal_transitions_leave_status_and_ledger_untouched() {
    let app = TestApp::new().await;
    let product_id = app.seed_product("P-20", None).await;
    let (po_id, line_id) = create_purchase_order(&app, product_id, 5).await;

    // expedie straight from non_valide is not an edge
    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/purchase-orders/{}/mark-as-expedie", po_id),
            Some(json!({ "lines": [{ "line_id": line_id, "qte_recue": 5 }] })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    assert_eq!(ledger_row_count(&app).await, 0);
    let response = app
        .request(
            Method::GET,
            &format!("/api/v1/purchase-orders/{}", po_id),
            None,
        )
        .await;
    let body = response_json(response).await;
    assert_eq!(body["purchase_order"]["status"], "non_valide");
}

#[tokio::test]
async fn cancellation_is_rejected_after_expedie() {
    let app = TestApp::new().await;
    let product_id = app.seed_product("P-30", None).await;
    let po_id = receive_stock(&app, product_id, 5).await;

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/purchase-orders/{}/cancel", po_id),
            None,
        )
        .await;
    let body = expect_json(response, StatusCode::CONFLICT).await;
    assert_eq!(body["error"], "Conflict");

    let response = app
        .request(
            Method::GET,
            &format!("/api/v1/purchase-orders/{}", po_id),
            None,
        )
        .await;
    let body = response_json(response).await;
    assert_eq!(body["purchase_order"]["status"], "expedie");
}

#[tokio::test]
async fn sortie_beyond_stock_is_rejected_with_no_mutation() {
    let app = TestApp::new().await;
    let product_id = app.seed_product("P-40", None).await;
    receive_stock(&app, product_id, 3).await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/delivery-notes",
            Some(json!({
                "salesperson_id": 1,
                "lines": [{ "product_id": product_id, "qte": 9 }]
            })),
        )
        .await;
    let body = expect_json(response, StatusCode::CREATED).await;
    let dn_id = body["delivery_note"]["id"].as_i64().unwrap();

    let rows_before = ledger_row_count(&app).await;
    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/delivery-notes/{}/validate", dn_id),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    // Rejected with no mutation: status stays cree, ledger untouched
    assert_eq!(ledger_row_count(&app).await, rows_before);
    let response = app
        .request(
            Method::GET,
            &format!("/api/v1/delivery-notes/{}", dn_id),
            None,
        )
        .await;
    let body = response_json(response).await;
    assert_eq!(body["delivery_note"]["status"], "cree");
}

#[tokio::test]
async fn return_invoice_offsets_expedited_purchase_order() {
    let app = TestApp::new().await;
    let product_id = app.seed_product("P-50", None).await;
    let po_id = receive_stock(&app, product_id, 8).await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/return-invoices",
            Some(json!({
                "purchase_order_id": po_id,
                "reason": "damaged packaging",
                "lines": [{ "product_id": product_id, "qte": 3 }]
            })),
        )
        .await;
    let body = expect_json(response, StatusCode::CREATED).await;
    let ri_id = body["return_invoice"]["id"].as_i64().unwrap();
    assert_eq!(body["return_invoice"]["status"], "cree");

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/return-invoices/{}/validate", ri_id),
            None,
        )
        .await;
    let body = expect_json(response, StatusCode::OK).await;
    assert_eq!(body["return_invoice"]["status"], "valide");
    assert_eq!(body["movements"][0]["type"], "sortie");
    assert_eq!(body["movements"][0]["qte"], 3);

    let stock = app
        .state
        .services
        .ledger
        .current_stock(product_id, 1)
        .await
        .unwrap();
    assert_eq!(stock, 5);
}

#[tokio::test]
async fn return_invoice_against_unshipped_order_is_rejected() {
    let app = TestApp::new().await;
    let product_id = app.seed_product("P-60", None).await;
    let (po_id, _) = create_purchase_order(&app, product_id, 5).await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/return-invoices",
            Some(json!({
                "purchase_order_id": po_id,
                "lines": [{ "product_id": product_id, "qte": 1 }]
            })),
        )
        .await;
    let body = expect_json(response, StatusCode::CREATED).await;
    let ri_id = body["return_invoice"]["id"].as_i64().unwrap();

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/return-invoices/{}/validate", ri_id),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(ledger_row_count(&app).await, 0);
}

#[tokio::test]
async fn current_stock_always_matches_the_signed_ledger_sum() {
    let app = TestApp::new().await;
    let product_id = app.seed_product("P-70", None).await;
    receive_stock(&app, product_id, 20).await;

    for qte in [2, 3, 4] {
        let response = app
            .request(
                Method::POST,
                "/api/v1/delivery-notes",
                Some(json!({
                    "salesperson_id": 1,
                    "lines": [{ "product_id": product_id, "qte": qte }]
                })),
            )
            .await;
        let body = expect_json(response, StatusCode::CREATED).await;
        let dn_id = body["delivery_note"]["id"].as_i64().unwrap();
        let response = app
            .request(
                Method::POST,
                &format!("/api/v1/delivery-notes/{}/validate", dn_id),
                None,
            )
            .await;
        expect_json(response, StatusCode::OK).await;
    }

    // Derived stock equals the signed sum over all rows for the pair
    let rows: Vec<stock_transaction::Model> = stock_transaction::Entity::find()
        .all(&*app.state.db)
        .await
        .unwrap();
    let expected: i64 = rows
        .iter()
        .filter(|r| r.product_id == product_id && r.salesperson_id == 1)
        .map(|r| {
            if r.r#type == "entree" {
                i64::from(r.qte)
            } else {
                -i64::from(r.qte)
            }
        })
        .sum();
    assert_eq!(expected, 11);

    let stock = app
        .state
        .services
        .ledger
        .current_stock(product_id, 1)
        .await
        .unwrap();
    assert_eq!(stock, expected);

    // The transactions endpoint exposes the same rows read-only
    let response = app
        .request(
            Method::GET,
            "/api/v1/stock/transactions?salesperson_id=1",
            None,
        )
        .await;
    let body = expect_json(response, StatusCode::OK).await;
    assert_eq!(body.as_array().unwrap().len(), rows.len());
}

#[tokio::test]
async fn validate_requires_a_line_with_positive_quantity() {
    let app = TestApp::new().await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/purchase-orders",
            Some(json!({ "salesperson_id": 1, "lines": [] })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .request(
            Method::POST,
            "/api/v1/purchase-orders",
            Some(json!({
                "salesperson_id": 1,
                "lines": [{ "product_id": 1, "qte": 0 }]
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_documents_return_not_found() {
    let app = TestApp::new().await;

    let response = app
        .request(Method::POST, "/api/v1/purchase-orders/999/validate", None)
        .await;
    let body = expect_json(response, StatusCode::NOT_FOUND).await;
    assert!(body["message"]
        .as_str()
        .unwrap()
        .contains("Purchase order 999"));

    let response = app
        .request(Method::POST, "/api/v1/delivery-notes/999/validate", None)
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
