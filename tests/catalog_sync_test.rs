mod common;

use axum::http::{Method, StatusCode};
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
use sea_orm::{ActiveModelTrait, ActiveValue::Set};
use serde_json::json;
use vansale_api::entities::{bc_customer, bc_item_price};

use common::{expect_json, TestApp};

fn customer(no: &str, name: &str, modified: &str) -> serde_json::Value {
    json!({
        "bcId": format!("bc-{}", no),
        "no": no,
        "displayName": name,
        "lastModified": modified
    })
}

#[tokio::test]
async fn one_bad_record_never_blocks_the_rest_of_the_batch() {
    // Scenario: batch of 3 customers where #2 fails local validation;
    // #1 and #3 are persisted and the response reports count 2 plus one error
    let app = TestApp::new().await;

    let payload = json!({
        "customers": [
            customer("C-1", "Alpha Retail", "2025-03-01T08:00:00Z"),
            { "bcId": "bc-C-2", "no": "", "displayName": "Broken" },
            customer("C-3", "Gamma Market", "2025-03-01T08:00:00Z"),
        ]
    });

    let response = app
        .request(Method::POST, "/api/v1/bc-customers/sync", Some(payload))
        .await;
    let body = expect_json(response, StatusCode::OK).await;

    assert_eq!(body["success"], true);
    assert_eq!(body["count"], 2);
    let errors = body["errors"].as_array().expect("errors array");
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0]["item"], "bc-C-2");

    let stored = bc_customer::Entity::find()
        .count(&*app.state.db)
        .await
        .unwrap();
    assert_eq!(stored, 2);
}

#[tokio::test]
async fn replaying_a_batch_never_duplicates_mirror_rows() {
    let app = TestApp::new().await;

    let payload = json!({
        "customers": [
            customer("C-1", "Alpha Retail", "2025-03-01T08:00:00Z"),
            customer("C-2", "Beta Foods", "2025-03-01T08:00:00Z"),
        ]
    });

    let response = app
        .request(Method::POST, "/api/v1/bc-customers/sync", Some(payload.clone()))
        .await;
    let body = expect_json(response, StatusCode::OK).await;
    assert_eq!(body["count"], 2);

    let response = app
        .request(Method::POST, "/api/v1/bc-customers/sync", Some(payload))
        .await;
    let body = expect_json(response, StatusCode::OK).await;
    // Identical records are already up to date, not conflicts
    assert_eq!(body["count"], 2);
    assert_eq!(body["errors"].as_array().unwrap().len(), 0);

    let stored = bc_customer::Entity::find()
        .count(&*app.state.db)
        .await
        .unwrap();
    assert_eq!(stored, 2);
}

#[tokio::test]
async fn stale_incoming_records_are_skipped_as_conflicts() {
    let app = TestApp::new().await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/bc-customers/sync",
            Some(json!({ "customers": [customer("C-1", "Current Name", "2025-03-02T08:00:00Z")] })),
        )
        .await;
    expect_json(response, StatusCode::OK).await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/bc-customers/sync",
            Some(json!({ "customers": [customer("C-1", "Old Name", "2025-03-01T08:00:00Z")] })),
        )
        .await;
    let body = expect_json(response, StatusCode::OK).await;
    assert_eq!(body["count"], 0);
    let errors = body["errors"].as_array().unwrap();
    assert_eq!(errors.len(), 1);
    assert!(errors[0]["reason"].as_str().unwrap().starts_with("conflict"));

    let stored = bc_customer::Entity::find()
        .filter(bc_customer::Column::No.eq("C-1"))
        .one(&*app.state.db)
        .await
        .unwrap()
        .expect("customer row");
    assert_eq!(stored.display_name, "Current Name");
}

#[tokio::test]
async fn sync_preserves_locally_curated_fields() {
    let app = TestApp::new().await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/bc-customers/sync",
            Some(json!({ "customers": [customer("C-1", "Alpha Retail", "2025-03-01T08:00:00Z")] })),
        )
        .await;
    expect_json(response, StatusCode::OK).await;

    // A back-office user assigns the sales channel locally
    let stored = bc_customer::Entity::find()
        .filter(bc_customer::Column::No.eq("C-1"))
        .one(&*app.state.db)
        .await
        .unwrap()
        .expect("customer row");
    let mut active: bc_customer::ActiveModel = stored.into();
    active.sales_channel_id = Set(Some(7));
    active.update(&*app.state.db).await.unwrap();

    // A newer remote version updates remote-owned fields only
    let response = app
        .request(
            Method::POST,
            "/api/v1/bc-customers/sync",
            Some(json!({ "customers": [customer("C-1", "Alpha Retail SA", "2025-03-05T08:00:00Z")] })),
        )
        .await;
    let body = expect_json(response, StatusCode::OK).await;
    assert_eq!(body["count"], 1);

    let stored = bc_customer::Entity::find()
        .filter(bc_customer::Column::No.eq("C-1"))
        .one(&*app.state.db)
        .await
        .unwrap()
        .expect("customer row");
    assert_eq!(stored.display_name, "Alpha Retail SA");
    assert_eq!(stored.sales_channel_id, Some(7));
}

#[tokio::test]
async fn item_price_replay_keeps_a_single_row_per_tier_key() {
    let app = TestApp::new().await;

    let payload = json!({
        "itemPrices": [
            {
                "itemNo": "ITEM-1",
                "salesType": "Customer",
                "salesCode": "C-1",
                "minimumQuantity": "5",
                "unitPrice": "8",
                "lastModified": "2025-03-01T08:00:00Z"
            },
            {
                "itemNo": "ITEM-1",
                "salesType": "All Customers",
                "salesCode": "",
                "minimumQuantity": "1",
                "unitPrice": "10",
                "lastModified": "2025-03-01T08:00:00Z"
            }
        ]
    });

    for _ in 0..2 {
        let response = app
            .request(Method::POST, "/api/v1/bc-item-prices/sync", Some(payload.clone()))
            .await;
        let body = expect_json(response, StatusCode::OK).await;
        assert_eq!(body["count"], 2);
    }

    let stored = bc_item_price::Entity::find()
        .count(&*app.state.db)
        .await
        .unwrap();
    assert_eq!(stored, 2);
}

#[tokio::test]
async fn newer_price_version_updates_in_place() {
    let app = TestApp::new().await;

    let first = json!({
        "itemPrices": [{
            "itemNo": "ITEM-2",
            "salesType": "All Customers",
            "salesCode": "",
            "minimumQuantity": "1",
            "unitPrice": "10",
            "lastModified": "2025-03-01T08:00:00Z"
        }]
    });
    let response = app
        .request(Method::POST, "/api/v1/bc-item-prices/sync", Some(first))
        .await;
    expect_json(response, StatusCode::OK).await;

    let second = json!({
        "itemPrices": [{
            "itemNo": "ITEM-2",
            "salesType": "All Customers",
            "salesCode": "",
            "minimumQuantity": "1",
            "unitPrice": "12",
            "lastModified": "2025-03-02T08:00:00Z"
        }]
    });
    let response = app
        .request(Method::POST, "/api/v1/bc-item-prices/sync", Some(second))
        .await;
    let body = expect_json(response, StatusCode::OK).await;
    assert_eq!(body["count"], 1);

    let rows = bc_item_price::Entity::find()
        .filter(bc_item_price::Column::ItemNo.eq("ITEM-2"))
        .all(&*app.state.db)
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].unit_price, rust_decimal_macros::dec!(12));
}
