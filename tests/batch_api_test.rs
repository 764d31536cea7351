mod common;

use axum::http::{Method, StatusCode};
use chrono::{Duration, Utc};
use serde_json::json;

use common::{read_json, TestApp};

#[tokio::test]
async fn create_and_get_batch_roundtrip() {
    let app = TestApp::new().await;

    let created = app
        .create_batch_with(json!({
            "batch_code": "SCH-20260829-0001",
            "shelf_life_days": 7,
            "volume_liters": 100.0,
            "fat_percent": 3.8,
        }))
        .await;

    assert_eq!(created["batch_code"], "SCH-20260829-0001");
    assert_eq!(created["volume_liters"], 100.0);
    assert_eq!(created["available_liters"], 100.0);
    assert_eq!(created["reserved_liters"], 0.0);
    assert_eq!(created["free_liters"], 100.0);
    assert_eq!(created["version"], 1);
    assert_eq!(created["is_expired"], false);
    assert_eq!(created["is_deleted"], false);

    let id = created["id"].as_i64().expect("batch id");
    let response = app
        .request(Method::GET, &format!("/api/v1/batches/{id}"), None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let envelope = read_json(response).await;
    assert_eq!(envelope["success"], true);
    assert_eq!(envelope["data"]["id"], id);
    assert_eq!(envelope["data"]["available_liters"], 100.0);
    assert!(envelope["meta"]["request_id"].is_string());
}

#[tokio::test]
async fn expiry_is_derived_from_received_at_and_shelf_life() {
    let app = TestApp::new().await;

    let received_at = Utc::now() - Duration::days(2);
    let created = app
        .create_batch_with(json!({
            "batch_code": "SCH-20260827-0001",
            "received_at": received_at.to_rfc3339(),
            "shelf_life_days": 10,
            "volume_liters": 50.0,
            "fat_percent": 2.0,
        }))
        .await;

    let expiry: chrono::DateTime<Utc> = created["expiry_date"]
        .as_str()
        .expect("expiry_date string")
        .parse()
        .expect("valid timestamp");
    assert_eq!(expiry, received_at + Duration::days(10));
}

#[tokio::test]
async fn create_rejects_duplicate_batch_code() {
    let app = TestApp::new().await;
    app.create_batch("SCH-20260829-0002", 100.0).await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/batches",
            Some(json!({
                "batch_code": "SCH-20260829-0002",
                "shelf_life_days": 7,
                "volume_liters": 25.0,
                "fat_percent": 1.5,
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = read_json(response).await;
    assert!(
        body["message"]
            .as_str()
            .unwrap_or_default()
            .contains("SCH-20260829-0002"),
        "error should name the conflicting code: {body}"
    );
}

#[tokio::test]
async fn create_rejects_malformed_batch_code() {
    let app = TestApp::new().await;

    for bad_code in ["MILK-20260829-0001", "SCH-2026-0001", "sch-20260829-0001"] {
        let response = app
            .request(
                Method::POST,
                "/api/v1/batches",
                Some(json!({
                    "batch_code": bad_code,
                    "shelf_life_days": 7,
                    "volume_liters": 10.0,
                    "fat_percent": 3.0,
                })),
            )
            .await;
        assert_eq!(
            response.status(),
            StatusCode::BAD_REQUEST,
            "code {bad_code} should be rejected"
        );
    }
}

#[tokio::test]
async fn create_rejects_invalid_numbers() {
    let app = TestApp::new().await;

    let cases = [
        json!({"batch_code": "SCH-20260829-0003", "shelf_life_days": 7, "volume_liters": 0.0, "fat_percent": 3.0}),
        json!({"batch_code": "SCH-20260829-0003", "shelf_life_days": 7, "volume_liters": -5.0, "fat_percent": 3.0}),
        json!({"batch_code": "SCH-20260829-0003", "shelf_life_days": 7, "volume_liters": 10.0, "fat_percent": 101.0}),
        json!({"batch_code": "SCH-20260829-0003", "shelf_life_days": 0, "volume_liters": 10.0, "fat_percent": 3.0}),
        json!({"batch_code": "SCH-20260829-0003", "shelf_life_days": 31, "volume_liters": 10.0, "fat_percent": 3.0}),
    ];
    for body in cases {
        let response = app
            .request(Method::POST, "/api/v1/batches", Some(body.clone()))
            .await;
        assert_eq!(
            response.status(),
            StatusCode::BAD_REQUEST,
            "payload should be rejected: {body}"
        );
    }
}

#[tokio::test]
async fn get_missing_batch_returns_not_found() {
    let app = TestApp::new().await;
    let response = app.request(Method::GET, "/api/v1/batches/9999", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn list_batches_supports_skip_and_limit() {
    let app = TestApp::new().await;
    for n in 1..=3 {
        app.create_batch_with(json!({
            "batch_code": format!("SCH-20260829-{n:04}"),
            "received_at": (Utc::now() - Duration::hours(n)).to_rfc3339(),
            "shelf_life_days": 7,
            "volume_liters": 10.0,
            "fat_percent": 3.0,
        }))
        .await;
    }

    let response = app
        .request(Method::GET, "/api/v1/batches?skip=1&limit=1", None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let envelope = read_json(response).await;
    let page = &envelope["data"];
    assert_eq!(page["total"], 3);
    assert_eq!(page["skip"], 1);
    assert_eq!(page["limit"], 1);
    let items = page["items"].as_array().expect("items array");
    assert_eq!(items.len(), 1);
    // Most recently created first, so skipping one lands on the middle batch.
    assert_eq!(items[0]["batch_code"], "SCH-20260829-0002");
}

#[tokio::test]
async fn consume_reduces_available_volume_and_bumps_version() {
    let app = TestApp::new().await;
    let created = app.create_batch("SCH-20260829-0010", 100.0).await;
    let id = created["id"].as_i64().unwrap();

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/batches/{id}/consume"),
            Some(json!({"qty": 30.0, "order_id": "ORD-1001"})),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let envelope = read_json(response).await;
    let data = &envelope["data"];
    assert_eq!(data["batch_id"], id);
    assert_eq!(data["qty"], 30.0);
    assert_eq!(data["order_id"], "ORD-1001");
    assert_eq!(data["available_liters"], 70.0);
    assert_eq!(data["version"], 2);

    let response = app
        .request(Method::GET, &format!("/api/v1/batches/{id}"), None)
        .await;
    let envelope = read_json(response).await;
    assert_eq!(envelope["data"]["available_liters"], 70.0);
    assert_eq!(envelope["data"]["version"], 2);
}

#[tokio::test]
async fn consume_more_than_available_is_a_conflict() {
    let app = TestApp::new().await;
    let created = app.create_batch("SCH-20260829-0011", 100.0).await;
    let id = created["id"].as_i64().unwrap();

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/batches/{id}/consume"),
            Some(json!({"qty": 150.0})),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // The failed attempt must not have touched the ledger.
    let response = app
        .request(Method::GET, &format!("/api/v1/batches/{id}"), None)
        .await;
    let envelope = read_json(response).await;
    assert_eq!(envelope["data"]["available_liters"], 100.0);
    assert_eq!(envelope["data"]["version"], 1);
}

#[tokio::test]
async fn consume_rejects_non_positive_qty() {
    let app = TestApp::new().await;
    let created = app.create_batch("SCH-20260829-0012", 100.0).await;
    let id = created["id"].as_i64().unwrap();

    for qty in [0.0, -10.0] {
        let response = app
            .request(
                Method::POST,
                &format!("/api/v1/batches/{id}/consume"),
                Some(json!({"qty": qty})),
            )
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}

#[tokio::test]
async fn consume_missing_batch_returns_not_found() {
    let app = TestApp::new().await;
    let response = app
        .request(
            Method::POST,
            "/api/v1/batches/424242/consume",
            Some(json!({"qty": 1.0})),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn consume_expired_batch_is_a_conflict() {
    let app = TestApp::new().await;
    let created = app
        .create_batch_with(json!({
            "batch_code": "SCH-20260819-0001",
            "received_at": (Utc::now() - Duration::days(10)).to_rfc3339(),
            "shelf_life_days": 1,
            "volume_liters": 100.0,
            "fat_percent": 3.0,
        }))
        .await;
    assert_eq!(created["is_expired"], true);
    let id = created["id"].as_i64().unwrap();

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/batches/{id}/consume"),
            Some(json!({"qty": 10.0})),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn soft_delete_hides_batch_unless_requested() {
    let app = TestApp::new().await;
    let created = app.create_batch("SCH-20260829-0020", 100.0).await;
    let id = created["id"].as_i64().unwrap();

    let response = app
        .request(Method::DELETE, &format!("/api/v1/batches/{id}"), None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let envelope = read_json(response).await;
    assert_eq!(envelope["data"]["is_deleted"], true);

    // Hidden from plain reads and from the listing.
    let response = app
        .request(Method::GET, &format!("/api/v1/batches/{id}"), None)
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app.request(Method::GET, "/api/v1/batches", None).await;
    let envelope = read_json(response).await;
    assert_eq!(envelope["data"]["total"], 0);

    // Still reachable when explicitly asked for.
    let response = app
        .request(
            Method::GET,
            &format!("/api/v1/batches/{id}?include_deleted=true"),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let envelope = read_json(response).await;
    assert_eq!(envelope["data"]["is_deleted"], true);
}

#[tokio::test]
async fn deleting_twice_is_a_conflict() {
    let app = TestApp::new().await;
    let created = app.create_batch("SCH-20260829-0021", 100.0).await;
    let id = created["id"].as_i64().unwrap();

    let response = app
        .request(Method::DELETE, &format!("/api/v1/batches/{id}"), None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .request(Method::DELETE, &format!("/api/v1/batches/{id}"), None)
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn consume_on_deleted_batch_is_a_conflict() {
    let app = TestApp::new().await;
    let created = app.create_batch("SCH-20260829-0022", 100.0).await;
    let id = created["id"].as_i64().unwrap();

    let response = app
        .request(Method::DELETE, &format!("/api/v1/batches/{id}"), None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/batches/{id}/consume"),
            Some(json!({"qty": 10.0})),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn near_expiry_returns_only_batches_with_volume_inside_window() {
    let app = TestApp::new().await;

    // Expires in 2 days, still has volume: should be reported.
    let soon = app
        .create_batch_with(json!({
            "batch_code": "SCH-20260829-0030",
            "shelf_life_days": 2,
            "volume_liters": 40.0,
            "fat_percent": 3.0,
        }))
        .await;

    // Expires far outside the window.
    app.create_batch_with(json!({
        "batch_code": "SCH-20260829-0031",
        "shelf_life_days": 30,
        "volume_liters": 40.0,
        "fat_percent": 3.0,
    }))
    .await;

    // Inside the window but fully consumed.
    let drained = app
        .create_batch_with(json!({
            "batch_code": "SCH-20260829-0032",
            "shelf_life_days": 2,
            "volume_liters": 15.0,
            "fat_percent": 3.0,
        }))
        .await;
    let drained_id = drained["id"].as_i64().unwrap();
    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/batches/{drained_id}/consume"),
            Some(json!({"qty": 15.0})),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    // Inside the window but soft-deleted.
    let deleted = app
        .create_batch_with(json!({
            "batch_code": "SCH-20260829-0033",
            "shelf_life_days": 2,
            "volume_liters": 40.0,
            "fat_percent": 3.0,
        }))
        .await;
    let deleted_id = deleted["id"].as_i64().unwrap();
    let response = app
        .request(Method::DELETE, &format!("/api/v1/batches/{deleted_id}"), None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .request(Method::GET, "/api/v1/batches/near-expiry?days=3", None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let envelope = read_json(response).await;
    let items = envelope["data"].as_array().expect("array of batches");
    assert_eq!(items.len(), 1, "only the live near-expiry batch: {envelope}");
    assert_eq!(items[0]["id"], soon["id"]);
}

#[tokio::test]
async fn near_expiry_rejects_days_outside_range() {
    let app = TestApp::new().await;
    for uri in [
        "/api/v1/batches/near-expiry?days=-1",
        "/api/v1/batches/near-expiry?days=0",
        "/api/v1/batches/near-expiry?days=366",
    ] {
        let response = app.request(Method::GET, uri, None).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
    }
}
