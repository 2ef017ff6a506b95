use super::common::*;
use axum::body::Body;
use axum::extract::State;
use axum::http::{header, Request, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use crate::workflows::matching::domain::RequestId;
use crate::workflows::matching::router::{auto_match_handler, AutoMatchBody};

fn post_json(uri: &str, payload: Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(&payload).unwrap()))
        .unwrap()
}

fn supplied_store() -> Arc<crate::workflows::matching::MemoryReliefStore> {
    let store = Arc::new(people_store());
    seed_request(&store, 10, 12);
    seed_admin(&store, 2);
    seed_pledge(&store, 20, 2, 6, Some(2));
    seed_pledge(&store, 21, 3, 8, Some(1));
    store
}

#[tokio::test]
async fn auto_match_route_returns_summary() {
    let router = router_with_store(supplied_store());

    let response = router
        .oneshot(post_json(
            "/api/v1/matches/auto",
            json!({ "request_id": 10, "match_type_name": "quickest" }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["policy"], "quickest");
    assert_eq!(payload["matches_created"], 2);
    assert_eq!(payload["quantity_assigned_by_source"]["pledges"], 12);
    assert_eq!(payload["quantity_remaining"], 0);
    assert_eq!(payload["status"], "matched");
    assert_eq!(payload["matches"][0]["pledge_id"], 21);
}

#[tokio::test]
async fn no_supply_has_a_distinct_body() {
    let store = Arc::new(people_store());
    seed_request(&store, 10, 3);
    let router = router_with_store(store);

    let response = router
        .oneshot(post_json("/api/v1/matches/auto", json!({ "request_id": 10 })))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let payload = read_json_body(response).await;
    assert_eq!(payload["outcome"], "no_supply");
    assert_eq!(payload["request_id"], 10);
}

#[tokio::test]
async fn auto_match_route_maps_lookup_and_validation_errors() {
    let router = router_with_store(supplied_store());

    let missing = router
        .clone()
        .oneshot(post_json("/api/v1/matches/auto", json!({ "request_id": 77 })))
        .await
        .expect("route executes");
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);

    let invalid = router
        .oneshot(post_json(
            "/api/v1/matches/auto",
            json!({ "request_id": 10, "match_type_name": "cheapest" }),
        ))
        .await
        .expect("route executes");
    assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);
    let payload = read_json_body(invalid).await;
    assert!(payload["error"]
        .as_str()
        .is_some_and(|message| message.contains("cheapest")));
}

#[tokio::test]
async fn fulfilled_request_conflicts() {
    let router = router_with_store(supplied_store());
    let first = router
        .clone()
        .oneshot(post_json("/api/v1/matches/auto", json!({ "request_id": 10 })))
        .await
        .expect("route executes");
    assert_eq!(first.status(), StatusCode::OK);

    let second = router
        .oneshot(post_json("/api/v1/matches/auto", json!({ "request_id": 10 })))
        .await
        .expect("route executes");
    assert_eq!(second.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn auto_match_handler_returns_internal_error_on_repository_failure() {
    let service = Arc::new(build_service(
        Arc::new(UnavailableRepository),
        StaticDistances::default(),
    ));

    let response = auto_match_handler::<UnavailableRepository, StaticDistances>(
        State(service),
        axum::Json(AutoMatchBody {
            request_id: RequestId(10),
            match_type_name: None,
            inventory_priority: None,
        }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn auto_types_route_lists_catalog() {
    let router = router_with_store(Arc::new(people_store()));

    let response = router
        .oneshot(
            Request::get("/api/v1/matches/auto-types")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    let names: Vec<&str> = payload
        .as_array()
        .expect("array payload")
        .iter()
        .filter_map(|entry| entry["name"].as_str())
        .collect();
    assert_eq!(names, vec!["nearest", "quickest", "fulfillment"]);
}

#[tokio::test]
async fn manual_shipping_and_status_routes_round_trip() {
    let store = supplied_store();
    let router = router_with_store(store.clone());

    let created = router
        .clone()
        .oneshot(post_json(
            "/api/v1/matches",
            json!({ "request_id": 10, "pledge_id": 20, "match_quantity": 4 }),
        ))
        .await
        .expect("route executes");
    assert_eq!(created.status(), StatusCode::CREATED);
    let receipt = read_json_body(created).await;
    let match_id = receipt["matches"][0]["id"].as_u64().expect("match id");
    assert_eq!(receipt["matches"][0]["match_type"], "manual");

    let forbidden = router
        .clone()
        .oneshot(post_json(
            &format!("/api/v1/matches/{match_id}/shipping"),
            json!({ "shipping_status": "delivered", "actor_role": "donor" }),
        ))
        .await
        .expect("route executes");
    assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);

    let shipped = router
        .clone()
        .oneshot(post_json(
            &format!("/api/v1/matches/{match_id}/shipping"),
            json!({
                "shipping_status": "shipped",
                "actor_role": "donor",
                "tracking_number": "TRACK-1",
                "shipping_date": "2026-03-02"
            }),
        ))
        .await
        .expect("route executes");
    assert_eq!(shipped.status(), StatusCode::OK);
    assert_eq!(pledge_state(&store, 20).fulfilled_quantity, 4);

    let cancel = router
        .clone()
        .oneshot(post_json(
            &format!("/api/v1/matches/{match_id}/cancel"),
            json!({}),
        ))
        .await
        .expect("route executes");
    assert_eq!(cancel.status(), StatusCode::CONFLICT);

    let status = router
        .oneshot(
            Request::get("/api/v1/requests/10")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .expect("route executes");
    assert_eq!(status.status(), StatusCode::OK);
    let view = read_json_body(status).await;
    assert_eq!(view["quantity_matched"], 4);
    assert_eq!(view["quantity_remaining"], 8);
    assert_eq!(view["matches"][0]["shipping_status"], "shipped");
}

#[tokio::test]
async fn pledge_cancel_route_reports_released_units() {
    let store = supplied_store();
    let router = router_with_store(store.clone());
    router
        .clone()
        .oneshot(post_json(
            "/api/v1/matches",
            json!({ "request_id": 10, "pledge_id": 21, "match_quantity": 5 }),
        ))
        .await
        .expect("route executes");

    let response = router
        .clone()
        .oneshot(post_json("/api/v1/pledges/21/cancel", json!({})))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["released_quantity"], 5);

    let missing = router
        .oneshot(post_json("/api/v1/pledges/404/cancel", json!({})))
        .await
        .expect("route executes");
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn match_route_returns_shipping_details() {
    let router = router_with_store(supplied_store());
    let created = router
        .clone()
        .oneshot(post_json(
            "/api/v1/matches",
            json!({ "request_id": 10, "pledge_id": 21, "match_quantity": 3 }),
        ))
        .await
        .expect("route executes");
    let receipt = read_json_body(created).await;
    let match_id = receipt["matches"][0]["id"].as_u64().expect("match id");

    router
        .clone()
        .oneshot(post_json(
            &format!("/api/v1/matches/{match_id}/shipping"),
            json!({ "shipping_status": "shipped", "actor_role": "donor", "tracking_number": "TRACK-9" }),
        ))
        .await
        .expect("route executes");

    let response = router
        .clone()
        .oneshot(
            Request::get(format!("/api/v1/matches/{match_id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    let record = read_json_body(response).await;
    assert_eq!(record["pledge_id"], 21);
    assert_eq!(record["match_quantity"], 3);
    assert_eq!(record["shipping_status"], "shipped");
    assert_eq!(record["tracking_number"], "TRACK-9");

    let missing = router
        .oneshot(
            Request::get("/api/v1/matches/404")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .expect("route executes");
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}
