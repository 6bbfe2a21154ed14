// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Integration tests for the HTTP admin surface: request wiring and the
//! typed-error to status-code mapping.

use aegis_control_core::domain::config::EngineConfig;
use aegis_control_core::engine::ControlPlane;
use aegis_control_core::infrastructure::probes::StaticHealthProbe;
use aegis_control_core::presentation::api::app;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::util::ServiceExt;

async fn test_app() -> Router {
    let mut config = EngineConfig::default();
    config.lifecycle.warm_up = Duration::ZERO;
    let engine = Arc::new(
        ControlPlane::build(config, Arc::new(StaticHealthProbe::new()))
            .await
            .expect("engine build"),
    );
    app(engine)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn module_payload(id: &str, status: &str) -> Value {
    json!({
        "id": id,
        "name": id,
        "type": "payment_processor",
        "version": "2.0.0",
        "status": status,
    })
}

#[tokio::test]
async fn test_register_and_fetch_module() {
    let app = test_app().await;

    let response = app
        .clone()
        .oneshot(post_json("/modules", module_payload("pay-a", "active")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app.clone().oneshot(get("/modules/pay-a")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["id"], "pay-a");
    assert_eq!(body["status"], "active");

    let response = app.oneshot(get("/modules/active/payment_processor")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_duplicate_registration_maps_to_conflict() {
    let app = test_app().await;

    let payload = module_payload("pay-a", "inactive");
    let response = app.clone().oneshot(post_json("/modules", payload.clone())).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app.oneshot(post_json("/modules", payload)).await.unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = body_json(response).await;
    assert_eq!(body["kind"], "duplicate_module");
}

#[tokio::test]
async fn test_unknown_module_maps_to_not_found() {
    let app = test_app().await;
    let response = app.oneshot(get("/modules/ghost")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["kind"], "not_found");
}

#[tokio::test]
async fn test_activation_with_missing_dependency_is_unprocessable() {
    let app = test_app().await;

    let mut payload = module_payload("trading", "inactive");
    payload["type"] = json!("trading_engine");
    payload["dependencies"] = json!(["market-data"]);
    let response = app.clone().oneshot(post_json("/modules", payload)).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app.oneshot(post_json("/modules/trading/activate", json!({}))).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(response).await;
    assert_eq!(body["kind"], "dependency_not_active");
}

#[tokio::test]
async fn test_swap_endpoint_moves_active_pointer() {
    let app = test_app().await;

    app.clone()
        .oneshot(post_json("/modules", module_payload("pay-a", "active")))
        .await
        .unwrap();
    app.clone()
        .oneshot(post_json("/modules", module_payload("pay-b", "inactive")))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(post_json("/modules/swap", json!({ "old": "pay-a", "new": "pay-b" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.oneshot(get("/modules/active/payment_processor")).await.unwrap();
    let body = body_json(response).await;
    assert_eq!(body["id"], "pay-b");
}

#[tokio::test]
async fn test_flag_create_and_evaluate() {
    let app = test_app().await;

    let response = app
        .clone()
        .oneshot(post_json(
            "/flags",
            json!({ "id": "new-checkout", "name": "New checkout", "rollout_percentage": 100 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .clone()
        .oneshot(get("/flags/new-checkout/evaluate?subject=user-1"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["enabled"], true);

    // a missing flag evaluates to false rather than erroring
    let response = app.oneshot(get("/flags/ghost/evaluate?subject=user-1")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["enabled"], false);
}

#[tokio::test]
async fn test_invalid_migration_strategy_is_unprocessable() {
    let app = test_app().await;

    app.clone()
        .oneshot(post_json("/modules", module_payload("pay-a", "active")))
        .await
        .unwrap();
    app.clone()
        .oneshot(post_json("/modules", module_payload("pay-b", "inactive")))
        .await
        .unwrap();

    let response = app
        .oneshot(post_json(
            "/migrations",
            json!({
                "name": "upgrade",
                "from_module": "pay-a",
                "to_module": "pay-b",
                "strategy": "teleport",
                "phases": [{ "name": "p", "duration": "1s", "rollout_percentage": 100 }],
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(response).await;
    assert_eq!(body["kind"], "invalid_strategy");
}

#[tokio::test]
async fn test_migration_execute_is_accepted_and_completes() {
    let app = test_app().await;

    app.clone()
        .oneshot(post_json("/modules", module_payload("pay-a", "active")))
        .await
        .unwrap();
    app.clone()
        .oneshot(post_json("/modules", module_payload("pay-b", "inactive")))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(post_json(
            "/migrations",
            json!({
                "name": "upgrade",
                "from_module": "pay-a",
                "to_module": "pay-b",
                "strategy": "big_bang",
                "phases": [{ "name": "switch", "duration": "0s", "rollout_percentage": 100 }],
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let plan = body_json(response).await;
    let plan_id = plan["id"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(post_json(&format!("/migrations/{}/execute", plan_id), json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    // the zero-duration big-bang completes almost immediately; poll the
    // plan record rather than sleeping a fixed interval
    let mut status = String::new();
    for _ in 0..50 {
        let response =
            app.clone().oneshot(get(&format!("/migrations/{}", plan_id))).await.unwrap();
        let body = body_json(response).await;
        status = body["status"].as_str().unwrap_or_default().to_string();
        if status == "completed" {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(status, "completed");

    let response = app.oneshot(get("/stats")).await.unwrap();
    let body = body_json(response).await;
    assert_eq!(body["migration_plans"], 1);
    assert_eq!(body["total_modules"], 2);
}
