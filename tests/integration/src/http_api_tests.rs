//! REST surface tests driven through the router with `oneshot`

use axum::http::{header, Method, StatusCode};
use serde_json::{json, Value};

use crate::test_utils::*;

fn collection_body(org: &str) -> Value {
    json!({
        "organizationId": org,
        "location": { "latitude": 52.52, "longitude": 13.40 },
        "wasteType": "bulky",
        "quantityKg": 30.0,
        "urgency": "high"
    })
}

async fn report(app: &TestApp) -> String {
    let (status, body) = app
        .call(Method::POST, "/collections", Some(REPORTER_TOKEN), Some(collection_body("north")))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["status"], "pending");
    body["collectionId"].as_str().unwrap().to_string()
}

async fn create_mission(app: &TestApp, collection_id: &str, collector: Option<&str>) -> Value {
    let mut request = json!({ "collectionId": collection_id, "organizationId": "north" });
    if let Some(collector) = collector {
        request["collectorId"] = json!(collector);
    }
    let (status, body) = app
        .call(Method::POST, "/missions", Some(ADMIN_TOKEN), Some(request))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    body
}

fn proof_body(token: &str) -> Value {
    json!({
        "qrToken": token,
        "photoRef": "s3://proofs/photo.jpg",
        "location": { "latitude": 52.5201, "longitude": 13.4001 }
    })
}

async fn go_on_duty(app: &TestApp, token: &str) {
    let (status, _) = app
        .call(Method::PATCH, "/collectors/duty", Some(token), Some(json!({ "onDuty": true })))
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app
        .call(
            Method::POST,
            "/collectors/heartbeat",
            Some(token),
            Some(json!({ "coordinates": [13.40, 52.52] })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_health_is_public() {
    let app = TestApp::new(test_config(false));
    let (status, body) = app.call(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_requests_need_a_known_bearer_token() {
    let app = TestApp::new(test_config(false));
    let (status, body) = app.call(Method::GET, "/missions", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "unauthenticated");

    let (status, _) = app.call(Method::GET, "/missions", Some("tok-unknown"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_mission_lifecycle_end_to_end() {
    let app = TestApp::new(test_config(false));
    let collection_id = report(&app).await;
    let mission = create_mission(&app, &collection_id, Some("col-1")).await;
    assert_eq!(mission["status"], "assigned");
    assert_eq!(mission["collectorId"], "col-1");

    let id = mission["missionId"].as_str().unwrap().to_string();
    let token = mission["qrToken"].as_str().unwrap().to_string();

    let (status, body) = app
        .call(
            Method::POST,
            &format!("/missions/{}/proofs/before", id),
            Some(COLLECTOR_TOKEN),
            Some(proof_body(&token)),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["proofs"]["before"]["verifiedBy"], "col-1");

    let (status, body) = app
        .call(
            Method::PATCH,
            &format!("/missions/{}/status", id),
            Some(COLLECTOR_TOKEN),
            Some(json!({ "status": "in-progress" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);

    // Completion needs the after checkpoint first
    let (status, body) = app
        .call(
            Method::PATCH,
            &format!("/missions/{}/status", id),
            Some(COLLECTOR_TOKEN),
            Some(json!({ "status": "completed" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "invalid_transition");
    assert_eq!(body["details"]["current"], "in-progress");
    assert_eq!(body["details"]["attempted"], "completed");

    let (status, _) = app
        .call(
            Method::POST,
            &format!("/missions/{}/proofs/after", id),
            Some(COLLECTOR_TOKEN),
            Some(proof_body(&token)),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .call(
            Method::PATCH,
            &format!("/missions/{}/status", id),
            Some(COLLECTOR_TOKEN),
            Some(json!({ "status": "completed" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "completed");
    assert!(body["timestamp"]["completed"].is_u64());

    let (_, collection) = app
        .call(
            Method::GET,
            &format!("/collections/{}", collection_id),
            Some(REPORTER_TOKEN),
            None,
        )
        .await;
    assert_eq!(collection["status"], "completed");

    // Terminal missions accept nothing further
    let (status, _) = app
        .call(
            Method::PATCH,
            &format!("/missions/{}/status", id),
            Some(ADMIN_TOKEN),
            Some(json!({ "status": "cancelled" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_block_requires_reason_and_description_for_other() {
    let app = TestApp::new(test_config(false));
    let collection_id = report(&app).await;
    let mission = create_mission(&app, &collection_id, Some("col-1")).await;
    let id = mission["missionId"].as_str().unwrap();
    let uri = format!("/missions/{}/status", id);

    app.call(Method::PATCH, &uri, Some(COLLECTOR_TOKEN), Some(json!({ "status": "in-progress" })))
        .await;

    let (status, body) = app
        .call(
            Method::PATCH,
            &uri,
            Some(COLLECTOR_TOKEN),
            Some(json!({ "status": "blocked", "blockReason": { "reason": "other", "description": "  " } })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"]["field"], "blockReason.description");

    let (status, body) = app
        .call(
            Method::PATCH,
            &uri,
            Some(COLLECTOR_TOKEN),
            Some(json!({ "status": "blocked", "blockReason": { "reason": "access-denied", "description": "gate locked" } })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["blockReason"]["reason"], "access-denied");

    let (status, body) = app
        .call(Method::PATCH, &uri, Some(COLLECTOR_TOKEN), Some(json!({ "status": "in-progress" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["blockReason"].is_null());

    // Once cancelled, a block without a reason is a transition conflict
    let (status, _) = app
        .call(Method::PATCH, &uri, Some(ADMIN_TOKEN), Some(json!({ "status": "cancelled" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = app
        .call(Method::PATCH, &uri, Some(ADMIN_TOKEN), Some(json!({ "status": "blocked" })))
        .await;
    assert_eq!(status, StatusCode::CONFLICT, "{}", body);
}

#[tokio::test]
async fn test_cross_tenant_and_role_denials() {
    let app = TestApp::new(test_config(false));
    let collection_id = report(&app).await;
    let mission = create_mission(&app, &collection_id, Some("col-1")).await;
    let id = mission["missionId"].as_str().unwrap();
    let uri = format!("/missions/{}", id);

    let (status, body) = app.call(Method::GET, &uri, Some(FOREIGN_ADMIN_TOKEN), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not_found");

    let (status, _) = app.call(Method::GET, &uri, Some(OTHER_COLLECTOR_TOKEN), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.call(Method::GET, &uri, Some(PLATFORM_TOKEN), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .call(
            Method::PATCH,
            &format!("/missions/{}/assign", id),
            Some(REPORTER_TOKEN),
            Some(json!({ "collectorId": "col-2" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "access denied");

    let (_, listed) = app.call(Method::GET, "/missions", Some(FOREIGN_ADMIN_TOKEN), None).await;
    assert_eq!(listed, json!([]));
}

#[tokio::test]
async fn test_tampered_and_foreign_qr_codes_are_rejected() {
    let app = TestApp::new(test_config(false));
    let first = create_mission(&app, &report(&app).await, Some("col-1")).await;
    let second = create_mission(&app, &report(&app).await, Some("col-1")).await;
    let id = first["missionId"].as_str().unwrap();
    let uri = format!("/missions/{}/proofs/before", id);

    let token = first["qrToken"].as_str().unwrap();
    let mut tampered: Vec<char> = token.chars().collect();
    tampered[0] = if tampered[0] == 'e' { 'f' } else { 'e' };
    let tampered: String = tampered.into_iter().collect();

    let (status, body) = app
        .call(Method::POST, &uri, Some(COLLECTOR_TOKEN), Some(proof_body(&tampered)))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "tamper");

    let other_token = second["qrToken"].as_str().unwrap();
    let (status, body) = app
        .call(Method::POST, &uri, Some(COLLECTOR_TOKEN), Some(proof_body(other_token)))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "tamper");

    let (status, body) = app
        .call(Method::POST, &format!("/missions/{}/qr", id), Some(COLLECTOR_TOKEN), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(!body["qrToken"].as_str().unwrap_or_default().is_empty());
}

#[tokio::test]
async fn test_auto_assignment_respects_organization_switch() {
    let app = TestApp::new(test_config(false));
    go_on_duty(&app, COLLECTOR_TOKEN).await;

    let mission = create_mission(&app, &report(&app).await, None).await;
    assert_eq!(mission["status"], "planned");

    let id = mission["missionId"].as_str().unwrap();
    let (status, body) = app
        .call(Method::POST, &format!("/missions/{}/auto-assign", id), Some(ADMIN_TOKEN), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["assigned"], false);
    assert_eq!(body["deferralReason"], "auto-assign-disabled");
    assert_eq!(body["mission"]["status"], "planned");
}

#[tokio::test]
async fn test_auto_assignment_picks_on_duty_collector() {
    let app = TestApp::new(test_config(true));
    go_on_duty(&app, OTHER_COLLECTOR_TOKEN).await;

    let mission = create_mission(&app, &report(&app).await, None).await;
    assert_eq!(mission["status"], "assigned");
    assert_eq!(mission["collectorId"], "col-2");

    let (_, listed) = app
        .call(Method::GET, "/missions?status=assigned", Some(ADMIN_TOKEN), None)
        .await;
    assert_eq!(listed.as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn test_manual_reassignment_is_audited() {
    let app = TestApp::new(test_config(false));
    let mission = create_mission(&app, &report(&app).await, Some("col-1")).await;
    let id = mission["missionId"].as_str().unwrap();

    let (status, body) = app
        .call(
            Method::PATCH,
            &format!("/missions/{}/assign", id),
            Some(ADMIN_TOKEN),
            Some(json!({ "collectorId": "col-2", "reason": "vehicle swap" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["collectorId"], "col-2");
    assert_eq!(body["reassignmentHistory"][0]["fromCollectorId"], "col-1");
    assert_eq!(body["reassignmentHistory"][0]["reason"], "vehicle swap");

    let (status, logs) = app.call(Method::GET, "/audit-logs?limit=5", Some(ADMIN_TOKEN), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(logs[0]["action"], "mission.reassigned");
    assert!(logs.as_array().map_or(0, Vec::len) <= 5);

    let (status, _) = app.call(Method::GET, "/audit-logs", Some(COLLECTOR_TOKEN), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_heartbeat_is_throttled() {
    let mut config = test_config(false);
    config.rate_limit.max_requests = 2;
    let app = TestApp::new(config);
    let beat = || Some(json!({ "coordinates": [13.40, 52.52] }));

    for _ in 0..2 {
        let (status, _) = app
            .call(Method::POST, "/collectors/heartbeat", Some(COLLECTOR_TOKEN), beat())
            .await;
        assert_eq!(status, StatusCode::OK);
    }
    let (status, headers, body) = app
        .call_raw(Method::POST, "/collectors/heartbeat", Some(COLLECTOR_TOKEN), beat())
        .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["code"], "rate_limited");
    assert!(headers.contains_key(header::RETRY_AFTER));

    // Other collectors have their own budget
    let (status, _) = app
        .call(Method::POST, "/collectors/heartbeat", Some(OTHER_COLLECTOR_TOKEN), beat())
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_bad_coordinates_and_bodies_are_validation_errors() {
    let app = TestApp::new(test_config(false));
    let (status, body) = app
        .call(
            Method::POST,
            "/collectors/heartbeat",
            Some(COLLECTOR_TOKEN),
            Some(json!({ "coordinates": [200.0, 10.0] })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"]["field"], "coordinates");

    let (status, body) = app
        .call(Method::POST, "/missions", Some(ADMIN_TOKEN), Some(json!("not an object")))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "bad_request");
}

#[tokio::test]
async fn test_webhook_subscription_crud() {
    let app = TestApp::new(test_config(false));
    let hook = json!({
        "url": "https://hooks.example.com/binroute",
        "events": ["mission.created", "mission.status_changed"],
        "secret": "whsec-12345678"
    });

    let (status, body) = app
        .call(Method::POST, "/business/webhooks", Some(ADMIN_TOKEN), Some(hook.clone()))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body.as_array().map(Vec::len), Some(1));
    assert_eq!(body[0]["enabled"], true);
    assert!(body[0].get("secret").is_none(), "secret echoed: {}", body);

    let mut bad = hook.clone();
    bad["url"] = json!("ftp://nope");
    let (status, body) = app
        .call(Method::POST, "/business/webhooks", Some(ADMIN_TOKEN), Some(bad))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"]["field"], "url");

    let (status, _) = app
        .call(Method::PUT, "/business/webhooks/4", Some(ADMIN_TOKEN), Some(hook.clone()))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.call(Method::GET, "/business/webhooks", Some(COLLECTOR_TOKEN), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Platform admins name the organization explicitly
    let (status, body) = app
        .call(Method::GET, "/business/webhooks?organizationId=north", Some(PLATFORM_TOKEN), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().map(Vec::len), Some(1));
    assert!(!body.to_string().contains("whsec-12345678"));

    let (status, body) = app
        .call(Method::DELETE, "/business/webhooks/0", Some(ADMIN_TOKEN), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn test_route_and_confirmation() {
    let app = TestApp::new(test_config(false));
    let first = report(&app).await;
    let second = report(&app).await;
    let stray = report(&app).await;
    create_mission(&app, &first, Some("col-1")).await;
    create_mission(&app, &second, Some("col-1")).await;

    // A collection with no mission for this collector cannot be routed
    let (status, body) = app
        .call(
            Method::POST,
            "/missions/optimize-route",
            Some(COLLECTOR_TOKEN),
            Some(json!({ "collectorId": "col-1", "collectionIds": [first, stray] })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND, "{}", body);

    let (status, route) = app
        .call(
            Method::POST,
            "/missions/optimize-route",
            Some(COLLECTOR_TOKEN),
            Some(json!({ "collectorId": "col-1", "collectionIds": [first, second] })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", route);
    assert_eq!(route["stops"].as_array().map(Vec::len), Some(2));
    assert_eq!(route["stops"][0]["sequence"], 1);

    let (status, code) = app
        .call(
            Method::GET,
            &format!("/collections/{}/confirmation-qr", first),
            Some(REPORTER_TOKEN),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let token = code["token"].as_str().unwrap();

    let (status, body) = app
        .call(
            Method::POST,
            "/collections/confirm",
            Some(COLLECTOR_TOKEN),
            Some(json!({ "token": token })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["collectionId"], first.as_str());
}
