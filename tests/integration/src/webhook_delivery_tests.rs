//! Webhook delivery against a local subscriber

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode};
use axum::routing::post;
use axum::Router;
use binroute_api::webhooks::{
    build_client, run_worker, DeliveryOutcome, DeliveryRecord, EVENT_HEADER, SIGNATURE_HEADER,
};
use binroute_crypto::sign_webhook_body;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use crate::test_utils::*;

const HOOK_SECRET: &str = "whsec-integration";

#[derive(Clone)]
struct Subscriber {
    answer: StatusCode,
    seen: Arc<Mutex<Vec<(HeaderMap, Bytes)>>>,
}

async fn capture(State(sub): State<Subscriber>, headers: HeaderMap, body: Bytes) -> StatusCode {
    sub.seen.lock().push((headers, body));
    sub.answer
}

/// Start a subscriber answering `answer`; returns its hook URL
async fn spawn_subscriber(answer: StatusCode) -> (String, Subscriber) {
    let sub = Subscriber {
        answer,
        seen: Arc::new(Mutex::new(Vec::new())),
    };
    let app = Router::new()
        .route("/hook", post(capture))
        .with_state(sub.clone());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}/hook", addr), sub)
}

/// Subscribe `north` to mission creation and start the delivery worker
async fn wire(app: &mut TestApp, url: &str) {
    let (status, body) = app
        .call(
            Method::POST,
            "/business/webhooks",
            Some(ADMIN_TOKEN),
            Some(json!({ "url": url, "events": ["mission.created"], "secret": HOOK_SECRET })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);

    let (_, placeholder) = mpsc::channel(1);
    let queue = std::mem::replace(&mut app.queue, placeholder);
    let client = build_client(2_000).unwrap();
    tokio::spawn(run_worker(queue, client, app.state.deliveries.clone()));
}

async fn create_mission(app: &TestApp) -> String {
    let (_, collection) = app
        .call(
            Method::POST,
            "/collections",
            Some(REPORTER_TOKEN),
            Some(json!({
                "organizationId": "north",
                "location": { "latitude": 52.52, "longitude": 13.40 },
                "wasteType": "mixed",
                "quantityKg": 12.0,
                "urgency": "medium"
            })),
        )
        .await;
    let (status, mission) = app
        .call(
            Method::POST,
            "/missions",
            Some(ADMIN_TOKEN),
            Some(json!({
                "collectionId": collection["collectionId"],
                "organizationId": "north",
                "collectorId": "col-1"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", mission);
    mission["missionId"].as_str().unwrap().to_string()
}

async fn wait_for_delivery(app: &TestApp) -> DeliveryRecord {
    for _ in 0..200 {
        if let Some(record) = app.state.deliveries.recent(Some("north")).into_iter().next() {
            return record;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("no delivery recorded");
}

#[tokio::test]
async fn test_delivery_is_signed_and_recorded() {
    let (url, sub) = spawn_subscriber(StatusCode::NO_CONTENT).await;
    let mut app = TestApp::new(test_config(false));
    wire(&mut app, &url).await;
    let mission_id = create_mission(&app).await;

    let record = wait_for_delivery(&app).await;
    assert_eq!(record.outcome, DeliveryOutcome::Delivered);
    assert_eq!(record.http_status, Some(204));
    assert_eq!(record.event_type, "mission.created");

    let seen = sub.seen.lock().clone();
    assert_eq!(seen.len(), 1, "only the subscribed event is delivered");
    let (headers, body) = &seen[0];
    assert_eq!(
        headers[SIGNATURE_HEADER].to_str().unwrap(),
        sign_webhook_body(HOOK_SECRET.as_bytes(), body)
    );
    assert_eq!(headers[EVENT_HEADER].to_str().unwrap(), "mission.created");

    let event: Value = serde_json::from_slice(body).unwrap();
    assert_eq!(event["missionId"], mission_id.as_str());
    assert_eq!(event["organizationId"], "north");
    assert_eq!(event["eventId"], record.event_id.as_str());

    // The delivery log is readable over the API, scoped to the caller's organization
    let (status, log) = app
        .call(Method::GET, "/business/webhooks/deliveries", Some(ADMIN_TOKEN), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(log[0]["outcome"], "delivered");

    let (_, foreign) = app
        .call(Method::GET, "/business/webhooks/deliveries", Some(FOREIGN_ADMIN_TOKEN), None)
        .await;
    assert_eq!(foreign, json!([]));
}

#[tokio::test]
async fn test_subscriber_errors_are_recorded_as_failures() {
    let (url, sub) = spawn_subscriber(StatusCode::INTERNAL_SERVER_ERROR).await;
    let mut app = TestApp::new(test_config(false));
    wire(&mut app, &url).await;

    // The mission itself is unaffected by the failing subscriber
    let mission_id = create_mission(&app).await;
    let (status, _) = app
        .call(Method::GET, &format!("/missions/{}", mission_id), Some(ADMIN_TOKEN), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let record = wait_for_delivery(&app).await;
    assert_eq!(record.outcome, DeliveryOutcome::Failed);
    assert_eq!(record.http_status, Some(500));
    assert!(record.error.is_some());
    assert_eq!(sub.seen.lock().len(), 1);
}
