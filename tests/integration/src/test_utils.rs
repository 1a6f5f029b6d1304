//! Fixtures shared by the end-to-end tests

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use binroute_api::config::{CredentialEntry, SecretString};
use binroute_api::webhooks::WebhookJob;
use binroute_api::{router, AppState, ServiceConfig};
use binroute_dispatch::model::{Availability, Collector, Organization, Role};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;
use tower::ServiceExt;

pub const QR_SECRET: &str = "integration-qr-secret-0123456789";

pub const ADMIN_TOKEN: &str = "tok-admin-north";
pub const FOREIGN_ADMIN_TOKEN: &str = "tok-admin-south";
pub const PLATFORM_TOKEN: &str = "tok-platform";
pub const COLLECTOR_TOKEN: &str = "tok-col-1";
pub const OTHER_COLLECTOR_TOKEN: &str = "tok-col-2";
pub const REPORTER_TOKEN: &str = "tok-reporter";

fn credential(token: &str, user_id: &str, role: Role, org: Option<&str>) -> CredentialEntry {
    CredentialEntry {
        token: SecretString::new(token),
        user_id: user_id.to_string(),
        role,
        organization_id: org.map(str::to_string),
    }
}

fn organization(id: &str, auto_assign: bool) -> Organization {
    Organization {
        organization_id: id.to_string(),
        name: format!("{} depot", id),
        auto_assign_enabled: auto_assign,
        auto_assign_radius_meters: 5_000.0,
        max_active_missions_per_collector: 2,
        webhooks: Vec::new(),
    }
}

fn collector(id: &str, org: &str) -> Collector {
    Collector {
        collector_id: id.to_string(),
        organization_id: org.to_string(),
        display_name: id.to_string(),
        vehicle_id: Some(format!("truck-{}", id)),
        availability: Availability::default(),
    }
}

/// Two organizations (`north`, `south`), two collectors in `north`
pub fn test_config(auto_assign: bool) -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.qr_secret = SecretString::new(QR_SECRET);
    config.credentials = vec![
        credential(ADMIN_TOKEN, "admin-north", Role::OrgAdmin, Some("north")),
        credential(FOREIGN_ADMIN_TOKEN, "admin-south", Role::OrgAdmin, Some("south")),
        credential(PLATFORM_TOKEN, "root", Role::PlatformAdmin, None),
        credential(COLLECTOR_TOKEN, "col-1", Role::Collector, Some("north")),
        credential(OTHER_COLLECTOR_TOKEN, "col-2", Role::Collector, Some("north")),
        credential(REPORTER_TOKEN, "reporter-1", Role::Reporter, None),
    ];
    config.organizations = vec![organization("north", auto_assign), organization("south", true)];
    config.collectors = vec![collector("col-1", "north"), collector("col-2", "north")];
    config
}

/// Router plus the pieces tests inspect directly
pub struct TestApp {
    pub state: Arc<AppState>,
    pub router: Router,
    pub queue: mpsc::Receiver<WebhookJob>,
}

impl TestApp {
    pub fn new(config: ServiceConfig) -> Self {
        let (state, queue) = AppState::new(config).expect("valid test config");
        let state = Arc::new(state);
        Self {
            router: router(state.clone()),
            state,
            queue,
        }
    }

    /// Send one request and decode the JSON response body (`Null` when empty)
    pub async fn call(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let (status, _, body) = self.call_raw(method, uri, token, body).await;
        (status, body)
    }

    /// Like [`TestApp::call`], also returning the headers
    pub async fn call_raw(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, axum::http::HeaderMap, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(json) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => request.body(Body::empty()),
        }
        .expect("valid request");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("readable body");
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, headers, value)
    }
}
