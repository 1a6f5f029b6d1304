//! Binroute dispatch API
//!
//! axum REST surface over [`binroute_dispatch::DispatchService`], with static
//! bearer credentials, heartbeat throttling and a background webhook worker.

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod rate_limit;
pub mod state;
pub mod webhooks;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, patch, post, put};
use axum::Router;
use std::sync::Arc;
use tower::ServiceBuilder;

pub use config::ServiceConfig;
pub use state::AppState;

/// Build the HTTP router
pub fn router(state: Arc<AppState>) -> Router {
    let body_limit = state.config.server.body_limit_bytes;

    Router::new()
        .route("/health", get(handlers::health))
        // collections
        .route("/collections", post(handlers::create_collection))
        .route("/collections/confirm", post(handlers::confirm_collection))
        .route("/collections/:id", get(handlers::get_collection))
        .route(
            "/collections/:id/confirmation-qr",
            get(handlers::confirmation_qr),
        )
        // missions
        .route(
            "/missions",
            post(handlers::create_mission).get(handlers::list_missions),
        )
        .route("/missions/optimize-route", post(handlers::optimize_route))
        .route("/missions/:id", get(handlers::get_mission))
        .route("/missions/:id/status", patch(handlers::update_status))
        .route("/missions/:id/assign", patch(handlers::assign_mission))
        .route("/missions/:id/auto-assign", post(handlers::auto_assign))
        .route("/missions/:id/proofs/:stage", post(handlers::submit_proof))
        .route("/missions/:id/qr", post(handlers::reissue_qr))
        // collectors
        .route("/collectors/duty", patch(handlers::set_duty))
        .route("/collectors/heartbeat", post(handlers::heartbeat))
        // webhooks
        .route(
            "/business/webhooks",
            get(handlers::list_webhooks).post(handlers::add_webhook),
        )
        .route(
            "/business/webhooks/deliveries",
            get(handlers::webhook_deliveries),
        )
        .route(
            "/business/webhooks/:index",
            put(handlers::replace_webhook).delete(handlers::delete_webhook),
        )
        .route("/audit-logs", get(handlers::audit_logs))
        .layer(ServiceBuilder::new().layer(DefaultBodyLimit::max(body_limit)))
        .with_state(state)
}
