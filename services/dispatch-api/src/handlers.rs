use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use binroute_core::{now_ms, GeoPoint};
use binroute_dispatch::model::{
    AuditLogEntry, Collection, Collector, Mission, NewCollection, ProofStage, Role,
    WebhookSubscription,
};
use binroute_dispatch::{
    AssignRequest, AssignmentOutcome, ConfirmationCode, CreateMission, DeferralReason,
    MissionQuery, OptimizedRoute, ProofSubmission, RouteRequest, StatusUpdate,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

use crate::auth::Authenticated;
use crate::error::{ApiError, ApiJson};
use crate::rate_limit::RateDecision;
use crate::state::AppState;
use crate::webhooks::DeliveryRecord;

type ApiResult<T> = Result<Json<T>, ApiError>;

/// Default and maximum page size for audit reads
const AUDIT_DEFAULT_LIMIT: usize = 100;
const AUDIT_MAX_LIMIT: usize = 1_000;

pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "binroute-api",
        "timestamp": Utc::now().to_rfc3339()
    }))
}

// ----- collections -----

pub async fn create_collection(
    State(state): State<Arc<AppState>>,
    Authenticated(caller): Authenticated,
    ApiJson(input): ApiJson<NewCollection>,
) -> Result<(StatusCode, Json<Collection>), ApiError> {
    let collection = state.service.create_collection(&caller, input, now_ms())?;
    Ok((StatusCode::CREATED, Json(collection)))
}

pub async fn get_collection(
    State(state): State<Arc<AppState>>,
    Authenticated(caller): Authenticated,
    Path(collection_id): Path<String>,
) -> ApiResult<Collection> {
    Ok(Json(state.service.get_collection(&caller, &collection_id)?))
}

pub async fn confirmation_qr(
    State(state): State<Arc<AppState>>,
    Authenticated(caller): Authenticated,
    Path(collection_id): Path<String>,
) -> ApiResult<ConfirmationCode> {
    Ok(Json(
        state
            .service
            .confirmation_code(&caller, &collection_id, now_ms())?,
    ))
}

#[derive(Debug, Deserialize)]
pub struct ConfirmBody {
    pub token: String,
}

pub async fn confirm_collection(
    State(state): State<Arc<AppState>>,
    Authenticated(caller): Authenticated,
    ApiJson(body): ApiJson<ConfirmBody>,
) -> ApiResult<Collection> {
    Ok(Json(
        state
            .service
            .confirm_collection(&caller, &body.token, now_ms())?,
    ))
}

// ----- missions -----

pub async fn create_mission(
    State(state): State<Arc<AppState>>,
    Authenticated(caller): Authenticated,
    ApiJson(request): ApiJson<CreateMission>,
) -> Result<(StatusCode, Json<Mission>), ApiError> {
    let mission = state.service.create_mission(&caller, request, now_ms())?;
    Ok((StatusCode::CREATED, Json(mission)))
}

pub async fn list_missions(
    State(state): State<Arc<AppState>>,
    Authenticated(caller): Authenticated,
    Query(query): Query<MissionQuery>,
) -> ApiResult<Vec<Mission>> {
    Ok(Json(state.service.list_missions(&caller, query)?))
}

pub async fn get_mission(
    State(state): State<Arc<AppState>>,
    Authenticated(caller): Authenticated,
    Path(mission_id): Path<String>,
) -> ApiResult<Mission> {
    Ok(Json(state.service.get_mission(&caller, &mission_id)?))
}

pub async fn update_status(
    State(state): State<Arc<AppState>>,
    Authenticated(caller): Authenticated,
    Path(mission_id): Path<String>,
    ApiJson(update): ApiJson<StatusUpdate>,
) -> ApiResult<Mission> {
    Ok(Json(
        state
            .service
            .update_status(&caller, &mission_id, update, now_ms())?,
    ))
}

pub async fn assign_mission(
    State(state): State<Arc<AppState>>,
    Authenticated(caller): Authenticated,
    Path(mission_id): Path<String>,
    ApiJson(request): ApiJson<AssignRequest>,
) -> ApiResult<Mission> {
    Ok(Json(
        state
            .service
            .assign_mission(&caller, &mission_id, request, now_ms())?,
    ))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoAssignResponse {
    pub assigned: bool,
    pub deferral_reason: Option<DeferralReason>,
    pub mission: Mission,
}

pub async fn auto_assign(
    State(state): State<Arc<AppState>>,
    Authenticated(caller): Authenticated,
    Path(mission_id): Path<String>,
) -> ApiResult<AutoAssignResponse> {
    let response = match state.service.auto_assign(&caller, &mission_id, now_ms())? {
        AssignmentOutcome::Assigned { mission, .. } => AutoAssignResponse {
            assigned: true,
            deferral_reason: None,
            mission,
        },
        AssignmentOutcome::Deferred { mission, reason } => AutoAssignResponse {
            assigned: false,
            deferral_reason: Some(reason),
            mission,
        },
    };
    Ok(Json(response))
}

pub async fn submit_proof(
    State(state): State<Arc<AppState>>,
    Authenticated(caller): Authenticated,
    Path((mission_id, stage)): Path<(String, ProofStage)>,
    ApiJson(submission): ApiJson<ProofSubmission>,
) -> ApiResult<Mission> {
    Ok(Json(state.service.submit_proof(
        &caller,
        &mission_id,
        stage,
        submission,
        now_ms(),
    )?))
}

pub async fn reissue_qr(
    State(state): State<Arc<AppState>>,
    Authenticated(caller): Authenticated,
    Path(mission_id): Path<String>,
) -> ApiResult<Mission> {
    Ok(Json(
        state.service.reissue_qr(&caller, &mission_id, now_ms())?,
    ))
}

pub async fn optimize_route(
    State(state): State<Arc<AppState>>,
    Authenticated(caller): Authenticated,
    ApiJson(request): ApiJson<RouteRequest>,
) -> ApiResult<OptimizedRoute> {
    Ok(Json(state.service.optimize_route(&caller, request)?))
}

// ----- collectors -----

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DutyBody {
    pub on_duty: bool,
    /// Admins toggle another collector; collectors default to themselves
    #[serde(default)]
    pub collector_id: Option<String>,
}

pub async fn set_duty(
    State(state): State<Arc<AppState>>,
    Authenticated(caller): Authenticated,
    ApiJson(body): ApiJson<DutyBody>,
) -> ApiResult<Collector> {
    let collector_id = body.collector_id.unwrap_or_else(|| caller.user_id.clone());
    Ok(Json(state.service.set_duty(
        &caller,
        &collector_id,
        body.on_duty,
        now_ms(),
    )?))
}

#[derive(Debug, Deserialize)]
pub struct HeartbeatBody {
    /// GeoJSON order: `[longitude, latitude]`
    pub coordinates: [f64; 2],
}

pub async fn heartbeat(
    State(state): State<Arc<AppState>>,
    Authenticated(caller): Authenticated,
    ApiJson(body): ApiJson<HeartbeatBody>,
) -> ApiResult<Collector> {
    let now = now_ms();
    if let RateDecision::Limited { retry_after_ms } =
        state.heartbeat_limiter.check(&caller.user_id, now)
    {
        debug!(user_id = %caller.user_id, retry_after_ms, "heartbeat throttled");
        return Err(ApiError::RateLimited {
            retry_after_secs: (retry_after_ms + 999) / 1000,
        });
    }
    let [longitude, latitude] = body.coordinates;
    let location = GeoPoint {
        latitude,
        longitude,
    };
    Ok(Json(state.service.heartbeat(&caller, location, now)?))
}

// ----- webhooks -----

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrgQuery {
    /// Required for platform admins; ignored for org admins
    #[serde(default)]
    pub organization_id: Option<String>,
}

pub async fn list_webhooks(
    State(state): State<Arc<AppState>>,
    Authenticated(caller): Authenticated,
    Query(query): Query<OrgQuery>,
) -> ApiResult<Vec<WebhookSubscription>> {
    Ok(Json(
        state
            .service
            .list_webhooks(&caller, query.organization_id.as_deref())?,
    ))
}

pub async fn add_webhook(
    State(state): State<Arc<AppState>>,
    Authenticated(caller): Authenticated,
    Query(query): Query<OrgQuery>,
    ApiJson(hook): ApiJson<WebhookSubscription>,
) -> Result<(StatusCode, Json<Vec<WebhookSubscription>>), ApiError> {
    let hooks = state.service.add_webhook(
        &caller,
        query.organization_id.as_deref(),
        hook,
        now_ms(),
    )?;
    Ok((StatusCode::CREATED, Json(hooks)))
}

pub async fn replace_webhook(
    State(state): State<Arc<AppState>>,
    Authenticated(caller): Authenticated,
    Path(index): Path<usize>,
    Query(query): Query<OrgQuery>,
    ApiJson(hook): ApiJson<WebhookSubscription>,
) -> ApiResult<Vec<WebhookSubscription>> {
    Ok(Json(state.service.replace_webhook(
        &caller,
        query.organization_id.as_deref(),
        index,
        hook,
        now_ms(),
    )?))
}

pub async fn delete_webhook(
    State(state): State<Arc<AppState>>,
    Authenticated(caller): Authenticated,
    Path(index): Path<usize>,
    Query(query): Query<OrgQuery>,
) -> ApiResult<Vec<WebhookSubscription>> {
    Ok(Json(state.service.delete_webhook(
        &caller,
        query.organization_id.as_deref(),
        index,
        now_ms(),
    )?))
}

pub async fn webhook_deliveries(
    State(state): State<Arc<AppState>>,
    Authenticated(caller): Authenticated,
    Query(query): Query<OrgQuery>,
) -> ApiResult<Vec<DeliveryRecord>> {
    // Same access rule as reading the subscriptions themselves
    state
        .service
        .list_webhooks(&caller, query.organization_id.as_deref())?;
    let organization_id = match caller.role {
        Role::PlatformAdmin => query.organization_id,
        _ => caller.organization_id,
    };
    Ok(Json(state.deliveries.recent(organization_id.as_deref())))
}

// ----- audit -----

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditQuery {
    #[serde(default)]
    pub organization_id: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
}

pub async fn audit_logs(
    State(state): State<Arc<AppState>>,
    Authenticated(caller): Authenticated,
    Query(query): Query<AuditQuery>,
) -> ApiResult<Vec<AuditLogEntry>> {
    let limit = query
        .limit
        .unwrap_or(AUDIT_DEFAULT_LIMIT)
        .clamp(1, AUDIT_MAX_LIMIT);
    Ok(Json(state.service.audit_logs(
        &caller,
        query.organization_id.as_deref(),
        limit,
    )?))
}
