//! HTTP error mapping
//!
//! Bodies are JSON `{ error, code, details? }`. Access denials never say why;
//! storage failures never say what.

use axum::async_trait;
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Request};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use binroute_dispatch::{DispatchError, ProofError};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// Missing or unknown bearer credential
    #[error("authentication required")]
    Unauthenticated,

    /// Body or query could not be decoded
    #[error("malformed request: {0}")]
    BadRequest(String),

    #[error("rate limit exceeded")]
    RateLimited { retry_after_secs: u64 },
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Dispatch(e) => match e {
                DispatchError::Validation { .. } => StatusCode::BAD_REQUEST,
                DispatchError::Unauthorized => StatusCode::FORBIDDEN,
                DispatchError::NotFound { .. } => StatusCode::NOT_FOUND,
                DispatchError::InvalidTransition { .. }
                | DispatchError::ConcurrencyConflict { .. }
                | DispatchError::CollectorAtCapacity { .. } => StatusCode::CONFLICT,
                DispatchError::Proof(_) => StatusCode::UNPROCESSABLE_ENTITY,
                DispatchError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Dispatch(e) => e.code(),
            ApiError::Unauthenticated => "unauthenticated",
            ApiError::BadRequest(_) => "bad_request",
            ApiError::RateLimited { .. } => "rate_limited",
        }
    }

    fn body(&self) -> Value {
        let (message, details) = match self {
            ApiError::Dispatch(DispatchError::Validation { field, reason }) => (
                self.to_string(),
                Some(json!({ "field": field, "reason": reason })),
            ),
            ApiError::Dispatch(DispatchError::InvalidTransition {
                current,
                attempted,
                reason,
            }) => (
                self.to_string(),
                Some(json!({ "current": current, "attempted": attempted, "reason": reason })),
            ),
            ApiError::Dispatch(DispatchError::Proof(ProofError::Expired { issued_at, now })) => (
                "QR code expired, request a new one".to_string(),
                Some(json!({ "issuedAt": issued_at, "now": now })),
            ),
            ApiError::Dispatch(DispatchError::Proof(ProofError::Tamper)) => {
                ("QR code is invalid".to_string(), None)
            }
            ApiError::Dispatch(DispatchError::Unauthorized) => ("access denied".to_string(), None),
            ApiError::Dispatch(DispatchError::Storage(_)) => {
                ("internal server error".to_string(), None)
            }
            other => (other.to_string(), None),
        };
        let mut body = json!({ "error": message, "code": self.code() });
        if let Some(details) = details {
            body["details"] = details;
        }
        body
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Dispatch(DispatchError::Storage(msg)) = &self {
            error!(error = %msg, "storage failure");
        }
        let mut response = (self.status_code(), Json(self.body())).into_response();
        if let ApiError::RateLimited { retry_after_secs } = self {
            if let Ok(value) = HeaderValue::from_str(&retry_after_secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

/// `Json` whose rejections use the service error body
#[derive(Debug, Clone)]
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ApiJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
        Ok(Self(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use binroute_dispatch::model::MissionStatus;

    #[test]
    fn test_status_codes() {
        let cases = [
            (DispatchError::validation("x", "bad"), StatusCode::BAD_REQUEST),
            (DispatchError::Unauthorized, StatusCode::FORBIDDEN),
            (DispatchError::NotFound { entity: "mission" }, StatusCode::NOT_FOUND),
            (
                DispatchError::invalid_transition(MissionStatus::Completed, MissionStatus::Blocked),
                StatusCode::CONFLICT,
            ),
            (
                DispatchError::CollectorAtCapacity {
                    collector_id: "c".to_string(),
                    limit: 1,
                },
                StatusCode::CONFLICT,
            ),
            (DispatchError::Proof(ProofError::Tamper), StatusCode::UNPROCESSABLE_ENTITY),
            (DispatchError::Storage("disk".to_string()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status_code(), status);
        }
        assert_eq!(ApiError::Unauthenticated.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_bodies_do_not_leak() {
        let body = ApiError::from(DispatchError::Storage("secret table".to_string())).body();
        assert!(!body.to_string().contains("secret table"));
        let body = ApiError::from(DispatchError::Unauthorized).body();
        assert_eq!(body["error"], "access denied");
    }

    #[test]
    fn test_transition_details() {
        let body = ApiError::from(DispatchError::guard_failed(
            MissionStatus::InProgress,
            MissionStatus::Completed,
            "an after proof checkpoint is required",
        ))
        .body();
        assert_eq!(body["code"], "invalid_transition");
        assert_eq!(body["details"]["current"], "in-progress");
        assert_eq!(body["details"]["attempted"], "completed");
    }

    #[test]
    fn test_proof_codes_distinct() {
        let expired = ApiError::from(DispatchError::Proof(ProofError::Expired {
            issued_at: 1,
            now: 2,
        }));
        assert_eq!(expired.code(), "expired");
        assert_eq!(
            ApiError::from(DispatchError::Proof(ProofError::Tamper)).code(),
            "tamper"
        );
    }

    #[test]
    fn test_retry_after_header() {
        let response = ApiError::RateLimited { retry_after_secs: 7 }.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "7");
    }
}
