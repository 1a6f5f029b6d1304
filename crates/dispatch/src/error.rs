//! Dispatch errors

use thiserror::Error;

use crate::model::MissionStatus;
use crate::proof::ProofError;
use crate::store::StoreError;

fn reason_suffix(reason: &Option<String>) -> String {
    reason
        .as_deref()
        .map(|r| format!(": {}", r))
        .unwrap_or_default()
}

/// Error taxonomy surfaced by the dispatch engine.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DispatchError {
    /// Malformed input, with the offending field
    #[error("Validation error on '{field}': {reason}")]
    Validation { field: String, reason: String },

    /// Access guard denied the caller
    #[error("access denied")]
    Unauthorized,

    /// Absent, or outside the caller's organization
    #[error("{entity} not found")]
    NotFound { entity: &'static str },

    /// State machine guard failure
    #[error("Invalid transition from {current} to {attempted}{}", reason_suffix(.reason))]
    InvalidTransition {
        current: MissionStatus,
        attempted: MissionStatus,
        reason: Option<String>,
    },

    /// A conditional write lost a race
    #[error("Concurrent update conflict on {entity} {id}")]
    ConcurrencyConflict { entity: &'static str, id: String },

    /// Manual assignment onto a collector already at the load cap
    #[error("Collector {collector_id} is at capacity ({limit} active missions)")]
    CollectorAtCapacity { collector_id: String, limit: u32 },

    /// QR payload rejected
    #[error(transparent)]
    Proof(#[from] ProofError),

    /// Backend failure
    #[error("Storage error: {0}")]
    Storage(String),
}

impl DispatchError {
    /// Field-level validation error
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        DispatchError::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Plain invalid transition
    pub fn invalid_transition(current: MissionStatus, attempted: MissionStatus) -> Self {
        DispatchError::InvalidTransition {
            current,
            attempted,
            reason: None,
        }
    }

    /// Guard failure with an explanation
    pub fn guard_failed(
        current: MissionStatus,
        attempted: MissionStatus,
        reason: impl Into<String>,
    ) -> Self {
        DispatchError::InvalidTransition {
            current,
            attempted,
            reason: Some(reason.into()),
        }
    }

    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            DispatchError::Validation { .. } => "validation_error",
            DispatchError::Unauthorized => "access_denied",
            DispatchError::NotFound { .. } => "not_found",
            DispatchError::InvalidTransition { .. } => "invalid_transition",
            DispatchError::ConcurrencyConflict { .. } => "concurrency_conflict",
            DispatchError::CollectorAtCapacity { .. } => "collector_at_capacity",
            DispatchError::Proof(ProofError::Tamper) => "tamper",
            DispatchError::Proof(ProofError::Expired { .. }) => "expired",
            DispatchError::Storage(_) => "storage_error",
        }
    }
}

impl From<StoreError> for DispatchError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity, .. } => DispatchError::NotFound { entity },
            StoreError::AlreadyExists { entity, id } => {
                DispatchError::validation("id", format!("{} {} already exists", entity, id))
            }
            StoreError::VersionConflict { entity, id, .. } => {
                DispatchError::ConcurrencyConflict { entity, id }
            }
            StoreError::CapacityExceeded {
                collector_id,
                limit,
                ..
            } => DispatchError::CollectorAtCapacity {
                collector_id,
                limit,
            },
            StoreError::OpenMissionExists { .. } => DispatchError::validation(
                "collectionId",
                "collection already has an open mission",
            ),
            StoreError::HistoryRewrite { mission_id } => DispatchError::Storage(format!(
                "refused to rewrite reassignment history of mission {}",
                mission_id
            )),
            StoreError::Backend(msg) => DispatchError::Storage(msg),
        }
    }
}

/// Result alias for dispatch operations
pub type Result<T> = std::result::Result<T, DispatchError>;
