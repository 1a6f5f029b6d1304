//! Repository boundary
//!
//! One repository trait per entity over a transactional document store. The
//! load-capped assignment is an explicit conditional write,
//! [`MissionRepository::try_assign_if_under_capacity`], never a
//! read-then-write pair in the caller.

pub mod memory;

use binroute_core::GeoPoint;
use thiserror::Error;

use crate::model::{
    AuditLogEntry, Collection, CollectionStatus, Collector, Mission, MissionStatus, Organization,
};

pub use memory::InMemoryStore;

/// Storage errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("{entity} {id} already exists")]
    AlreadyExists { entity: &'static str, id: String },

    /// Optimistic concurrency check failed
    #[error("{entity} {id} version conflict: expected {expected}, found {actual}")]
    VersionConflict {
        entity: &'static str,
        id: String,
        expected: u64,
        actual: u64,
    },

    /// Conditional assignment refused: collector already at the load cap
    #[error("collector {collector_id} holds {active} active missions (limit {limit})")]
    CapacityExceeded {
        collector_id: String,
        active: u32,
        limit: u32,
    },

    /// Insert refused: the collection already has a non-terminal mission
    #[error("collection {collection_id} already has open mission {mission_id}")]
    OpenMissionExists {
        collection_id: String,
        mission_id: String,
    },

    /// A write tried to drop or edit reassignment history entries
    #[error("reassignment history of mission {mission_id} is append-only")]
    HistoryRewrite { mission_id: String },

    #[error("backend error: {0}")]
    Backend(String),
}

/// Result alias for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Mission list filter
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MissionFilter {
    /// Restrict to one organization
    pub organization_id: Option<String>,
    /// Restrict to one collector
    pub collector_id: Option<String>,
    /// Restrict to one status
    pub status: Option<MissionStatus>,
}

impl MissionFilter {
    /// Whether `mission` passes the filter
    pub fn matches(&self, mission: &Mission) -> bool {
        self.organization_id
            .as_deref()
            .map_or(true, |o| mission.organization_id == o)
            && self
                .collector_id
                .as_deref()
                .map_or(true, |c| mission.collector_id() == Some(c))
            && self.status.map_or(true, |s| mission.status() == s)
    }
}

/// Organizations
pub trait OrganizationRepository: Send + Sync {
    fn get_organization(&self, organization_id: &str) -> StoreResult<Organization>;
    /// Insert or replace
    fn put_organization(&self, organization: Organization) -> StoreResult<()>;
}

/// Collections
pub trait CollectionRepository: Send + Sync {
    fn insert_collection(&self, collection: Collection) -> StoreResult<Collection>;
    fn get_collection(&self, collection_id: &str) -> StoreResult<Collection>;
    fn set_collection_status(
        &self,
        collection_id: &str,
        status: CollectionStatus,
        now: u64,
    ) -> StoreResult<Collection>;
}

/// Collectors and their availability snapshot
pub trait CollectorRepository: Send + Sync {
    /// Insert or replace
    fn put_collector(&self, collector: Collector) -> StoreResult<()>;
    fn get_collector(&self, collector_id: &str) -> StoreResult<Collector>;
    fn list_collectors(&self, organization_id: &str) -> StoreResult<Vec<Collector>>;
    /// Last-write-wins duty flag
    fn set_on_duty(&self, collector_id: &str, on_duty: bool) -> StoreResult<Collector>;
    /// Last-write-wins position and `lastSeenAt`
    fn record_heartbeat(
        &self,
        collector_id: &str,
        location: GeoPoint,
        seen_at: u64,
    ) -> StoreResult<Collector>;
}

/// Missions
pub trait MissionRepository: Send + Sync {
    /// Insert a new mission at version 1. Refused while another non-terminal
    /// mission exists for the same collection; the check and the insert are
    /// one atomic step.
    fn insert_mission(&self, mission: Mission) -> StoreResult<Mission>;
    fn get_mission(&self, mission_id: &str) -> StoreResult<Mission>;
    fn list_missions(&self, filter: &MissionFilter) -> StoreResult<Vec<Mission>>;
    /// Non-terminal mission for a collection, if any
    fn active_mission_for_collection(&self, collection_id: &str) -> StoreResult<Option<Mission>>;
    /// Non-terminal missions held by a collector
    fn count_active_missions(&self, collector_id: &str) -> StoreResult<u32>;
    /// Replace a mission if its stored version still equals `expected_version`
    fn update_mission(&self, mission: Mission, expected_version: u64) -> StoreResult<Mission>;
    /// Atomically: check `expected_version`, check that `collector_id` holds
    /// fewer than `max_active` other non-terminal missions, then write
    fn try_assign_if_under_capacity(
        &self,
        mission: Mission,
        expected_version: u64,
        collector_id: &str,
        max_active: u32,
    ) -> StoreResult<Mission>;
}

/// Audit log
pub trait AuditLogRepository: Send + Sync {
    fn append_audit(&self, entry: AuditLogEntry) -> StoreResult<()>;
    /// Newest first; `None` organization means all
    fn list_audit(&self, organization_id: Option<&str>, limit: usize)
        -> StoreResult<Vec<AuditLogEntry>>;
}

/// Everything the engine needs from storage
pub trait DispatchStore:
    OrganizationRepository
    + CollectionRepository
    + CollectorRepository
    + MissionRepository
    + AuditLogRepository
{
}

impl<T> DispatchStore for T where
    T: OrganizationRepository
        + CollectionRepository
        + CollectorRepository
        + MissionRepository
        + AuditLogRepository
{
}
