//! Binroute Dispatch
//!
//! Mission dispatch engine for field waste collection: reported collections
//! become missions, missions are matched to nearby on-duty collectors under a
//! per-collector load cap, and collectors work them through a guarded state
//! machine backed by signed proof-of-collection codes.
//!
//! # Components
//!
//! - [`assignment::AssignmentEngine`]: candidate filtering, ranking and the
//!   conditional capacity-checked write
//! - [`mission::MissionStateMachine`]: the only writer of mission status
//! - [`proof::ProofOfCollectionVerifier`]: HMAC-signed QR payloads
//! - [`route::RouteSequencer`]: priority-weighted stop ordering
//! - [`duty::DutyRegistry`]: duty flags and heartbeat freshness
//! - [`access::AccessGuard`]: role and organization scoping
//! - [`service::DispatchService`]: the façade wiring all of the above
//!
//! Persistence goes through the repository traits in [`store`]; lifecycle
//! events leave through an [`events::EventSink`].

pub mod access;
pub mod assignment;
pub mod config;
pub mod duty;
pub mod error;
pub mod events;
pub mod mission;
pub mod model;
pub mod proof;
pub mod reassignment;
pub mod route;
pub mod service;
pub mod store;

pub use access::{AccessGuard, Permission, PermissionTable, ResourceScope};
pub use assignment::{AssignmentEngine, AssignmentOutcome, DeferralReason};
pub use config::EngineConfig;
pub use duty::DutyRegistry;
pub use error::{DispatchError, Result};
pub use events::{EventSink, EventType, LifecycleEvent, NoopSink, RecordingSink};
pub use mission::{BlockReasonInput, MissionStateMachine, StatusChange, StatusUpdate};
pub use proof::{ConfirmationQrPayload, MissionQrPayload, ProofError, ProofOfCollectionVerifier};
pub use route::{OptimizedRoute, RouteCandidate, RouteSequencer, RouteStop};
pub use service::{
    AssignRequest, ConfirmationCode, CreateMission, DispatchService, MissionQuery,
    ProofSubmission, RouteRequest,
};
pub use store::{DispatchStore, InMemoryStore, MissionFilter, StoreError};
