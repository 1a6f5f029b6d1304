//! Dispatch domain models
//!
//! Explicit value types for the documents the engine reads and writes.
//! Persistence goes through the repository traits in [`crate::store`].

pub mod audit;
pub mod caller;
pub mod collection;
pub mod collector;
pub mod mission;
pub mod organization;

pub use audit::{AuditAction, AuditLogEntry};
pub use caller::{Caller, Role};
pub use collection::{Collection, CollectionStatus, NewCollection, Urgency, WasteType};
pub use collector::{Availability, Collector, Presence};
pub use mission::{
    BlockReason, BlockReasonCode, Mission, MissionStatus, MissionTimestamps, MissionTransition,
    ProofCheckpoint, ProofStage, Proofs, ReassignmentEntry, ReassignmentHistory,
};
pub use organization::{Organization, WebhookSubscription, WEBHOOK_EVENT_NAMES};
