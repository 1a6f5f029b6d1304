//! Lifecycle events and the emitter boundary.
//!
//! The engine builds a [`LifecycleEvent`] for every committed mission change and
//! hands it to an [`EventSink`]. Sinks are fire-and-forget: they must not block
//! and cannot fail the originating mutation.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::model::{AuditAction, Mission, MissionStatus};

/// Event kinds delivered to subscribers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "mission.created")]
    MissionCreated,
    #[serde(rename = "mission.assigned")]
    MissionAssigned,
    #[serde(rename = "mission.reassigned")]
    MissionReassigned,
    #[serde(rename = "mission.status_changed")]
    MissionStatusChanged,
}

impl EventType {
    /// Subscription name
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::MissionCreated => "mission.created",
            EventType::MissionAssigned => "mission.assigned",
            EventType::MissionReassigned => "mission.reassigned",
            EventType::MissionStatusChanged => "mission.status_changed",
        }
    }

    /// Matching audit action
    pub fn audit_action(&self) -> AuditAction {
        match self {
            EventType::MissionCreated => AuditAction::MissionCreated,
            EventType::MissionAssigned => AuditAction::MissionAssigned,
            EventType::MissionReassigned => AuditAction::MissionReassigned,
            EventType::MissionStatusChanged => AuditAction::MissionStatusChanged,
        }
    }
}

/// One mission lifecycle event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LifecycleEvent {
    /// Unique event identifier
    pub event_id: String,
    /// Event kind
    pub event_type: EventType,
    pub mission_id: String,
    pub organization_id: String,
    /// Status before the change; `None` on creation
    pub old_status: Option<MissionStatus>,
    /// Status after the change
    pub new_status: MissionStatus,
    /// Acting user
    pub actor_id: String,
    /// Collector after the change
    pub collector_id: Option<String>,
    /// Timestamp (Unix epoch milliseconds)
    pub occurred_at: u64,
}

impl LifecycleEvent {
    /// Event describing `mission` as it stands after the change
    pub fn for_mission(
        event_type: EventType,
        mission: &Mission,
        old_status: Option<MissionStatus>,
        actor_id: &str,
        occurred_at: u64,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            event_type,
            mission_id: mission.mission_id.clone(),
            organization_id: mission.organization_id.clone(),
            old_status,
            new_status: mission.status(),
            actor_id: actor_id.to_string(),
            collector_id: mission.collector_id().map(str::to_string),
            occurred_at,
        }
    }
}

/// Receiver of lifecycle events (webhook fan-out, analytics)
pub trait EventSink: Send + Sync {
    /// Accept an event; must not block
    fn emit(&self, event: &LifecycleEvent);
}

/// Discards every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl EventSink for NoopSink {
    fn emit(&self, _event: &LifecycleEvent) {}
}

/// Keeps every event in memory
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<LifecycleEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events received so far, oldest first
    pub fn events(&self) -> Vec<LifecycleEvent> {
        self.events.lock().clone()
    }

    /// Events received for one mission
    pub fn for_mission(&self, mission_id: &str) -> Vec<LifecycleEvent> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.mission_id == mission_id)
            .cloned()
            .collect()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: &LifecycleEvent) {
        self.events.lock().push(event.clone());
    }
}
