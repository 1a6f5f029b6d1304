//! Mission lifecycle transitions
//!
//! Transitions mutate a [`Mission`] in place and return the event to publish
//! once the write commits. Nothing here touches storage.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{DispatchError, Result};
use crate::events::{EventType, LifecycleEvent};
use crate::model::{
    BlockReason, BlockReasonCode, Caller, Collector, Mission, MissionStatus, MissionTransition,
    ProofCheckpoint, ProofStage,
};

/// Block reason as submitted by a client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockReasonInput {
    pub reason: BlockReasonCode,
    #[serde(default)]
    pub description: String,
}

/// Status change request, as received on the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    pub status: MissionStatus,
    #[serde(default)]
    pub block_reason: Option<BlockReasonInput>,
}

/// Status-driven transitions (assignment has its own entry points)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusChange {
    /// `assigned → in-progress`
    Start,
    /// `in-progress → blocked`
    Block {
        reason: BlockReasonCode,
        description: String,
    },
    /// `blocked → in-progress`
    Resume,
    /// `in-progress → completed`
    Complete,
    /// any non-terminal `→ cancelled`
    Cancel,
}

impl StatusChange {
    /// Target status
    pub fn target(&self) -> MissionStatus {
        match self {
            StatusChange::Start | StatusChange::Resume => MissionStatus::InProgress,
            StatusChange::Block { .. } => MissionStatus::Blocked,
            StatusChange::Complete => MissionStatus::Completed,
            StatusChange::Cancel => MissionStatus::Cancelled,
        }
    }

    /// Interpret a wire request against the mission's current status.
    ///
    /// A target the current status cannot reach is rejected before the
    /// payload is looked at, so a terminal mission never reports a
    /// validation error.
    pub fn from_update(current: MissionStatus, update: StatusUpdate) -> Result<Self> {
        MissionStateMachine::ensure_allowed(current, update.status)?;
        match update.status {
            MissionStatus::InProgress if current == MissionStatus::Blocked => {
                Ok(StatusChange::Resume)
            }
            MissionStatus::InProgress => Ok(StatusChange::Start),
            MissionStatus::Blocked => {
                let input = update.block_reason.ok_or_else(|| {
                    DispatchError::validation("blockReason", "is required when blocking")
                })?;
                Ok(StatusChange::Block {
                    reason: input.reason,
                    description: input.description,
                })
            }
            MissionStatus::Completed => Ok(StatusChange::Complete),
            MissionStatus::Cancelled => Ok(StatusChange::Cancel),
            MissionStatus::Assigned => Err(DispatchError::guard_failed(
                current,
                MissionStatus::Assigned,
                "use the assign operation",
            )),
            MissionStatus::Planned => Err(DispatchError::invalid_transition(
                current,
                MissionStatus::Planned,
            )),
        }
    }
}

/// Owns every mission lifecycle transition and its guards.
#[derive(Debug, Clone)]
pub struct MissionStateMachine {
    block_description_max_chars: usize,
}

impl MissionStateMachine {
    pub fn new(block_description_max_chars: usize) -> Self {
        Self {
            block_description_max_chars,
        }
    }

    fn ensure_allowed(current: MissionStatus, next: MissionStatus) -> Result<()> {
        if current.can_transition_to(next) {
            Ok(())
        } else {
            Err(DispatchError::invalid_transition(current, next))
        }
    }

    fn ensure_same_org(mission: &Mission, collector: &Collector) -> Result<()> {
        // Cross-tenant collectors are reported as absent
        if collector.organization_id != mission.organization_id {
            return Err(DispatchError::NotFound { entity: "collector" });
        }
        Ok(())
    }

    fn record(mission: &mut Mission, next: MissionStatus, actor_id: &str, now: u64) {
        let transition = MissionTransition::new(
            &mission.mission_id,
            mission.status,
            next,
            actor_id,
            now,
            mission.ledger_head(),
        );
        mission.transitions.push(transition);
        mission.status = next;
        mission.updated_at = now;
    }

    /// `planned → assigned`
    pub fn assign(
        &self,
        mission: &mut Mission,
        collector: &Collector,
        actor_id: &str,
        now: u64,
    ) -> Result<LifecycleEvent> {
        Self::ensure_allowed(mission.status, MissionStatus::Assigned)?;
        Self::ensure_same_org(mission, collector)?;

        let old = mission.status;
        mission.collector_id = Some(collector.collector_id.clone());
        mission.vehicle_id = collector.vehicle_id.clone();
        mission.timestamps.assigned = Some(now);
        Self::record(mission, MissionStatus::Assigned, actor_id, now);

        info!(
            mission_id = %mission.mission_id,
            collector_id = %collector.collector_id,
            actor_id,
            "mission assigned"
        );
        Ok(LifecycleEvent::for_mission(
            EventType::MissionAssigned,
            mission,
            Some(old),
            actor_id,
            now,
        ))
    }

    /// Hand an already-assigned mission to another collector; status unchanged.
    ///
    /// The caller records the reassignment history entry.
    pub fn transfer(
        &self,
        mission: &mut Mission,
        collector: &Collector,
        actor_id: &str,
        now: u64,
    ) -> Result<LifecycleEvent> {
        let status = mission.status;
        if status.is_terminal() || status == MissionStatus::Planned {
            return Err(DispatchError::guard_failed(
                status,
                status,
                "only assigned, in-progress or blocked missions can change collector",
            ));
        }
        Self::ensure_same_org(mission, collector)?;

        mission.collector_id = Some(collector.collector_id.clone());
        mission.vehicle_id = collector.vehicle_id.clone();
        mission.updated_at = now;

        info!(
            mission_id = %mission.mission_id,
            collector_id = %collector.collector_id,
            actor_id,
            "mission transferred"
        );
        Ok(LifecycleEvent::for_mission(
            EventType::MissionReassigned,
            mission,
            Some(status),
            actor_id,
            now,
        ))
    }

    /// Apply a status-driven transition on behalf of `actor`
    pub fn apply(
        &self,
        mission: &mut Mission,
        change: StatusChange,
        actor: &Caller,
        now: u64,
    ) -> Result<LifecycleEvent> {
        let current = mission.status;
        let next = change.target();
        Self::ensure_allowed(current, next)?;

        match change {
            StatusChange::Start => {
                if !mission.is_assigned_to(&actor.user_id) {
                    return Err(DispatchError::guard_failed(
                        current,
                        next,
                        "only the assigned collector can start the mission",
                    ));
                }
                mission.timestamps.started.get_or_insert(now);
            }
            StatusChange::Block {
                reason,
                description,
            } => {
                let description = self.check_description(reason, description)?;
                mission.block_reason = Some(BlockReason {
                    reason,
                    description,
                    timestamp: now,
                });
            }
            StatusChange::Resume => {
                mission.block_reason = None;
            }
            StatusChange::Complete => {
                if mission.proofs.after.is_none() {
                    return Err(DispatchError::guard_failed(
                        current,
                        next,
                        "an after proof checkpoint is required",
                    ));
                }
                mission.timestamps.completed = Some(now);
            }
            StatusChange::Cancel => {
                mission.timestamps.cancelled = Some(now);
            }
        }

        Self::record(mission, next, &actor.user_id, now);
        info!(
            mission_id = %mission.mission_id,
            from = %current,
            to = %next,
            actor_id = %actor.user_id,
            "mission status changed"
        );
        Ok(LifecycleEvent::for_mission(
            EventType::MissionStatusChanged,
            mission,
            Some(current),
            &actor.user_id,
            now,
        ))
    }

    fn check_description(&self, reason: BlockReasonCode, description: String) -> Result<String> {
        let description = description.trim().to_string();
        if reason == BlockReasonCode::Other && description.is_empty() {
            return Err(DispatchError::validation(
                "blockReason.description",
                "is required when the reason is 'other'",
            ));
        }
        if description.chars().count() > self.block_description_max_chars {
            return Err(DispatchError::validation(
                "blockReason.description",
                format!(
                    "must be at most {} characters",
                    self.block_description_max_chars
                ),
            ));
        }
        Ok(description)
    }

    /// Attach a verified proof checkpoint
    pub fn record_proof(
        &self,
        mission: &mut Mission,
        stage: ProofStage,
        checkpoint: ProofCheckpoint,
        now: u64,
    ) -> Result<()> {
        let status = mission.status;
        let (accepted, leads_to) = match stage {
            ProofStage::Before => (
                matches!(status, MissionStatus::Assigned | MissionStatus::InProgress),
                MissionStatus::InProgress,
            ),
            ProofStage::After => (status == MissionStatus::InProgress, MissionStatus::Completed),
        };
        if !accepted {
            return Err(DispatchError::guard_failed(
                status,
                leads_to,
                format!("{} proof not accepted while {}", stage.as_str(), status),
            ));
        }
        if !mission.is_assigned_to(&checkpoint.verified_by) {
            return Err(DispatchError::guard_failed(
                status,
                leads_to,
                "proof must be captured by the assigned collector",
            ));
        }

        let slot = match stage {
            ProofStage::Before => &mut mission.proofs.before,
            ProofStage::After => &mut mission.proofs.after,
        };
        if slot.is_some() {
            return Err(DispatchError::validation(
                "stage",
                format!("{} proof already recorded", stage.as_str()),
            ));
        }
        *slot = Some(checkpoint);
        mission.updated_at = now;
        Ok(())
    }
}

impl Default for MissionStateMachine {
    fn default() -> Self {
        Self::new(500)
    }
}
