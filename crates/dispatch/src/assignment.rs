//! Automatic and manual mission assignment
//!
//! Candidate selection runs the filters in order: organization, on duty with
//! a fresh heartbeat, within the auto-assign radius, under the load cap. Then
//! ranking. The top candidate is written with the conditional
//! [`MissionRepository::try_assign_if_under_capacity`]; a collector that filled
//! up in the meantime is excluded and the rest re-ranked, a mission changed by
//! someone else is reloaded. An empty candidate list is a valid outcome: the
//! mission stays `planned` for manual assignment.
//!
//! [`MissionRepository::try_assign_if_under_capacity`]: crate::store::MissionRepository::try_assign_if_under_capacity

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::duty::DutyRegistry;
use crate::error::{DispatchError, Result};
use crate::events::LifecycleEvent;
use crate::mission::MissionStateMachine;
use crate::model::{Collection, Mission, MissionStatus, Organization, ReassignmentEntry};
use crate::reassignment::ReassignmentAuditor;
use crate::store::{DispatchStore, StoreError};

/// An eligible collector with its ranking keys
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub collector_id: String,
    /// Great-circle distance to the pickup point
    pub distance_meters: f64,
    /// Non-terminal missions currently held
    pub active_missions: u32,
    /// Last heartbeat
    pub last_seen_at: u64,
}

/// Ranking order: nearer, then less loaded, then the most recent heartbeat,
/// then collector id.
///
/// On equal distance and load the larger `last_seen_at` wins, so the
/// collector whose position is freshest goes first.
pub fn compare_candidates(a: &Candidate, b: &Candidate) -> Ordering {
    a.distance_meters
        .total_cmp(&b.distance_meters)
        .then_with(|| a.active_missions.cmp(&b.active_missions))
        .then_with(|| b.last_seen_at.cmp(&a.last_seen_at))
        .then_with(|| a.collector_id.cmp(&b.collector_id))
}

/// Sort candidates best first
pub fn rank_candidates(mut candidates: Vec<Candidate>) -> Vec<Candidate> {
    candidates.sort_by(compare_candidates);
    candidates
}

/// Why a mission was left `planned`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeferralReason {
    /// Organization turned automatic assignment off
    AutoAssignDisabled,
    /// Nobody passed the filters
    NoEligibleCollectors,
    /// Every candidate filled up or the attempt budget ran out
    CandidatesExhausted,
    /// Another writer changed the mission first
    Superseded,
}

/// Result of an automatic assignment attempt
#[derive(Debug, Clone, PartialEq)]
pub enum AssignmentOutcome {
    Assigned {
        mission: Mission,
        event: LifecycleEvent,
    },
    Deferred {
        mission: Mission,
        reason: DeferralReason,
    },
}

impl AssignmentOutcome {
    pub fn mission(&self) -> &Mission {
        match self {
            AssignmentOutcome::Assigned { mission, .. } => mission,
            AssignmentOutcome::Deferred { mission, .. } => mission,
        }
    }

    pub fn into_mission(self) -> Mission {
        match self {
            AssignmentOutcome::Assigned { mission, .. } => mission,
            AssignmentOutcome::Deferred { mission, .. } => mission,
        }
    }

    pub fn is_assigned(&self) -> bool {
        matches!(self, AssignmentOutcome::Assigned { .. })
    }
}

/// Result of a manual (re)assignment
#[derive(Debug, Clone, PartialEq)]
pub struct ManualAssignment {
    pub mission: Mission,
    /// `None` when the collector did not change
    pub event: Option<LifecycleEvent>,
    /// Present when a previous collector was replaced
    pub reassignment: Option<ReassignmentEntry>,
}

/// Matches missions to collectors
#[derive(Clone)]
pub struct AssignmentEngine {
    store: Arc<dyn DispatchStore>,
    duty: DutyRegistry,
    machine: MissionStateMachine,
    auditor: ReassignmentAuditor,
    max_attempts: u32,
}

impl AssignmentEngine {
    pub fn new(
        store: Arc<dyn DispatchStore>,
        duty: DutyRegistry,
        machine: MissionStateMachine,
        auditor: ReassignmentAuditor,
        max_attempts: u32,
    ) -> Self {
        Self {
            store,
            duty,
            machine,
            auditor,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Eligible collectors for `collection`, best first
    pub fn candidates(
        &self,
        organization: &Organization,
        collection: &Collection,
        excluded: &HashSet<String>,
        now: u64,
    ) -> Result<Vec<Candidate>> {
        let mut eligible = Vec::new();
        for collector in self.store.list_collectors(&organization.organization_id)? {
            if excluded.contains(&collector.collector_id) {
                continue;
            }
            if !self.duty.is_dispatchable(&collector, now) {
                continue;
            }
            let (Some(location), Some(last_seen_at)) = (
                collector.availability.last_location,
                collector.availability.last_seen_at,
            ) else {
                continue;
            };
            let distance = location.distance_m(&collection.location);
            if distance > organization.auto_assign_radius_meters {
                continue;
            }
            let active = self.store.count_active_missions(&collector.collector_id)?;
            if active >= organization.max_active_missions_per_collector {
                continue;
            }
            eligible.push(Candidate {
                collector_id: collector.collector_id,
                distance_meters: distance,
                active_missions: active,
                last_seen_at,
            });
        }
        Ok(rank_candidates(eligible))
    }

    /// Try to assign a `planned` mission automatically
    pub fn assign(&self, mission_id: &str, actor_id: &str, now: u64) -> Result<AssignmentOutcome> {
        let mut mission = self.store.get_mission(mission_id)?;
        if mission.status() != MissionStatus::Planned {
            return Err(DispatchError::invalid_transition(
                mission.status(),
                MissionStatus::Assigned,
            ));
        }

        let organization = self.store.get_organization(&mission.organization_id)?;
        if !organization.auto_assign_enabled {
            debug!(mission_id, "automatic assignment disabled for organization");
            return Ok(AssignmentOutcome::Deferred {
                mission,
                reason: DeferralReason::AutoAssignDisabled,
            });
        }
        let collection = self.store.get_collection(&mission.collection_id)?;

        let mut excluded = HashSet::new();
        for attempt in 1..=self.max_attempts {
            let candidates = self.candidates(&organization, &collection, &excluded, now)?;
            let Some(top) = candidates.first() else {
                let reason = if excluded.is_empty() {
                    DeferralReason::NoEligibleCollectors
                } else {
                    DeferralReason::CandidatesExhausted
                };
                info!(mission_id, ?reason, "mission left planned");
                return Ok(AssignmentOutcome::Deferred { mission, reason });
            };

            let collector = self.store.get_collector(&top.collector_id)?;
            let expected = mission.version();
            let mut next = mission.clone();
            let event = self.machine.assign(&mut next, &collector, actor_id, now)?;

            match self.store.try_assign_if_under_capacity(
                next,
                expected,
                &collector.collector_id,
                organization.max_active_missions_per_collector,
            ) {
                Ok(saved) => {
                    info!(
                        mission_id,
                        collector_id = %collector.collector_id,
                        distance_m = top.distance_meters,
                        attempt,
                        "mission auto-assigned"
                    );
                    return Ok(AssignmentOutcome::Assigned {
                        mission: saved,
                        event,
                    });
                }
                Err(StoreError::CapacityExceeded { collector_id, .. }) => {
                    debug!(mission_id, %collector_id, attempt, "lost capacity race, re-ranking");
                    excluded.insert(collector_id);
                }
                Err(StoreError::VersionConflict { .. }) => {
                    debug!(mission_id, attempt, "mission changed concurrently, reloading");
                    mission = self.store.get_mission(mission_id)?;
                    if mission.status() != MissionStatus::Planned {
                        return Ok(AssignmentOutcome::Deferred {
                            mission,
                            reason: DeferralReason::Superseded,
                        });
                    }
                }
                Err(other) => return Err(other.into()),
            }
        }

        warn!(mission_id, attempts = self.max_attempts, "assignment attempts exhausted");
        Ok(AssignmentOutcome::Deferred {
            mission,
            reason: DeferralReason::CandidatesExhausted,
        })
    }

    /// Assign `collector_id` directly, bypassing ranking.
    ///
    /// Organization match and the load cap still apply. Replacing a previous
    /// collector appends a reassignment history entry.
    pub fn manual_assign(
        &self,
        mission_id: &str,
        collector_id: &str,
        actor_id: &str,
        reason: Option<String>,
        now: u64,
    ) -> Result<ManualAssignment> {
        let mission = self.store.get_mission(mission_id)?;
        let collector = self.store.get_collector(collector_id)?;
        if collector.organization_id != mission.organization_id {
            return Err(DispatchError::NotFound { entity: "collector" });
        }
        let reason = self.auditor.normalize_reason(reason)?;
        let status = mission.status();
        if status.is_terminal() {
            return Err(DispatchError::invalid_transition(status, MissionStatus::Assigned));
        }
        if mission.is_assigned_to(collector_id) {
            return Ok(ManualAssignment {
                mission,
                event: None,
                reassignment: None,
            });
        }

        let organization = self.store.get_organization(&mission.organization_id)?;
        let expected = mission.version();
        let mut next = mission.clone();
        let (event, reassignment) = match mission.collector_id() {
            None => (
                self.machine.assign(&mut next, &collector, actor_id, now)?,
                None,
            ),
            Some(previous) => {
                let event = self.machine.transfer(&mut next, &collector, actor_id, now)?;
                let entry = self.auditor.record_reassignment(
                    &mut next,
                    previous,
                    collector_id,
                    actor_id,
                    reason,
                    now,
                )?;
                (event, Some(entry))
            }
        };

        let saved = self.store.try_assign_if_under_capacity(
            next,
            expected,
            collector_id,
            organization.max_active_missions_per_collector,
        )?;
        Ok(ManualAssignment {
            mission: saved,
            event: Some(event),
            reassignment,
        })
    }
}

impl std::fmt::Debug for AssignmentEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssignmentEngine")
            .field("max_attempts", &self.max_attempts)
            .finish_non_exhaustive()
    }
}
