//! Reassignment audit trail

use serde_json::json;
use tracing::info;

use crate::error::{DispatchError, Result};
use crate::model::{AuditAction, AuditLogEntry, Mission, ReassignmentEntry};

/// Appends reassignment history entries.
///
/// Never called for the initial `planned → assigned` assignment.
#[derive(Debug, Clone)]
pub struct ReassignmentAuditor {
    reason_max_chars: usize,
}

impl ReassignmentAuditor {
    pub fn new(reason_max_chars: usize) -> Self {
        Self { reason_max_chars }
    }

    /// Validate an operator-supplied reason; blank means none
    pub fn normalize_reason(&self, reason: Option<String>) -> Result<Option<String>> {
        let reason = reason
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty());
        if let Some(r) = &reason {
            if r.chars().count() > self.reason_max_chars {
                return Err(DispatchError::validation(
                    "reason",
                    format!("must be at most {} characters", self.reason_max_chars),
                ));
            }
        }
        Ok(reason)
    }

    /// Append `{from, to, reason, actor, createdAt}` to the mission's history
    pub fn record_reassignment(
        &self,
        mission: &mut Mission,
        from_collector_id: &str,
        to_collector_id: &str,
        actor_id: &str,
        reason: Option<String>,
        now: u64,
    ) -> Result<ReassignmentEntry> {
        let reason = self.normalize_reason(reason)?;
        let entry = ReassignmentEntry {
            from_collector_id: from_collector_id.to_string(),
            to_collector_id: to_collector_id.to_string(),
            reason,
            actor_id: actor_id.to_string(),
            created_at: now,
        };
        mission.reassignment_history.push(entry.clone());
        info!(
            mission_id = %mission.mission_id,
            from = from_collector_id,
            to = to_collector_id,
            actor_id,
            "reassignment recorded"
        );
        Ok(entry)
    }

    /// Audit log entry mirroring a history entry
    pub fn audit_entry(&self, mission: &Mission, entry: &ReassignmentEntry) -> AuditLogEntry {
        AuditLogEntry::new(
            &entry.actor_id,
            Some(&mission.organization_id),
            AuditAction::MissionReassigned,
            "mission",
            &mission.mission_id,
            json!({
                "fromCollectorId": entry.from_collector_id,
                "toCollectorId": entry.to_collector_id,
                "reason": entry.reason,
            }),
            entry.created_at,
        )
    }
}

impl Default for ReassignmentAuditor {
    fn default() -> Self {
        Self::new(500)
    }
}
