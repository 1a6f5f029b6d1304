//! Audit log entries produced by the engine

use serde::{Deserialize, Serialize};

/// Audited actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditAction {
    #[serde(rename = "collection.created")]
    CollectionCreated,
    #[serde(rename = "collection.confirmed")]
    CollectionConfirmed,
    #[serde(rename = "mission.created")]
    MissionCreated,
    #[serde(rename = "mission.assigned")]
    MissionAssigned,
    #[serde(rename = "mission.reassigned")]
    MissionReassigned,
    #[serde(rename = "mission.status_changed")]
    MissionStatusChanged,
    #[serde(rename = "mission.proof_recorded")]
    ProofRecorded,
    #[serde(rename = "mission.qr_reissued")]
    QrReissued,
    #[serde(rename = "collector.duty_changed")]
    DutyChanged,
    #[serde(rename = "organization.webhooks_changed")]
    WebhooksChanged,
}

impl AuditAction {
    /// Wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::CollectionCreated => "collection.created",
            AuditAction::CollectionConfirmed => "collection.confirmed",
            AuditAction::MissionCreated => "mission.created",
            AuditAction::MissionAssigned => "mission.assigned",
            AuditAction::MissionReassigned => "mission.reassigned",
            AuditAction::MissionStatusChanged => "mission.status_changed",
            AuditAction::ProofRecorded => "mission.proof_recorded",
            AuditAction::QrReissued => "mission.qr_reissued",
            AuditAction::DutyChanged => "collector.duty_changed",
            AuditAction::WebhooksChanged => "organization.webhooks_changed",
        }
    }
}

/// Append-only audit record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogEntry {
    /// Entry identifier
    pub entry_id: String,
    /// Acting user
    pub actor_id: String,
    /// Organization scope of the target
    pub organization_id: Option<String>,
    /// What happened
    pub action: AuditAction,
    /// Target entity type (`mission`, `collection`, `collector`, `organization`)
    pub target_type: String,
    /// Target identifier
    pub target_id: String,
    /// Free-form details
    pub metadata: serde_json::Value,
    /// Creation time (Unix epoch milliseconds)
    pub created_at: u64,
}

impl AuditLogEntry {
    /// Build an entry with a fresh id
    pub fn new(
        actor_id: &str,
        organization_id: Option<&str>,
        action: AuditAction,
        target_type: &str,
        target_id: &str,
        metadata: serde_json::Value,
        created_at: u64,
    ) -> Self {
        Self {
            entry_id: uuid::Uuid::new_v4().to_string(),
            actor_id: actor_id.to_string(),
            organization_id: organization_id.map(str::to_string),
            action,
            target_type: target_type.to_string(),
            target_id: target_id.to_string(),
            metadata,
            created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_wire_name_matches_as_str() {
        for action in [
            AuditAction::MissionReassigned,
            AuditAction::DutyChanged,
            AuditAction::ProofRecorded,
        ] {
            let json = serde_json::to_value(action).unwrap();
            assert_eq!(json, action.as_str());
        }
    }
}
