//! Resolved request identity

use serde::{Deserialize, Serialize};

/// Caller role as resolved by the authentication layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    /// Platform operator with global scope
    PlatformAdmin,
    /// Administrator of one organization
    OrgAdmin,
    /// Field collector
    Collector,
    /// Citizen or business reporting collections
    Reporter,
}

/// "Caller has role R in organization O"
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Caller {
    /// User identifier (equals the collector id for collectors)
    pub user_id: String,
    /// Resolved role
    pub role: Role,
    /// Organization scope; `None` means global for platform admins
    pub organization_id: Option<String>,
}

impl Caller {
    /// Build a caller
    pub fn new(user_id: impl Into<String>, role: Role, organization_id: Option<String>) -> Self {
        Self {
            user_id: user_id.into(),
            role,
            organization_id,
        }
    }

    /// Whether the caller administers organizations (platform or org admin)
    pub fn is_admin(&self) -> bool {
        matches!(self.role, Role::PlatformAdmin | Role::OrgAdmin)
    }
}
