//! Organization-scoped access control
//!
//! Two checks run in order. The immutable [`PermissionTable`] decides whether a
//! role may perform an operation at all. Scope rules then decide whether this
//! caller may touch this resource:
//!
//! - platform-admin: always allowed
//! - org-admin: resource organization must equal the caller's; an org-admin
//!   without an organization is denied everything
//! - collector, reporter: must be a designated actor of the resource
//!
//! Out-of-scope denials surface as not-found so cross-tenant existence never
//! leaks; permission denials surface as a generic access-denied.

use std::collections::{HashMap, HashSet};
use tracing::debug;

use crate::error::{DispatchError, Result};
use crate::model::{Caller, Role};

/// Guarded operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    CreateCollection,
    ViewCollection,
    IssueConfirmation,
    ConfirmCollection,
    CreateMission,
    ViewMission,
    ListMissions,
    AssignMission,
    UpdateMissionStatus,
    SubmitProof,
    IssueQr,
    OptimizeRoute,
    SetDuty,
    Heartbeat,
    ManageWebhooks,
    ViewAuditLog,
}

/// Role → permission matrix, built once at startup
#[derive(Debug, Clone)]
pub struct PermissionTable {
    grants: HashMap<Role, HashSet<Permission>>,
}

impl PermissionTable {
    /// Build a table from explicit grants
    pub fn new(grants: impl IntoIterator<Item = (Role, Vec<Permission>)>) -> Self {
        Self {
            grants: grants
                .into_iter()
                .map(|(role, perms)| (role, perms.into_iter().collect()))
                .collect(),
        }
    }

    /// Default matrix
    pub fn standard() -> Self {
        use Permission::*;
        Self::new([
            (
                Role::OrgAdmin,
                vec![
                    CreateCollection,
                    ViewCollection,
                    IssueConfirmation,
                    ConfirmCollection,
                    CreateMission,
                    ViewMission,
                    ListMissions,
                    AssignMission,
                    UpdateMissionStatus,
                    IssueQr,
                    OptimizeRoute,
                    SetDuty,
                    ManageWebhooks,
                    ViewAuditLog,
                ],
            ),
            (
                Role::Collector,
                vec![
                    ViewCollection,
                    ConfirmCollection,
                    ViewMission,
                    ListMissions,
                    UpdateMissionStatus,
                    SubmitProof,
                    IssueQr,
                    OptimizeRoute,
                    SetDuty,
                    Heartbeat,
                ],
            ),
            (
                Role::Reporter,
                vec![CreateCollection, ViewCollection, IssueConfirmation],
            ),
        ])
    }

    /// Whether `role` holds `permission`; platform-admin holds all
    pub fn grants(&self, role: Role, permission: Permission) -> bool {
        role == Role::PlatformAdmin
            || self
                .grants
                .get(&role)
                .map_or(false, |perms| perms.contains(&permission))
    }
}

impl Default for PermissionTable {
    fn default() -> Self {
        Self::standard()
    }
}

/// The resource a request touches
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceScope {
    /// Entity name used in not-found errors
    pub entity: &'static str,
    /// Owning organization; `None` for global resources
    pub organization_id: Option<String>,
    /// Users acting on the resource in their own right (assigned collector, reporter)
    pub designated_actors: Vec<String>,
}

impl ResourceScope {
    pub fn new(entity: &'static str, organization_id: impl Into<String>) -> Self {
        Self {
            entity,
            organization_id: Some(organization_id.into()),
            designated_actors: Vec::new(),
        }
    }

    /// Resource with no owning organization
    pub fn global(entity: &'static str) -> Self {
        Self {
            entity,
            organization_id: None,
            designated_actors: Vec::new(),
        }
    }

    /// Add a designated actor; `None` is ignored
    pub fn with_actor<S: Into<String>>(mut self, actor: Option<S>) -> Self {
        if let Some(actor) = actor {
            self.designated_actors.push(actor.into());
        }
        self
    }
}

/// Why access was denied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// Role lacks the permission
    MissingPermission,
    /// Org-admin without an organization (fail-closed)
    NoOrganization,
    /// Resource belongs to another organization
    OutsideOrganization,
    /// Caller is not a designated actor
    NotDesignatedActor,
}

/// Guard verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    Allow,
    Deny(DenyReason),
}

impl AccessDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, AccessDecision::Allow)
    }
}

/// Resolves callers against resources
#[derive(Debug, Clone, Default)]
pub struct AccessGuard {
    table: PermissionTable,
}

impl AccessGuard {
    pub fn new(table: PermissionTable) -> Self {
        Self { table }
    }

    /// Decide without side effects
    pub fn decide(
        &self,
        caller: &Caller,
        permission: Permission,
        scope: &ResourceScope,
    ) -> AccessDecision {
        use AccessDecision::{Allow, Deny};

        if caller.role == Role::PlatformAdmin {
            return Allow;
        }
        if !self.table.grants(caller.role, permission) {
            return Deny(DenyReason::MissingPermission);
        }

        let same_org = |caller_org: &str| scope.organization_id.as_deref() == Some(caller_org);
        match caller.role {
            Role::PlatformAdmin => Allow,
            Role::OrgAdmin => match caller.organization_id.as_deref() {
                None => Deny(DenyReason::NoOrganization),
                Some(org) if same_org(org) => Allow,
                Some(_) => Deny(DenyReason::OutsideOrganization),
            },
            Role::Collector | Role::Reporter => {
                if let Some(org) = caller.organization_id.as_deref() {
                    if scope.organization_id.is_some() && !same_org(org) {
                        return Deny(DenyReason::OutsideOrganization);
                    }
                }
                if scope.designated_actors.iter().any(|a| *a == caller.user_id) {
                    Allow
                } else {
                    Deny(DenyReason::NotDesignatedActor)
                }
            }
        }
    }

    /// Decide and convert a denial into an error
    pub fn require(
        &self,
        caller: &Caller,
        permission: Permission,
        scope: &ResourceScope,
    ) -> Result<()> {
        match self.decide(caller, permission, scope) {
            AccessDecision::Allow => Ok(()),
            AccessDecision::Deny(reason) => {
                debug!(
                    user_id = %caller.user_id,
                    role = ?caller.role,
                    ?permission,
                    ?reason,
                    entity = scope.entity,
                    "access denied"
                );
                Err(match reason {
                    DenyReason::MissingPermission | DenyReason::NoOrganization => {
                        DispatchError::Unauthorized
                    }
                    DenyReason::OutsideOrganization | DenyReason::NotDesignatedActor => {
                        DispatchError::NotFound {
                            entity: scope.entity,
                        }
                    }
                })
            }
        }
    }

    /// Permission check for operations without a concrete resource yet
    pub fn require_permission(&self, caller: &Caller, permission: Permission) -> Result<()> {
        if self.table.grants(caller.role, permission) {
            Ok(())
        } else {
            Err(DispatchError::Unauthorized)
        }
    }
}
