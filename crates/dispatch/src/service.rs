//! Dispatch service façade
//!
//! Every operation takes the resolved [`Caller`] and the request time, runs the
//! access guard before touching state, commits through the store, then publishes
//! lifecycle events and audit entries. Publishing never fails a committed
//! mutation.

use binroute_core::GeoPoint;
use binroute_crypto::PayloadSigner;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

use crate::access::{AccessGuard, Permission, PermissionTable, ResourceScope};
use crate::assignment::{AssignmentEngine, AssignmentOutcome};
use crate::config::EngineConfig;
use crate::duty::DutyRegistry;
use crate::error::{DispatchError, Result};
use crate::events::{EventSink, EventType, LifecycleEvent};
use crate::mission::{MissionStateMachine, StatusChange, StatusUpdate};
use crate::model::{
    AuditAction, AuditLogEntry, Caller, Collection, CollectionStatus, Collector, Mission,
    MissionStatus, NewCollection, Organization, ProofCheckpoint, ProofStage, Role,
    WebhookSubscription,
};
use crate::proof::{ProofError, ProofOfCollectionVerifier};
use crate::reassignment::ReassignmentAuditor;
use crate::route::{OptimizedRoute, RouteCandidate, RouteSequencer};
use crate::store::{DispatchStore, MissionFilter};

/// `POST /missions` body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMission {
    pub collection_id: String,
    pub organization_id: String,
    #[serde(default)]
    pub collector_id: Option<String>,
}

/// `PATCH /missions/:id/assign` body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignRequest {
    pub collector_id: String,
    #[serde(default)]
    pub reason: Option<String>,
}

/// `GET /missions` query
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MissionQuery {
    #[serde(default)]
    pub organization_id: Option<String>,
    #[serde(default)]
    pub collector_id: Option<String>,
    #[serde(default)]
    pub status: Option<MissionStatus>,
}

/// `POST /missions/optimize-route` body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteRequest {
    pub collector_id: String,
    pub collection_ids: Vec<String>,
}

/// Proof checkpoint submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofSubmission {
    pub qr_token: String,
    pub photo_ref: String,
    pub location: GeoPoint,
}

/// Reporter confirmation code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmationCode {
    pub collection_id: String,
    pub token: String,
    pub expires_at: u64,
}

/// Collection progress implied by a mission status
fn collection_status_for(status: MissionStatus) -> Option<CollectionStatus> {
    match status {
        MissionStatus::Planned | MissionStatus::Blocked => None,
        MissionStatus::Assigned => Some(CollectionStatus::Scheduled),
        MissionStatus::InProgress => Some(CollectionStatus::InProgress),
        MissionStatus::Completed => Some(CollectionStatus::Completed),
        // The pickup still needs dispatch
        MissionStatus::Cancelled => Some(CollectionStatus::Pending),
    }
}

fn new_id(prefix: &str) -> String {
    format!("{}_{}", prefix, uuid::Uuid::new_v4().simple())
}

/// The dispatch engine behind the access guard
pub struct DispatchService {
    store: Arc<dyn DispatchStore>,
    config: EngineConfig,
    guard: AccessGuard,
    duty: DutyRegistry,
    machine: MissionStateMachine,
    auditor: ReassignmentAuditor,
    assignment: AssignmentEngine,
    router: RouteSequencer,
    verifier: ProofOfCollectionVerifier,
    events: Arc<dyn EventSink>,
}

impl DispatchService {
    /// Wire the engine with the standard permission table
    pub fn new(
        store: Arc<dyn DispatchStore>,
        config: EngineConfig,
        qr_signer: PayloadSigner,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self::with_permissions(store, config, qr_signer, events, PermissionTable::standard())
    }

    /// Wire the engine with a custom permission table
    pub fn with_permissions(
        store: Arc<dyn DispatchStore>,
        config: EngineConfig,
        qr_signer: PayloadSigner,
        events: Arc<dyn EventSink>,
        permissions: PermissionTable,
    ) -> Self {
        let duty = DutyRegistry::new(store.clone(), config.heartbeat_staleness_ms);
        let machine = MissionStateMachine::new(config.block_description_max_chars);
        let auditor = ReassignmentAuditor::new(config.block_description_max_chars);
        let assignment = AssignmentEngine::new(
            store.clone(),
            duty.clone(),
            machine.clone(),
            auditor.clone(),
            config.max_assignment_attempts,
        );
        Self {
            router: RouteSequencer::from_config(&config),
            verifier: ProofOfCollectionVerifier::new(qr_signer, config.proof_ttl_ms),
            guard: AccessGuard::new(permissions),
            store,
            config,
            duty,
            machine,
            auditor,
            assignment,
            events,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn DispatchStore> {
        &self.store
    }

    // ----- provisioning (catalog entities come from configuration) -----

    /// Insert or replace an organization
    pub fn provision_organization(&self, organization: Organization) -> Result<()> {
        for hook in &organization.webhooks {
            hook.validate()?;
        }
        self.store.put_organization(organization)?;
        Ok(())
    }

    /// Insert or replace a collector; the organization must exist
    pub fn provision_collector(&self, collector: Collector) -> Result<()> {
        self.store.get_organization(&collector.organization_id)?;
        self.store.put_collector(collector)?;
        Ok(())
    }

    // ----- internals -----

    fn audit(&self, entry: AuditLogEntry) {
        let action = entry.action;
        if let Err(e) = self.store.append_audit(entry) {
            warn!(action = action.as_str(), error = %e, "failed to append audit entry");
        }
    }

    fn publish(&self, event: LifecycleEvent) {
        self.audit(AuditLogEntry::new(
            &event.actor_id,
            Some(&event.organization_id),
            event.event_type.audit_action(),
            "mission",
            &event.mission_id,
            json!({
                "oldStatus": event.old_status,
                "newStatus": event.new_status,
                "collectorId": event.collector_id,
            }),
            event.occurred_at,
        ));
        self.events.emit(&event);
    }

    fn sync_collection(&self, mission: &Mission, now: u64) {
        if let Some(status) = collection_status_for(mission.status()) {
            if let Err(e) = self
                .store
                .set_collection_status(&mission.collection_id, status, now)
            {
                warn!(
                    collection_id = %mission.collection_id,
                    error = %e,
                    "failed to mirror mission status onto collection"
                );
            }
        }
    }

    fn mission_scope(mission: &Mission) -> ResourceScope {
        ResourceScope::new("mission", mission.organization_id.as_str())
            .with_actor(mission.collector_id())
    }

    fn collection_scope(&self, collection: &Collection) -> Result<ResourceScope> {
        let active = self
            .store
            .active_mission_for_collection(&collection.collection_id)?;
        Ok(
            ResourceScope::new("collection", collection.organization_id.as_str())
                .with_actor(Some(collection.reporter_id.as_str()))
                .with_actor(active.as_ref().and_then(|m| m.collector_id())),
        )
    }

    fn load_mission(&self, caller: &Caller, permission: Permission, mission_id: &str) -> Result<Mission> {
        let mission = self.store.get_mission(mission_id)?;
        self.guard
            .require(caller, permission, &Self::mission_scope(&mission))?;
        Ok(mission)
    }

    /// Organization a caller administers; platform admins name it explicitly
    fn admin_organization(&self, caller: &Caller, requested: Option<&str>) -> Result<String> {
        let org = match caller.role {
            Role::PlatformAdmin => requested.or(caller.organization_id.as_deref()),
            _ => caller.organization_id.as_deref(),
        };
        org.map(str::to_string)
            .ok_or_else(|| DispatchError::validation("organizationId", "is required"))
    }

    // ----- collections -----

    /// Report a new pickup request
    pub fn create_collection(
        &self,
        caller: &Caller,
        input: NewCollection,
        now: u64,
    ) -> Result<Collection> {
        self.guard
            .require_permission(caller, Permission::CreateCollection)?;
        input.validate()?;
        self.store.get_organization(&input.organization_id)?;
        let scope = ResourceScope::new("organization", input.organization_id.as_str())
            .with_actor(Some(caller.user_id.as_str()));
        self.guard
            .require(caller, Permission::CreateCollection, &scope)?;

        let collection = self.store.insert_collection(Collection {
            collection_id: new_id("col"),
            organization_id: input.organization_id,
            reporter_id: caller.user_id.clone(),
            location: input.location,
            waste_type: input.waste_type,
            quantity_kg: input.quantity_kg,
            estimated_weight_kg: input.estimated_weight_kg,
            urgency: input.urgency,
            status: CollectionStatus::Pending,
            created_at: now,
            updated_at: now,
        })?;
        info!(
            collection_id = %collection.collection_id,
            organization_id = %collection.organization_id,
            "collection reported"
        );
        self.audit(AuditLogEntry::new(
            &caller.user_id,
            Some(&collection.organization_id),
            AuditAction::CollectionCreated,
            "collection",
            &collection.collection_id,
            json!({ "wasteType": collection.waste_type, "urgency": collection.urgency }),
            now,
        ));
        Ok(collection)
    }

    pub fn get_collection(&self, caller: &Caller, collection_id: &str) -> Result<Collection> {
        let collection = self.store.get_collection(collection_id)?;
        self.guard.require(
            caller,
            Permission::ViewCollection,
            &self.collection_scope(&collection)?,
        )?;
        Ok(collection)
    }

    /// Issue the reporter's confirmation code
    pub fn confirmation_code(
        &self,
        caller: &Caller,
        collection_id: &str,
        now: u64,
    ) -> Result<ConfirmationCode> {
        let collection = self.store.get_collection(collection_id)?;
        let scope = ResourceScope::new("collection", collection.organization_id.as_str())
            .with_actor(Some(collection.reporter_id.as_str()));
        self.guard
            .require(caller, Permission::IssueConfirmation, &scope)?;

        let token = self.verifier.issue_confirmation_token(
            &collection.collection_id,
            &collection.reporter_id,
            now,
        );
        Ok(ConfirmationCode {
            collection_id: collection.collection_id,
            token,
            expires_at: now.saturating_add(self.verifier.ttl_ms()),
        })
    }

    /// Verify a reporter confirmation code
    pub fn confirm_collection(&self, caller: &Caller, token: &str, now: u64) -> Result<Collection> {
        self.guard
            .require_permission(caller, Permission::ConfirmCollection)?;
        let payload = self.verifier.verify_confirmation_token(token, now)?;
        let collection = self.store.get_collection(&payload.collection_id)?;
        if payload.user_id != collection.reporter_id {
            return Err(ProofError::Tamper.into());
        }
        let active = self
            .store
            .active_mission_for_collection(&collection.collection_id)?;
        let scope = ResourceScope::new("collection", collection.organization_id.as_str())
            .with_actor(active.as_ref().and_then(|m| m.collector_id()));
        self.guard
            .require(caller, Permission::ConfirmCollection, &scope)?;

        info!(collection_id = %collection.collection_id, confirmed_by = %caller.user_id, "collection confirmed");
        self.audit(AuditLogEntry::new(
            &caller.user_id,
            Some(&collection.organization_id),
            AuditAction::CollectionConfirmed,
            "collection",
            &collection.collection_id,
            json!({
                "reporterId": collection.reporter_id,
                "missionId": active.as_ref().map(|m| m.mission_id.clone()),
                "issuedAt": payload.timestamp,
            }),
            now,
        ));
        Ok(collection)
    }

    // ----- missions -----

    /// Create a mission; assign `collector_id` directly or run automatic assignment
    pub fn create_mission(&self, caller: &Caller, request: CreateMission, now: u64) -> Result<Mission> {
        self.guard
            .require_permission(caller, Permission::CreateMission)?;
        let collection = self.store.get_collection(&request.collection_id)?;
        let scope = ResourceScope::new("collection", collection.organization_id.as_str());
        self.guard
            .require(caller, Permission::CreateMission, &scope)?;
        if request.organization_id != collection.organization_id {
            return Err(DispatchError::validation(
                "organizationId",
                "does not match the collection's organization",
            ));
        }
        if let Some(collector_id) = &request.collector_id {
            let collector = self.store.get_collector(collector_id)?;
            if collector.organization_id != collection.organization_id {
                return Err(DispatchError::NotFound { entity: "collector" });
            }
            // Refuse before anything is written so a full collector leaves no planned mission behind
            let organization = self.store.get_organization(&collection.organization_id)?;
            let limit = organization.max_active_missions_per_collector;
            if self.store.count_active_missions(collector_id)? >= limit {
                return Err(DispatchError::CollectorAtCapacity {
                    collector_id: collector_id.clone(),
                    limit,
                });
            }
        }

        let mission_id = new_id("msn");
        let mut mission = Mission::new(
            mission_id.as_str(),
            collection.collection_id.as_str(),
            collection.organization_id.as_str(),
            now,
        );
        mission.set_qr_token(
            self.verifier
                .issue_token(&mission_id, &collection.collection_id, now),
        );
        let mission = self.store.insert_mission(mission)?;
        info!(mission_id = %mission.mission_id, collection_id = %collection.collection_id, "mission created");
        self.publish(LifecycleEvent::for_mission(
            EventType::MissionCreated,
            &mission,
            None,
            &caller.user_id,
            now,
        ));

        match request.collector_id {
            Some(collector_id) => {
                let assigned = match self.assignment.manual_assign(
                    &mission.mission_id,
                    &collector_id,
                    &caller.user_id,
                    None,
                    now,
                ) {
                    Ok(assigned) => assigned,
                    // Filled up after the check above; the mission exists, so hand it back planned
                    Err(DispatchError::CollectorAtCapacity { collector_id, limit }) => {
                        warn!(
                            mission_id = %mission.mission_id,
                            collector_id = %collector_id,
                            limit,
                            "collector filled up during mission creation, left planned"
                        );
                        return Ok(mission);
                    }
                    Err(e) => return Err(e),
                };
                if let Some(event) = assigned.event {
                    self.publish(event);
                }
                self.sync_collection(&assigned.mission, now);
                Ok(assigned.mission)
            }
            None => {
                let outcome = self
                    .assignment
                    .assign(&mission.mission_id, &caller.user_id, now)?;
                Ok(self.finish_assignment(outcome, now))
            }
        }
    }

    fn finish_assignment(&self, outcome: AssignmentOutcome, now: u64) -> Mission {
        match outcome {
            AssignmentOutcome::Assigned { mission, event } => {
                self.publish(event);
                self.sync_collection(&mission, now);
                mission
            }
            AssignmentOutcome::Deferred { mission, .. } => mission,
        }
    }

    pub fn get_mission(&self, caller: &Caller, mission_id: &str) -> Result<Mission> {
        self.load_mission(caller, Permission::ViewMission, mission_id)
    }

    /// Missions visible to the caller, filtered by the query
    pub fn list_missions(&self, caller: &Caller, query: MissionQuery) -> Result<Vec<Mission>> {
        self.guard
            .require_permission(caller, Permission::ListMissions)?;
        let mut filter = MissionFilter {
            organization_id: query.organization_id,
            collector_id: query.collector_id,
            status: query.status,
        };
        match caller.role {
            Role::PlatformAdmin => {}
            Role::OrgAdmin => {
                let org = caller
                    .organization_id
                    .clone()
                    .ok_or(DispatchError::Unauthorized)?;
                filter.organization_id = Some(org);
            }
            Role::Collector | Role::Reporter => {
                if filter
                    .collector_id
                    .as_deref()
                    .map_or(false, |c| c != caller.user_id)
                {
                    return Ok(Vec::new());
                }
                filter.collector_id = Some(caller.user_id.clone());
            }
        }
        let missions = self.store.list_missions(&filter)?;
        Ok(missions
            .into_iter()
            .filter(|m| {
                self.guard
                    .decide(caller, Permission::ViewMission, &Self::mission_scope(m))
                    .is_allowed()
            })
            .collect())
    }

    /// Drive a status transition
    pub fn update_status(
        &self,
        caller: &Caller,
        mission_id: &str,
        update: StatusUpdate,
        now: u64,
    ) -> Result<Mission> {
        let mission = self.load_mission(caller, Permission::UpdateMissionStatus, mission_id)?;
        let change = StatusChange::from_update(mission.status(), update)?;
        let expected = mission.version();
        let mut next = mission;
        let event = self.machine.apply(&mut next, change, caller, now)?;
        let saved = self.store.update_mission(next, expected)?;
        self.sync_collection(&saved, now);
        self.publish(event);
        Ok(saved)
    }

    /// Manual (re)assignment
    pub fn assign_mission(
        &self,
        caller: &Caller,
        mission_id: &str,
        request: AssignRequest,
        now: u64,
    ) -> Result<Mission> {
        let mission = self.load_mission(caller, Permission::AssignMission, mission_id)?;
        let result = self.assignment.manual_assign(
            &mission.mission_id,
            &request.collector_id,
            &caller.user_id,
            request.reason,
            now,
        )?;
        if let Some(entry) = &result.reassignment {
            self.audit(self.auditor.audit_entry(&result.mission, entry));
        }
        if let Some(event) = result.event {
            // Reassignment is audited with its history entry above
            if event.event_type == EventType::MissionReassigned {
                self.events.emit(&event);
            } else {
                self.publish(event);
            }
        }
        self.sync_collection(&result.mission, now);
        Ok(result.mission)
    }

    /// Re-run automatic assignment on a planned mission
    pub fn auto_assign(&self, caller: &Caller, mission_id: &str, now: u64) -> Result<AssignmentOutcome> {
        self.load_mission(caller, Permission::AssignMission, mission_id)?;
        let outcome = self.assignment.assign(mission_id, &caller.user_id, now)?;
        if let AssignmentOutcome::Assigned { mission, event } = &outcome {
            self.publish(event.clone());
            self.sync_collection(mission, now);
        }
        Ok(outcome)
    }

    /// Attach a QR-verified proof checkpoint
    pub fn submit_proof(
        &self,
        caller: &Caller,
        mission_id: &str,
        stage: ProofStage,
        submission: ProofSubmission,
        now: u64,
    ) -> Result<Mission> {
        let mission = self.load_mission(caller, Permission::SubmitProof, mission_id)?;
        if submission.photo_ref.trim().is_empty() {
            return Err(DispatchError::validation("photoRef", "is required"));
        }
        submission
            .location
            .validate()
            .map_err(|e| DispatchError::validation("location", e.to_string()))?;

        let payload = self.verifier.verify_token(&submission.qr_token, now)?;
        // An authentic code for another mission is still the wrong code
        if payload.mission_id != mission.mission_id || payload.collection_id != mission.collection_id {
            return Err(ProofError::Tamper.into());
        }

        let expected = mission.version();
        let mut next = mission;
        self.machine.record_proof(
            &mut next,
            stage,
            ProofCheckpoint {
                photo_ref: submission.photo_ref,
                timestamp: now,
                location: submission.location,
                verified_by: caller.user_id.clone(),
            },
            now,
        )?;
        let saved = self.store.update_mission(next, expected)?;
        info!(mission_id, stage = stage.as_str(), "proof checkpoint recorded");
        self.audit(AuditLogEntry::new(
            &caller.user_id,
            Some(&saved.organization_id),
            AuditAction::ProofRecorded,
            "mission",
            &saved.mission_id,
            json!({ "stage": stage, "qrIssuedAt": payload.timestamp }),
            now,
        ));
        Ok(saved)
    }

    /// Sign a fresh mission QR code
    pub fn reissue_qr(&self, caller: &Caller, mission_id: &str, now: u64) -> Result<Mission> {
        let mission = self.load_mission(caller, Permission::IssueQr, mission_id)?;
        let status = mission.status();
        if status.is_terminal() {
            return Err(DispatchError::guard_failed(status, status, "mission is closed"));
        }
        let expected = mission.version();
        let mut next = mission;
        next.set_qr_token(
            self.verifier
                .issue_token(&next.mission_id, &next.collection_id, now),
        );
        let saved = self.store.update_mission(next, expected)?;
        self.audit(AuditLogEntry::new(
            &caller.user_id,
            Some(&saved.organization_id),
            AuditAction::QrReissued,
            "mission",
            &saved.mission_id,
            serde_json::Value::Null,
            now,
        ));
        Ok(saved)
    }

    // ----- routes -----

    /// Sequence a collector's stops.
    ///
    /// Every collection must have an open mission held by that collector;
    /// anything else is reported as not found, whoever the caller is.
    pub fn optimize_route(&self, caller: &Caller, request: RouteRequest) -> Result<OptimizedRoute> {
        let collector = self.store.get_collector(&request.collector_id)?;
        let scope = ResourceScope::new("collector", collector.organization_id.as_str())
            .with_actor(Some(collector.collector_id.as_str()));
        self.guard
            .require(caller, Permission::OptimizeRoute, &scope)?;
        if request.collection_ids.len() > self.config.max_route_stops {
            return Err(DispatchError::validation(
                "collectionIds",
                format!("at most {} stops per route", self.config.max_route_stops),
            ));
        }

        let mut candidates = Vec::with_capacity(request.collection_ids.len());
        for collection_id in &request.collection_ids {
            let collection = self.store.get_collection(collection_id)?;
            if collection.organization_id != collector.organization_id {
                return Err(DispatchError::NotFound { entity: "collection" });
            }
            let mission = self
                .store
                .active_mission_for_collection(collection_id)?
                .filter(|m| m.is_assigned_to(&collector.collector_id))
                .ok_or(DispatchError::NotFound { entity: "collection" })?;
            candidates.push(RouteCandidate::from_collection(
                &collection,
                Some(mission.mission_id),
            ));
        }
        self.router.optimize(&collector.collector_id, candidates)
    }

    // ----- duty -----

    /// Toggle a collector's duty flag
    pub fn set_duty(
        &self,
        caller: &Caller,
        collector_id: &str,
        on_duty: bool,
        now: u64,
    ) -> Result<Collector> {
        let collector = self.store.get_collector(collector_id)?;
        let scope = ResourceScope::new("collector", collector.organization_id.as_str())
            .with_actor(Some(collector.collector_id.as_str()));
        self.guard.require(caller, Permission::SetDuty, &scope)?;

        let was = collector.availability.on_duty;
        let updated = self.duty.set_duty(collector_id, on_duty)?;
        if was != on_duty {
            self.audit(AuditLogEntry::new(
                &caller.user_id,
                Some(&updated.organization_id),
                AuditAction::DutyChanged,
                "collector",
                &updated.collector_id,
                json!({ "onDuty": on_duty }),
                now,
            ));
        }
        Ok(updated)
    }

    /// Record the caller's own position
    pub fn heartbeat(&self, caller: &Caller, location: GeoPoint, now: u64) -> Result<Collector> {
        self.guard.require_permission(caller, Permission::Heartbeat)?;
        let collector = self.store.get_collector(&caller.user_id)?;
        let scope = ResourceScope::new("collector", collector.organization_id.as_str())
            .with_actor(Some(collector.collector_id.as_str()));
        self.guard.require(caller, Permission::Heartbeat, &scope)?;
        self.duty.heartbeat(&collector.collector_id, location, now)
    }

    // ----- webhooks -----

    fn webhook_org(&self, caller: &Caller, organization_id: Option<&str>) -> Result<Organization> {
        self.guard
            .require_permission(caller, Permission::ManageWebhooks)?;
        let org_id = self.admin_organization(caller, organization_id)?;
        let organization = self.store.get_organization(&org_id)?;
        self.guard.require(
            caller,
            Permission::ManageWebhooks,
            &ResourceScope::new("organization", org_id.as_str()),
        )?;
        Ok(organization)
    }

    fn save_webhooks(
        &self,
        caller: &Caller,
        mut organization: Organization,
        webhooks: Vec<WebhookSubscription>,
        change: &str,
        now: u64,
    ) -> Result<Vec<WebhookSubscription>> {
        organization.webhooks = webhooks;
        let urls: Vec<&str> = organization.webhooks.iter().map(|w| w.url.as_str()).collect();
        self.audit(AuditLogEntry::new(
            &caller.user_id,
            Some(&organization.organization_id),
            AuditAction::WebhooksChanged,
            "organization",
            &organization.organization_id,
            json!({ "change": change, "urls": urls }),
            now,
        ));
        let hooks = organization.webhooks.clone();
        self.store.put_organization(organization)?;
        Ok(hooks)
    }

    pub fn list_webhooks(
        &self,
        caller: &Caller,
        organization_id: Option<&str>,
    ) -> Result<Vec<WebhookSubscription>> {
        Ok(self.webhook_org(caller, organization_id)?.webhooks)
    }

    pub fn add_webhook(
        &self,
        caller: &Caller,
        organization_id: Option<&str>,
        hook: WebhookSubscription,
        now: u64,
    ) -> Result<Vec<WebhookSubscription>> {
        hook.validate()?;
        let organization = self.webhook_org(caller, organization_id)?;
        let mut hooks = organization.webhooks.clone();
        hooks.push(hook);
        self.save_webhooks(caller, organization, hooks, "added", now)
    }

    pub fn replace_webhook(
        &self,
        caller: &Caller,
        organization_id: Option<&str>,
        index: usize,
        hook: WebhookSubscription,
        now: u64,
    ) -> Result<Vec<WebhookSubscription>> {
        hook.validate()?;
        let organization = self.webhook_org(caller, organization_id)?;
        let mut hooks = organization.webhooks.clone();
        let slot = hooks
            .get_mut(index)
            .ok_or(DispatchError::NotFound { entity: "webhook" })?;
        *slot = hook;
        self.save_webhooks(caller, organization, hooks, "replaced", now)
    }

    pub fn delete_webhook(
        &self,
        caller: &Caller,
        organization_id: Option<&str>,
        index: usize,
        now: u64,
    ) -> Result<Vec<WebhookSubscription>> {
        let organization = self.webhook_org(caller, organization_id)?;
        let mut hooks = organization.webhooks.clone();
        if index >= hooks.len() {
            return Err(DispatchError::NotFound { entity: "webhook" });
        }
        hooks.remove(index);
        self.save_webhooks(caller, organization, hooks, "deleted", now)
    }

    // ----- audit -----

    /// Newest audit entries the caller may see
    pub fn audit_logs(
        &self,
        caller: &Caller,
        organization_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<AuditLogEntry>> {
        self.guard
            .require_permission(caller, Permission::ViewAuditLog)?;
        let scope_org = match caller.role {
            Role::PlatformAdmin => organization_id.map(str::to_string),
            _ => {
                let org = caller
                    .organization_id
                    .clone()
                    .ok_or(DispatchError::Unauthorized)?;
                self.guard.require(
                    caller,
                    Permission::ViewAuditLog,
                    &ResourceScope::new("organization", org.as_str()),
                )?;
                Some(org)
            }
        };
        Ok(self.store.list_audit(scope_org.as_deref(), limit)?)
    }
}

impl std::fmt::Debug for DispatchService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchService")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
