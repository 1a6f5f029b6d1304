//! In-process store
//!
//! Each entity map lives behind its own lock. Mission writes hold the mission
//! lock for the whole check-and-write, which makes the conditional assignment
//! atomic for every caller in the process. The same lock covers the
//! one-open-mission-per-collection check on insert.

use binroute_core::GeoPoint;
use parking_lot::RwLock;
use std::collections::HashMap;

use super::{
    AuditLogRepository, CollectionRepository, CollectorRepository, MissionFilter,
    MissionRepository, OrganizationRepository, StoreError, StoreResult,
};
use crate::model::{
    AuditLogEntry, Collection, CollectionStatus, Collector, Mission, Organization,
};

/// Thread-safe in-memory document store
#[derive(Debug, Default)]
pub struct InMemoryStore {
    organizations: RwLock<HashMap<String, Organization>>,
    collections: RwLock<HashMap<String, Collection>>,
    collectors: RwLock<HashMap<String, Collector>>,
    missions: RwLock<HashMap<String, Mission>>,
    audit: RwLock<Vec<AuditLogEntry>>,
}

impl InMemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    fn count_active(
        missions: &HashMap<String, Mission>,
        collector_id: &str,
        excluding: Option<&str>,
    ) -> u32 {
        missions
            .values()
            .filter(|m| m.status().is_active())
            .filter(|m| m.collector_id() == Some(collector_id))
            .filter(|m| Some(m.mission_id.as_str()) != excluding)
            .count() as u32
    }

    /// Version and append-only checks shared by every mission write
    fn check_replace(
        missions: &HashMap<String, Mission>,
        mission: &Mission,
        expected_version: u64,
    ) -> StoreResult<()> {
        let current = missions
            .get(&mission.mission_id)
            .ok_or_else(|| StoreError::NotFound {
                entity: "mission",
                id: mission.mission_id.clone(),
            })?;
        if current.version != expected_version {
            return Err(StoreError::VersionConflict {
                entity: "mission",
                id: mission.mission_id.clone(),
                expected: expected_version,
                actual: current.version,
            });
        }
        if !mission
            .reassignment_history
            .extends(&current.reassignment_history)
        {
            return Err(StoreError::HistoryRewrite {
                mission_id: mission.mission_id.clone(),
            });
        }
        Ok(())
    }

    fn commit(missions: &mut HashMap<String, Mission>, mut mission: Mission) -> Mission {
        mission.version += 1;
        missions.insert(mission.mission_id.clone(), mission.clone());
        mission
    }
}

impl OrganizationRepository for InMemoryStore {
    fn get_organization(&self, organization_id: &str) -> StoreResult<Organization> {
        self.organizations
            .read()
            .get(organization_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                entity: "organization",
                id: organization_id.to_string(),
            })
    }

    fn put_organization(&self, organization: Organization) -> StoreResult<()> {
        self.organizations
            .write()
            .insert(organization.organization_id.clone(), organization);
        Ok(())
    }
}

impl CollectionRepository for InMemoryStore {
    fn insert_collection(&self, collection: Collection) -> StoreResult<Collection> {
        let mut collections = self.collections.write();
        if collections.contains_key(&collection.collection_id) {
            return Err(StoreError::AlreadyExists {
                entity: "collection",
                id: collection.collection_id,
            });
        }
        collections.insert(collection.collection_id.clone(), collection.clone());
        Ok(collection)
    }

    fn get_collection(&self, collection_id: &str) -> StoreResult<Collection> {
        self.collections
            .read()
            .get(collection_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                entity: "collection",
                id: collection_id.to_string(),
            })
    }

    fn set_collection_status(
        &self,
        collection_id: &str,
        status: CollectionStatus,
        now: u64,
    ) -> StoreResult<Collection> {
        let mut collections = self.collections.write();
        let collection = collections
            .get_mut(collection_id)
            .ok_or_else(|| StoreError::NotFound {
                entity: "collection",
                id: collection_id.to_string(),
            })?;
        collection.status = status;
        collection.updated_at = now;
        Ok(collection.clone())
    }
}

impl CollectorRepository for InMemoryStore {
    fn put_collector(&self, collector: Collector) -> StoreResult<()> {
        self.collectors
            .write()
            .insert(collector.collector_id.clone(), collector);
        Ok(())
    }

    fn get_collector(&self, collector_id: &str) -> StoreResult<Collector> {
        self.collectors
            .read()
            .get(collector_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                entity: "collector",
                id: collector_id.to_string(),
            })
    }

    fn list_collectors(&self, organization_id: &str) -> StoreResult<Vec<Collector>> {
        let mut collectors: Vec<Collector> = self
            .collectors
            .read()
            .values()
            .filter(|c| c.organization_id == organization_id)
            .cloned()
            .collect();
        collectors.sort_by(|a, b| a.collector_id.cmp(&b.collector_id));
        Ok(collectors)
    }

    fn set_on_duty(&self, collector_id: &str, on_duty: bool) -> StoreResult<Collector> {
        let mut collectors = self.collectors.write();
        let collector = collectors
            .get_mut(collector_id)
            .ok_or_else(|| StoreError::NotFound {
                entity: "collector",
                id: collector_id.to_string(),
            })?;
        collector.availability.on_duty = on_duty;
        Ok(collector.clone())
    }

    fn record_heartbeat(
        &self,
        collector_id: &str,
        location: GeoPoint,
        seen_at: u64,
    ) -> StoreResult<Collector> {
        let mut collectors = self.collectors.write();
        let collector = collectors
            .get_mut(collector_id)
            .ok_or_else(|| StoreError::NotFound {
                entity: "collector",
                id: collector_id.to_string(),
            })?;
        collector.availability.last_location = Some(location);
        collector.availability.last_seen_at = Some(seen_at);
        Ok(collector.clone())
    }
}

impl MissionRepository for InMemoryStore {
    fn insert_mission(&self, mut mission: Mission) -> StoreResult<Mission> {
        let mut missions = self.missions.write();
        if missions.contains_key(&mission.mission_id) {
            return Err(StoreError::AlreadyExists {
                entity: "mission",
                id: mission.mission_id,
            });
        }
        if let Some(open) = missions
            .values()
            .find(|m| m.collection_id == mission.collection_id && m.status().is_active())
        {
            return Err(StoreError::OpenMissionExists {
                collection_id: mission.collection_id,
                mission_id: open.mission_id.clone(),
            });
        }
        mission.version = 0;
        Ok(Self::commit(&mut missions, mission))
    }

    fn get_mission(&self, mission_id: &str) -> StoreResult<Mission> {
        self.missions
            .read()
            .get(mission_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                entity: "mission",
                id: mission_id.to_string(),
            })
    }

    fn list_missions(&self, filter: &MissionFilter) -> StoreResult<Vec<Mission>> {
        let mut missions: Vec<Mission> = self
            .missions
            .read()
            .values()
            .filter(|m| filter.matches(m))
            .cloned()
            .collect();
        missions.sort_by(|a, b| {
            a.timestamps
                .created
                .cmp(&b.timestamps.created)
                .then_with(|| a.mission_id.cmp(&b.mission_id))
        });
        Ok(missions)
    }

    fn active_mission_for_collection(&self, collection_id: &str) -> StoreResult<Option<Mission>> {
        Ok(self
            .missions
            .read()
            .values()
            .find(|m| m.collection_id == collection_id && m.status().is_active())
            .cloned())
    }

    fn count_active_missions(&self, collector_id: &str) -> StoreResult<u32> {
        Ok(Self::count_active(&self.missions.read(), collector_id, None))
    }

    fn update_mission(&self, mission: Mission, expected_version: u64) -> StoreResult<Mission> {
        let mut missions = self.missions.write();
        Self::check_replace(&missions, &mission, expected_version)?;
        Ok(Self::commit(&mut missions, mission))
    }

    fn try_assign_if_under_capacity(
        &self,
        mission: Mission,
        expected_version: u64,
        collector_id: &str,
        max_active: u32,
    ) -> StoreResult<Mission> {
        let mut missions = self.missions.write();
        Self::check_replace(&missions, &mission, expected_version)?;
        let active = Self::count_active(&missions, collector_id, Some(&mission.mission_id));
        if active >= max_active {
            return Err(StoreError::CapacityExceeded {
                collector_id: collector_id.to_string(),
                active,
                limit: max_active,
            });
        }
        Ok(Self::commit(&mut missions, mission))
    }
}

impl AuditLogRepository for InMemoryStore {
    fn append_audit(&self, entry: AuditLogEntry) -> StoreResult<()> {
        self.audit.write().push(entry);
        Ok(())
    }

    fn list_audit(
        &self,
        organization_id: Option<&str>,
        limit: usize,
    ) -> StoreResult<Vec<AuditLogEntry>> {
        Ok(self
            .audit
            .read()
            .iter()
            .rev()
            .filter(|e| organization_id.map_or(true, |o| e.organization_id.as_deref() == Some(o)))
            .take(limit)
            .cloned()
            .collect())
    }
}
