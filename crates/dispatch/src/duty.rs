//! Collector duty and heartbeat tracking
//!
//! `onDuty` records intent to work; the heartbeat proves recent presence. The
//! two are independent: a stale heartbeat makes a collector ineligible for
//! automatic assignment but never clears `onDuty`.

use binroute_core::GeoPoint;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{DispatchError, Result};
use crate::model::{Collector, Presence};
use crate::store::DispatchStore;

/// Sole writer of collector availability
#[derive(Clone)]
pub struct DutyRegistry {
    store: Arc<dyn DispatchStore>,
    staleness_ms: u64,
}

impl DutyRegistry {
    /// Create a registry with a heartbeat staleness window
    pub fn new(store: Arc<dyn DispatchStore>, staleness_ms: u64) -> Self {
        Self {
            store,
            staleness_ms,
        }
    }

    /// Staleness window in milliseconds
    pub fn staleness_ms(&self) -> u64 {
        self.staleness_ms
    }

    /// Idempotent duty toggle
    pub fn set_duty(&self, collector_id: &str, on_duty: bool) -> Result<Collector> {
        let collector = self.store.set_on_duty(collector_id, on_duty)?;
        info!(collector_id, on_duty, "duty updated");
        Ok(collector)
    }

    /// Record position and `lastSeenAt = now`
    pub fn heartbeat(&self, collector_id: &str, location: GeoPoint, now: u64) -> Result<Collector> {
        location
            .validate()
            .map_err(|e| DispatchError::validation("coordinates", e.to_string()))?;
        let collector = self.store.record_heartbeat(collector_id, location, now)?;
        debug!(collector_id, lat = location.latitude, lng = location.longitude, "heartbeat");
        Ok(collector)
    }

    /// Presence of `collector` at `now`
    pub fn presence(&self, collector: &Collector, now: u64) -> Presence {
        collector.availability.presence(now, self.staleness_ms)
    }

    /// On duty with a fresh heartbeat
    pub fn is_dispatchable(&self, collector: &Collector, now: u64) -> bool {
        collector.availability.on_duty && self.presence(collector, now) == Presence::Fresh
    }
}

impl std::fmt::Debug for DutyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DutyRegistry")
            .field("staleness_ms", &self.staleness_ms)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Availability;
    use crate::store::{CollectorRepository, InMemoryStore};
    use binroute_core::MS_PER_MINUTE;

    fn registry() -> (Arc<InMemoryStore>, DutyRegistry) {
        let store = Arc::new(InMemoryStore::new());
        store
            .put_collector(Collector {
                collector_id: "col-1".to_string(),
                organization_id: "org-1".to_string(),
                display_name: "Ana".to_string(),
                vehicle_id: None,
                availability: Availability::default(),
            })
            .unwrap();
        let registry = DutyRegistry::new(store.clone(), 5 * MS_PER_MINUTE);
        (store, registry)
    }

    fn here() -> GeoPoint {
        GeoPoint {
            latitude: 45.0,
            longitude: 7.0,
        }
    }

    #[test]
    fn test_set_duty_idempotent() {
        let (_, registry) = registry();
        assert!(registry.set_duty("col-1", true).unwrap().availability.on_duty);
        assert!(registry.set_duty("col-1", true).unwrap().availability.on_duty);
        assert!(!registry.set_duty("col-1", false).unwrap().availability.on_duty);
    }

    #[test]
    fn test_heartbeat_rejects_bad_coordinates() {
        let (_, registry) = registry();
        let bad = GeoPoint {
            latitude: 10.0,
            longitude: 181.0,
        };
        let err = registry.heartbeat("col-1", bad, 1).unwrap_err();
        assert!(matches!(err, DispatchError::Validation { ref field, .. } if field == "coordinates"));
    }

    #[test]
    fn test_unknown_collector() {
        let (_, registry) = registry();
        assert_eq!(
            registry.set_duty("nobody", true).unwrap_err(),
            DispatchError::NotFound { entity: "collector" }
        );
    }

    #[test]
    fn test_stale_heartbeat_not_dispatchable_but_still_on_duty() {
        let (store, registry) = registry();
        registry.set_duty("col-1", true).unwrap();
        registry.heartbeat("col-1", here(), 1_000).unwrap();

        let c = store.get_collector("col-1").unwrap();
        assert!(registry.is_dispatchable(&c, 1_000 + 4 * MS_PER_MINUTE));
        assert!(!registry.is_dispatchable(&c, 1_000 + 6 * MS_PER_MINUTE));
        assert_eq!(registry.presence(&c, 1_000 + 6 * MS_PER_MINUTE), Presence::Stale);
        assert!(c.availability.on_duty);
    }

    #[test]
    fn test_off_duty_not_dispatchable() {
        let (store, registry) = registry();
        registry.heartbeat("col-1", here(), 1_000).unwrap();
        let c = store.get_collector("col-1").unwrap();
        assert!(!registry.is_dispatchable(&c, 1_000));
    }
}
