//! Multi-stop route sequencing
//!
//! Priority-weighted nearest neighbour. The route starts at the most urgent
//! stop; each next stop minimises `distance × urgency penalty`. Ties go to the
//! lighter payload, then to the smaller collection id, so identical input always
//! yields the identical order.

use binroute_core::GeoPoint;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;

use crate::config::EngineConfig;
use crate::error::{DispatchError, Result};
use crate::model::{Collection, Urgency};

/// Multiplier applied to the distance of a candidate stop
pub fn urgency_penalty(urgency: Urgency) -> f64 {
    match urgency {
        Urgency::Urgent => 0.5,
        Urgency::High => 0.7,
        Urgency::Medium => 1.0,
        Urgency::Low => 1.3,
    }
}

/// One stop to sequence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteCandidate {
    pub collection_id: String,
    /// Open mission for this collection held by the collector, if any
    pub mission_id: Option<String>,
    pub location: GeoPoint,
    pub urgency: Urgency,
    pub weight_kg: f64,
}

impl RouteCandidate {
    /// Candidate from a stored collection
    pub fn from_collection(collection: &Collection, mission_id: Option<String>) -> Self {
        Self {
            collection_id: collection.collection_id.clone(),
            mission_id,
            location: collection.location,
            urgency: collection.urgency,
            weight_kg: collection.effective_weight_kg(),
        }
    }
}

/// A sequenced stop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteStop {
    /// 1-based visiting order
    pub sequence: usize,
    pub collection_id: String,
    pub mission_id: Option<String>,
    pub location: GeoPoint,
    pub urgency: Urgency,
    /// Distance from the previous stop; zero for the first
    pub leg_distance_meters: f64,
}

/// Ordered stop list with summary figures
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizedRoute {
    pub collector_id: String,
    pub stops: Vec<RouteStop>,
    pub total_distance_meters: f64,
    /// Travel at the configured average speed plus per-stop service time
    pub estimated_duration_seconds: u64,
}

impl OptimizedRoute {
    /// Collection ids in visiting order
    pub fn order(&self) -> Vec<&str> {
        self.stops.iter().map(|s| s.collection_id.as_str()).collect()
    }
}

/// Orders one collector's stops
#[derive(Debug, Clone)]
pub struct RouteSequencer {
    max_stops: usize,
    average_speed_mps: f64,
    service_time_s: u64,
}

impl RouteSequencer {
    pub fn new(max_stops: usize, average_speed_mps: f64, service_time_s: u64) -> Self {
        Self {
            max_stops,
            average_speed_mps,
            service_time_s,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(
            config.max_route_stops,
            config.route_average_speed_mps,
            config.route_service_time_s,
        )
    }

    fn validate(&self, candidates: &[RouteCandidate]) -> Result<()> {
        if candidates.is_empty() {
            return Err(DispatchError::validation(
                "collectionIds",
                "at least one collection is required",
            ));
        }
        if candidates.len() > self.max_stops {
            return Err(DispatchError::validation(
                "collectionIds",
                format!("at most {} stops per route", self.max_stops),
            ));
        }
        let mut seen = HashSet::new();
        for c in candidates {
            if !seen.insert(c.collection_id.as_str()) {
                return Err(DispatchError::validation(
                    "collectionIds",
                    format!("duplicate collection '{}'", c.collection_id),
                ));
            }
        }
        Ok(())
    }

    /// Sequence `candidates` for `collector_id`
    pub fn optimize(
        &self,
        collector_id: &str,
        candidates: Vec<RouteCandidate>,
    ) -> Result<OptimizedRoute> {
        self.validate(&candidates)?;

        let mut remaining = candidates;
        let start = remaining
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| {
                b.urgency
                    .cmp(&a.urgency)
                    .then_with(|| tie_break(a, b))
            })
            .map(|(i, _)| i)
            .unwrap_or(0);

        let first = remaining.swap_remove(start);
        let mut current = first.location;
        let mut stops = vec![to_stop(first, 1, 0.0)];
        let mut total = 0.0;

        while !remaining.is_empty() {
            let next = remaining
                .iter()
                .enumerate()
                .map(|(i, c)| (i, current.distance_m(&c.location)))
                .min_by(|(i, da), (j, db)| {
                    let (a, b) = (&remaining[*i], &remaining[*j]);
                    let ca = da * urgency_penalty(a.urgency);
                    let cb = db * urgency_penalty(b.urgency);
                    ca.total_cmp(&cb).then_with(|| tie_break(a, b))
                });
            let Some((index, leg)) = next else { break };

            let stop = remaining.swap_remove(index);
            current = stop.location;
            total += leg;
            let sequence = stops.len() + 1;
            stops.push(to_stop(stop, sequence, leg));
        }

        let travel_s = if self.average_speed_mps > 0.0 {
            total / self.average_speed_mps
        } else {
            0.0
        };
        let service_s = self.service_time_s.saturating_mul(stops.len() as u64);

        Ok(OptimizedRoute {
            collector_id: collector_id.to_string(),
            estimated_duration_seconds: travel_s.round() as u64 + service_s,
            total_distance_meters: total,
            stops,
        })
    }
}

impl Default for RouteSequencer {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

/// Lighter payload first, then collection id
fn tie_break(a: &RouteCandidate, b: &RouteCandidate) -> Ordering {
    a.weight_kg
        .total_cmp(&b.weight_kg)
        .then_with(|| a.collection_id.cmp(&b.collection_id))
}

fn to_stop(candidate: RouteCandidate, sequence: usize, leg: f64) -> RouteStop {
    RouteStop {
        sequence,
        collection_id: candidate.collection_id,
        mission_id: candidate.mission_id,
        location: candidate.location,
        urgency: candidate.urgency,
        leg_distance_meters: leg,
    }
}
