//! Engine configuration

use binroute_core::{MS_PER_HOUR, MS_PER_MINUTE};
use serde::{Deserialize, Serialize};

/// Tunables for the dispatch engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// A heartbeat older than this makes a collector ineligible for auto-assignment
    pub heartbeat_staleness_ms: u64,
    /// Lifetime of a signed QR payload
    pub proof_ttl_ms: u64,
    /// Upper bound on conditional-write attempts in one `assign` call
    pub max_assignment_attempts: u32,
    /// Cap on `blockReason.description` and reassignment reasons
    pub block_description_max_chars: usize,
    /// Cap on stops in one optimized route
    pub max_route_stops: usize,
    /// Average travel speed used for route duration estimates
    pub route_average_speed_mps: f64,
    /// Time spent at each stop used for route duration estimates
    pub route_service_time_s: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            heartbeat_staleness_ms: 5 * MS_PER_MINUTE,
            proof_ttl_ms: 24 * MS_PER_HOUR,
            max_assignment_attempts: 8,
            block_description_max_chars: 500,
            max_route_stops: 100,
            // ~30 km/h urban average
            route_average_speed_mps: 8.33,
            route_service_time_s: 300,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.heartbeat_staleness_ms, 300_000);
        assert_eq!(config.proof_ttl_ms, 86_400_000);
        assert_eq!(config.block_description_max_chars, 500);
    }

    #[test]
    fn test_partial_deserialize_keeps_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"heartbeat_staleness_ms": 600000}"#).unwrap();
        assert_eq!(config.heartbeat_staleness_ms, 600_000);
        assert_eq!(config.max_assignment_attempts, 8);
    }
}
