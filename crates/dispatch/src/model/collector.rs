//! Collector identity and availability snapshot

use binroute_core::GeoPoint;
use serde::{Deserialize, Serialize};

/// Presence derived from the last heartbeat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Presence {
    /// Heartbeat within the staleness window
    Fresh,
    /// Heartbeat older than the staleness window
    Stale,
    /// No heartbeat or no known location
    Unknown,
}

/// Soft, volatile availability state.
///
/// Only the duty registry writes this.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Availability {
    /// Self-declared intent to work
    pub on_duty: bool,
    /// Last reported position
    pub last_location: Option<GeoPoint>,
    /// Timestamp of the last heartbeat (Unix epoch milliseconds)
    pub last_seen_at: Option<u64>,
}

impl Availability {
    /// Presence at `now` for a given staleness window
    pub fn presence(&self, now: u64, staleness_ms: u64) -> Presence {
        match (self.last_location, self.last_seen_at) {
            (Some(_), Some(seen)) => {
                if now.saturating_sub(seen) <= staleness_ms {
                    Presence::Fresh
                } else {
                    Presence::Stale
                }
            }
            _ => Presence::Unknown,
        }
    }
}

/// A collector as seen by the dispatch engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Collector {
    /// Collector identifier (the collector's user id)
    pub collector_id: String,
    /// Owning organization
    pub organization_id: String,
    /// Display name
    pub display_name: String,
    /// Default vehicle
    #[serde(default)]
    pub vehicle_id: Option<String>,
    /// Availability snapshot
    #[serde(default)]
    pub availability: Availability,
}
