//! Organization (tenant) model

use serde::{Deserialize, Serialize};

use crate::error::DispatchError;

/// Event names a webhook may subscribe to; `*` subscribes to all of them.
pub const WEBHOOK_EVENT_NAMES: &[&str] = &[
    "mission.created",
    "mission.assigned",
    "mission.reassigned",
    "mission.status_changed",
];

/// Outbound webhook subscription
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookSubscription {
    /// Delivery URL (http or https)
    pub url: String,
    /// Subscribed event names
    pub events: Vec<String>,
    /// Shared secret used to sign delivery bodies; write-only
    #[serde(skip_serializing)]
    pub secret: String,
    /// Disabled subscriptions are kept but never delivered to
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl std::fmt::Debug for WebhookSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookSubscription")
            .field("url", &self.url)
            .field("events", &self.events)
            .field("secret", &"<redacted>")
            .field("enabled", &self.enabled)
            .finish()
    }
}

impl WebhookSubscription {
    /// Check URL scheme, event names and secret
    pub fn validate(&self) -> Result<(), DispatchError> {
        let url = self.url.trim();
        let rest = url
            .strip_prefix("https://")
            .or_else(|| url.strip_prefix("http://"));
        match rest {
            Some(host) if !host.is_empty() => {}
            _ => return Err(DispatchError::validation("url", "must be an http(s) URL")),
        }
        if self.events.is_empty() {
            return Err(DispatchError::validation(
                "events",
                "at least one event is required",
            ));
        }
        if let Some(unknown) = self
            .events
            .iter()
            .find(|e| e.as_str() != "*" && !WEBHOOK_EVENT_NAMES.contains(&e.as_str()))
        {
            return Err(DispatchError::validation(
                "events",
                format!("unknown event '{}'", unknown),
            ));
        }
        if self.secret.len() < 8 {
            return Err(DispatchError::validation(
                "secret",
                "must be at least 8 characters",
            ));
        }
        Ok(())
    }

    /// Whether a delivery for `event_name` should go to this subscription
    pub fn wants(&self, event_name: &str) -> bool {
        self.enabled && self.events.iter().any(|e| e == "*" || e == event_name)
    }
}

/// Tenant boundary and dispatch policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
    /// Organization identifier
    pub organization_id: String,
    /// Display name
    pub name: String,
    /// Automatic assignment on mission creation
    pub auto_assign_enabled: bool,
    /// Maximum collector-to-pickup distance for automatic assignment
    pub auto_assign_radius_meters: f64,
    /// Load cap per collector over non-terminal missions
    pub max_active_missions_per_collector: u32,
    /// Webhook subscriptions
    #[serde(default)]
    pub webhooks: Vec<WebhookSubscription>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hook(url: &str, events: &[&str]) -> WebhookSubscription {
        WebhookSubscription {
            url: url.to_string(),
            events: events.iter().map(|e| e.to_string()).collect(),
            secret: "whsec-123456".to_string(),
            enabled: true,
        }
    }

    #[test]
    fn test_validate_ok() {
        assert!(hook("https://example.org/hook", &["mission.created"])
            .validate()
            .is_ok());
        assert!(hook("http://10.0.0.1:8080/x", &["*"]).validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_url() {
        let err = hook("ftp://example.org", &["*"]).validate().unwrap_err();
        assert!(matches!(err, DispatchError::Validation { ref field, .. } if field == "url"));
        assert!(hook("https://", &["*"]).validate().is_err());
    }

    #[test]
    fn test_validate_rejects_unknown_event() {
        let err = hook("https://a.b", &["mission.exploded"]).validate().unwrap_err();
        assert!(matches!(err, DispatchError::Validation { ref field, .. } if field == "events"));
    }

    #[test]
    fn test_secret_never_leaves_the_process() {
        let h = hook("https://a.b", &["*"]);
        let json = serde_json::to_value(&h).unwrap();
        assert!(json.get("secret").is_none());
        assert_eq!(json["url"], "https://a.b");
        assert!(!format!("{:?}", h).contains("whsec-123456"));

        let org = Organization {
            organization_id: "org-1".to_string(),
            name: "North".to_string(),
            auto_assign_enabled: false,
            auto_assign_radius_meters: 1_000.0,
            max_active_missions_per_collector: 2,
            webhooks: vec![h],
        };
        assert!(!serde_json::to_string(&org).unwrap().contains("whsec-123456"));
        assert!(!format!("{:?}", org).contains("whsec-123456"));
    }

    #[test]
    fn test_secret_is_accepted_on_input() {
        let h: WebhookSubscription = serde_json::from_value(serde_json::json!({
            "url": "https://a.b",
            "events": ["*"],
            "secret": "whsec-abcdefgh"
        }))
        .unwrap();
        assert_eq!(h.secret, "whsec-abcdefgh");
        assert!(h.enabled);
    }

    #[test]
    fn test_wants() {
        let mut h = hook("https://a.b", &["mission.assigned"]);
        assert!(h.wants("mission.assigned"));
        assert!(!h.wants("mission.created"));
        h.enabled = false;
        assert!(!h.wants("mission.assigned"));
        assert!(hook("https://a.b", &["*"]).wants("mission.created"));
    }
}
