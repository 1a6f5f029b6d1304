//! Outbound webhook fan-out
//!
//! [`WebhookSink`] turns lifecycle events into delivery jobs on a bounded queue;
//! [`run_worker`] drains the queue and POSTs each job. A full queue drops the
//! job. Every outcome lands in the [`DeliveryLog`].

use binroute_crypto::sign_webhook_body;
use binroute_dispatch::store::DispatchStore;
use binroute_dispatch::{EventSink, LifecycleEvent};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Signature header carried by every delivery
pub const SIGNATURE_HEADER: &str = "X-Binroute-Signature";
/// Event name header
pub const EVENT_HEADER: &str = "X-Binroute-Event";

/// One queued delivery
#[derive(Debug, Clone)]
pub struct WebhookJob {
    pub event_id: String,
    pub event_type: &'static str,
    pub organization_id: String,
    pub url: String,
    pub body: Vec<u8>,
    /// Precomputed `sha256=<hex>` header value
    pub signature: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryOutcome {
    Delivered,
    Failed,
    Dropped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryRecord {
    pub event_id: String,
    pub event_type: String,
    pub organization_id: String,
    pub url: String,
    pub outcome: DeliveryOutcome,
    pub http_status: Option<u16>,
    pub error: Option<String>,
    pub attempted_at: u64,
}

impl DeliveryRecord {
    fn for_job(job: &WebhookJob, outcome: DeliveryOutcome, attempted_at: u64) -> Self {
        Self {
            event_id: job.event_id.clone(),
            event_type: job.event_type.to_string(),
            organization_id: job.organization_id.clone(),
            url: job.url.clone(),
            outcome,
            http_status: None,
            error: None,
            attempted_at,
        }
    }
}

/// Bounded ring of recent delivery outcomes
#[derive(Debug)]
pub struct DeliveryLog {
    capacity: usize,
    records: Mutex<VecDeque<DeliveryRecord>>,
}

impl DeliveryLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            records: Mutex::new(VecDeque::new()),
        }
    }

    pub fn record(&self, record: DeliveryRecord) {
        let mut records = self.records.lock();
        if records.len() == self.capacity {
            records.pop_front();
        }
        records.push_back(record);
    }

    /// Newest first, optionally scoped to one organization
    pub fn recent(&self, organization_id: Option<&str>) -> Vec<DeliveryRecord> {
        self.records
            .lock()
            .iter()
            .rev()
            .filter(|r| organization_id.map_or(true, |org| r.organization_id == org))
            .cloned()
            .collect()
    }
}

/// Event sink feeding the delivery queue
pub struct WebhookSink {
    store: Arc<dyn DispatchStore>,
    queue: mpsc::Sender<WebhookJob>,
    log: Arc<DeliveryLog>,
}

impl WebhookSink {
    pub fn new(
        store: Arc<dyn DispatchStore>,
        queue: mpsc::Sender<WebhookJob>,
        log: Arc<DeliveryLog>,
    ) -> Self {
        Self { store, queue, log }
    }

    fn jobs_for(&self, event: &LifecycleEvent) -> Vec<WebhookJob> {
        let organization = match self.store.get_organization(&event.organization_id) {
            Ok(org) => org,
            Err(e) => {
                warn!(organization_id = %event.organization_id, error = %e, "webhook lookup failed");
                return Vec::new();
            }
        };
        let body = match serde_json::to_vec(event) {
            Ok(body) => body,
            Err(e) => {
                warn!(event_id = %event.event_id, error = %e, "failed to encode webhook body");
                return Vec::new();
            }
        };
        let name = event.event_type.as_str();
        organization
            .webhooks
            .iter()
            .filter(|hook| hook.wants(name))
            .map(|hook| WebhookJob {
                event_id: event.event_id.clone(),
                event_type: name,
                organization_id: event.organization_id.clone(),
                url: hook.url.clone(),
                signature: sign_webhook_body(hook.secret.as_bytes(), &body),
                body: body.clone(),
            })
            .collect()
    }
}

impl EventSink for WebhookSink {
    fn emit(&self, event: &LifecycleEvent) {
        for job in self.jobs_for(event) {
            match self.queue.try_send(job) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(job)) => {
                    warn!(event_id = %job.event_id, url = %job.url, "webhook queue full, dropping delivery");
                    let mut record =
                        DeliveryRecord::for_job(&job, DeliveryOutcome::Dropped, event.occurred_at);
                    record.error = Some("queue full".to_string());
                    self.log.record(record);
                }
                Err(mpsc::error::TrySendError::Closed(job)) => {
                    warn!(event_id = %job.event_id, "webhook worker stopped, dropping delivery");
                    let mut record =
                        DeliveryRecord::for_job(&job, DeliveryOutcome::Dropped, event.occurred_at);
                    record.error = Some("worker stopped".to_string());
                    self.log.record(record);
                }
            }
        }
    }
}

/// HTTP client used by the worker
pub fn build_client(timeout_ms: u64) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_millis(timeout_ms))
        .build()
}

/// POST one job and describe the outcome
pub async fn deliver(client: &reqwest::Client, job: &WebhookJob, now: u64) -> DeliveryRecord {
    let result = client
        .post(&job.url)
        .header(reqwest::header::CONTENT_TYPE, "application/json")
        .header(SIGNATURE_HEADER, &job.signature)
        .header(EVENT_HEADER, job.event_type)
        .body(job.body.clone())
        .send()
        .await;

    match result {
        Ok(response) => {
            let status = response.status();
            let outcome = if status.is_success() {
                DeliveryOutcome::Delivered
            } else {
                DeliveryOutcome::Failed
            };
            let mut record = DeliveryRecord::for_job(job, outcome, now);
            record.http_status = Some(status.as_u16());
            if !status.is_success() {
                record.error = Some(format!("subscriber answered {}", status));
            }
            record
        }
        Err(e) => {
            let mut record = DeliveryRecord::for_job(job, DeliveryOutcome::Failed, now);
            record.error = Some(e.to_string());
            record
        }
    }
}

/// Drain the queue until every sender is gone
pub async fn run_worker(
    mut queue: mpsc::Receiver<WebhookJob>,
    client: reqwest::Client,
    log: Arc<DeliveryLog>,
) {
    info!("webhook worker started");
    while let Some(job) = queue.recv().await {
        let record = deliver(&client, &job, binroute_core::now_ms()).await;
        match record.outcome {
            DeliveryOutcome::Delivered => debug!(
                event_id = %record.event_id,
                url = %record.url,
                status = ?record.http_status,
                "webhook delivered"
            ),
            _ => warn!(
                event_id = %record.event_id,
                url = %record.url,
                status = ?record.http_status,
                error = ?record.error,
                "webhook delivery failed"
            ),
        }
        log.record(record);
    }
    info!("webhook worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use binroute_dispatch::model::{Mission, Organization, WebhookSubscription};
    use binroute_dispatch::store::OrganizationRepository;
    use binroute_dispatch::{EventType, InMemoryStore};

    fn store_with_hooks(hooks: Vec<WebhookSubscription>) -> Arc<dyn DispatchStore> {
        let store = InMemoryStore::new();
        store
            .put_organization(Organization {
                organization_id: "org-1".to_string(),
                name: "North".to_string(),
                auto_assign_enabled: true,
                auto_assign_radius_meters: 1_000.0,
                max_active_missions_per_collector: 3,
                webhooks: hooks,
            })
            .unwrap();
        Arc::new(store)
    }

    fn hook(url: &str, events: &[&str]) -> WebhookSubscription {
        WebhookSubscription {
            url: url.to_string(),
            events: events.iter().map(|e| e.to_string()).collect(),
            secret: "whsec-test".to_string(),
            enabled: true,
        }
    }

    fn event() -> LifecycleEvent {
        let mission = Mission::new("m-1", "c-1", "org-1", 5);
        LifecycleEvent::for_mission(EventType::MissionCreated, &mission, None, "admin", 5)
    }

    #[test]
    fn test_fan_out_respects_subscriptions() {
        let (tx, mut rx) = mpsc::channel(8);
        let log = Arc::new(DeliveryLog::new(8));
        let sink = WebhookSink::new(
            store_with_hooks(vec![
                hook("https://a.example/hook", &["*"]),
                hook("https://b.example/hook", &["mission.assigned"]),
            ]),
            tx,
            log,
        );
        sink.emit(&event());

        let job = rx.try_recv().unwrap();
        assert_eq!(job.url, "https://a.example/hook");
        assert_eq!(job.signature, sign_webhook_body(b"whsec-test", &job.body));
        let body: serde_json::Value = serde_json::from_slice(&job.body).unwrap();
        assert_eq!(body["eventType"], "mission.created");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_full_queue_drops_and_records() {
        let (tx, _rx) = mpsc::channel(1);
        let log = Arc::new(DeliveryLog::new(8));
        let sink = WebhookSink::new(
            store_with_hooks(vec![
                hook("https://a.example/hook", &["*"]),
                hook("https://b.example/hook", &["*"]),
            ]),
            tx,
            log.clone(),
        );
        sink.emit(&event());

        let recent = log.recent(Some("org-1"));
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].outcome, DeliveryOutcome::Dropped);
        assert_eq!(recent[0].url, "https://b.example/hook");
    }

    #[test]
    fn test_delivery_log_is_bounded() {
        let log = DeliveryLog::new(2);
        let job = WebhookJob {
            event_id: "e".to_string(),
            event_type: "mission.created",
            organization_id: "org-1".to_string(),
            url: "https://x".to_string(),
            body: Vec::new(),
            signature: String::new(),
        };
        for at in 0..3 {
            log.record(DeliveryRecord::for_job(&job, DeliveryOutcome::Delivered, at));
        }
        let recent = log.recent(None);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].attempted_at, 2);
        assert!(log.recent(Some("org-2")).is_empty());
    }
}
