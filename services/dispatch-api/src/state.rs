use binroute_crypto::PayloadSigner;
use binroute_dispatch::store::DispatchStore;
use binroute_dispatch::{DispatchService, InMemoryStore};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

use crate::auth::CredentialTable;
use crate::config::{ConfigError, ServiceConfig};
use crate::rate_limit::{InProcessRateLimiter, RateLimitStore};
use crate::webhooks::{DeliveryLog, WebhookJob, WebhookSink};

pub struct AppState {
    pub config: ServiceConfig,
    pub service: DispatchService,
    pub credentials: CredentialTable,
    pub heartbeat_limiter: Arc<dyn RateLimitStore>,
    pub deliveries: Arc<DeliveryLog>,
}

impl AppState {
    /// Wire the engine over an in-memory store and provision the seed catalog.
    ///
    /// Returns the receiving end of the webhook queue for the worker.
    pub fn new(config: ServiceConfig) -> Result<(Self, mpsc::Receiver<WebhookJob>), ConfigError> {
        let limiter = InProcessRateLimiter::new(
            config.rate_limit.max_requests,
            config.rate_limit.window_ms,
        );
        Self::with_rate_limiter(config, Arc::new(limiter))
    }

    pub fn with_rate_limiter(
        config: ServiceConfig,
        heartbeat_limiter: Arc<dyn RateLimitStore>,
    ) -> Result<(Self, mpsc::Receiver<WebhookJob>), ConfigError> {
        if config.qr_secret.is_empty() {
            return Err(ConfigError::MissingSecret);
        }
        let signer = PayloadSigner::new(config.qr_secret.expose().as_bytes())?;

        let store: Arc<dyn DispatchStore> = Arc::new(InMemoryStore::new());
        let deliveries = Arc::new(DeliveryLog::new(config.webhooks.delivery_log_capacity));
        let (tx, rx) = mpsc::channel(config.webhooks.queue_capacity.max(1));
        let sink = Arc::new(WebhookSink::new(store.clone(), tx, deliveries.clone()));
        let service = DispatchService::new(store, config.engine.clone(), signer, sink);

        for org in &config.organizations {
            service
                .provision_organization(org.clone())
                .map_err(|e| ConfigError::Provision {
                    entity: "organization",
                    id: org.organization_id.clone(),
                    reason: e.to_string(),
                })?;
        }
        for collector in &config.collectors {
            service
                .provision_collector(collector.clone())
                .map_err(|e| ConfigError::Provision {
                    entity: "collector",
                    id: collector.collector_id.clone(),
                    reason: e.to_string(),
                })?;
        }

        let credentials = CredentialTable::new(&config.credentials);
        info!(
            organizations = config.organizations.len(),
            collectors = config.collectors.len(),
            credentials = credentials.len(),
            "dispatch state ready"
        );

        Ok((
            AppState {
                config,
                service,
                credentials,
                heartbeat_limiter,
                deliveries,
            },
            rx,
        ))
    }
}
