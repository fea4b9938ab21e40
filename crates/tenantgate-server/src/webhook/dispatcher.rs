//! Fan-out of gateway events to tenant webhooks.

use super::transport::WebhookTransport;
use super::types::WebhookPayload;
use crate::auth::TenantContext;
use crate::metrics;
use crate::store::WebhookStore;
use serde_json::Value;
use std::sync::Arc;
use tenantgate_common_log::spans::webhook_span;
use tracing::{debug, warn, Instrument};
use url::Url;

/// Delivers events to the active registrations of a tenant.
///
/// Deliveries run detached: the caller never waits on an endpoint, and a
/// failed delivery is logged, not retried.
pub struct WebhookDispatcher {
    store: Arc<dyn WebhookStore>,
    transport: Arc<dyn WebhookTransport>,
}

impl WebhookDispatcher {
    pub fn new(store: Arc<dyn WebhookStore>, transport: Arc<dyn WebhookTransport>) -> Self {
        Self { store, transport }
    }

    /// Start one delivery per subscribed registration.
    ///
    /// Returns the number of deliveries started. Lookup failures and
    /// unparseable URLs start nothing.
    pub async fn trigger(&self, ctx: &TenantContext, event: &str, data: Value) -> usize {
        let Some(tenant_id) = ctx.tenant_id else {
            return 0;
        };

        let registrations = match self.store.active_registrations(tenant_id, event).await {
            Ok(registrations) => registrations,
            Err(err) => {
                warn!(error = %err, tenant = %tenant_id, event, "Webhook lookup failed");
                return 0;
            }
        };

        let payload = Arc::new(WebhookPayload::new(event, data));
        let mut started = 0;

        for registration in registrations
            .into_iter()
            .filter(|r| r.active && r.tenant_id == tenant_id && r.subscribes_to(event))
        {
            let url = match Url::parse(&registration.url) {
                Ok(url) => url,
                Err(err) => {
                    warn!(webhook = %registration.id, error = %err, "Skipping webhook with invalid URL");
                    continue;
                }
            };

            let transport = self.transport.clone();
            let payload = payload.clone();
            let span = webhook_span(event, url.as_str());
            let webhook_id = registration.id;

            tokio::spawn(
                async move {
                    match transport.deliver(&url, &payload).await {
                        Ok(()) => {
                            metrics::record_webhook_delivery(true);
                            debug!(webhook = %webhook_id, "Webhook delivered");
                        }
                        Err(err) => {
                            metrics::record_webhook_delivery(false);
                            warn!(webhook = %webhook_id, error = %err, "Webhook delivery failed");
                        }
                    }
                }
                .instrument(span),
            );
            started += 1;
        }

        debug!(tenant = %tenant_id, event, started, "Webhooks triggered");
        started
    }
}
