//! Prometheus counters for the gateway pipeline.
//!
//! With the `metrics` feature disabled every recorder is a no-op and
//! [`render`] returns an empty exposition.

#[cfg(feature = "metrics")]
mod enabled {
    use once_cell::sync::Lazy;
    use prometheus::core::Collector;
    use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

    static REGISTRY: Lazy<Registry> =
        Lazy::new(|| Registry::new_custom(Some("tenantgate".into()), None).unwrap_or_default());

    fn register<C: Collector + Clone + 'static>(metric: prometheus::Result<C>) -> Option<C> {
        let metric = metric.ok()?;
        if let Err(err) = REGISTRY.register(Box::new(metric.clone())) {
            tracing::warn!(error = %err, "Metric registration failed");
        }
        Some(metric)
    }

    static REQUESTS: Lazy<Option<IntCounterVec>> = Lazy::new(|| {
        register(IntCounterVec::new(
            Opts::new("gateway_requests_total", "Gateway requests by outcome"),
            &["outcome"],
        ))
    });

    static PERMISSION_LOOKUPS: Lazy<Option<IntCounterVec>> = Lazy::new(|| {
        register(IntCounterVec::new(
            Opts::new("permission_cache_lookups_total", "Permission cache lookups"),
            &["result"],
        ))
    });

    static RATE_LIMITED: Lazy<Option<IntCounter>> = Lazy::new(|| {
        register(IntCounter::new("rate_limited_total", "Requests rejected by the rate limiter"))
    });

    static WEBHOOK_DELIVERIES: Lazy<Option<IntCounterVec>> = Lazy::new(|| {
        register(IntCounterVec::new(
            Opts::new("webhook_deliveries_total", "Webhook delivery attempts"),
            &["result"],
        ))
    });

    static AUDIT_FAILURES: Lazy<Option<IntCounter>> = Lazy::new(|| {
        register(IntCounter::new("audit_write_failures_total", "Audit entries that failed to persist"))
    });

    fn inc(counter: &Lazy<Option<IntCounterVec>>, label: &str) {
        if let Some(counter) = counter.as_ref() {
            counter.with_label_values(&[label]).inc();
        }
    }

    /// Count a finished gateway request under `outcome` (`ok` or an error code).
    pub fn record_outcome(outcome: &str) {
        inc(&REQUESTS, outcome);
    }

    pub fn record_permission_lookup(hit: bool) {
        inc(&PERMISSION_LOOKUPS, if hit { "hit" } else { "miss" });
    }

    pub fn record_rate_limited() {
        if let Some(counter) = RATE_LIMITED.as_ref() {
            counter.inc();
        }
    }

    pub fn record_webhook_delivery(success: bool) {
        inc(&WEBHOOK_DELIVERIES, if success { "success" } else { "failure" });
    }

    pub fn record_audit_failure() {
        if let Some(counter) = AUDIT_FAILURES.as_ref() {
            counter.inc();
        }
    }

    /// Text exposition of every gateway metric.
    pub fn render() -> String {
        // Touch every metric so the exposition lists them from the start.
        for vec in [&REQUESTS, &PERMISSION_LOOKUPS, &WEBHOOK_DELIVERIES] {
            Lazy::force(vec);
        }
        Lazy::force(&RATE_LIMITED);
        Lazy::force(&AUDIT_FAILURES);

        let mut buffer = Vec::new();
        if TextEncoder::new().encode(&REGISTRY.gather(), &mut buffer).is_err() {
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

#[cfg(not(feature = "metrics"))]
mod disabled {
    pub fn record_outcome(_outcome: &str) {}
    pub fn record_permission_lookup(_hit: bool) {}
    pub fn record_rate_limited() {}
    pub fn record_webhook_delivery(_success: bool) {}
    pub fn record_audit_failure() {}

    pub fn render() -> String {
        String::new()
    }
}

#[cfg(feature = "metrics")]
pub use enabled::*;

#[cfg(not(feature = "metrics"))]
pub use disabled::*;
