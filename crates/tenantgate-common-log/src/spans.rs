//! Tracing spans for gateway requests and collaborator calls.

use std::future::Future;
use tracing::{info_span, Instrument, Span};

/// Span covering one gateway request.
///
/// `identity` and `tenant` start empty and are recorded once resolved.
pub fn request_span(method: &str, path: &str) -> Span {
    info_span!(
        "gateway_request",
        method = %method,
        path = %path,
        identity = tracing::field::Empty,
        tenant = tracing::field::Empty,
    )
}

/// Span for a call into an external store.
pub fn store_span(store: &str, operation: &str) -> Span {
    info_span!("store", name = %store, op = %operation)
}

/// Span for an outbound webhook delivery.
pub fn webhook_span(event: &str, url: &str) -> Span {
    info_span!("webhook_delivery", event = %event, url = %url)
}

/// Instrument a future with a span.
pub fn instrument_future<F: Future>(future: F, span: Span) -> impl Future<Output = F::Output> {
    future.instrument(span)
}

/// Record an error on the current span.
pub fn record_error(error: &dyn std::error::Error) {
    Span::current().record("error", tracing::field::display(error));
}

/// Timing utility for operations.
pub struct Timer {
    start: std::time::Instant,
    operation: &'static str,
}

impl Timer {
    /// Start a new timer.
    pub fn start(operation: &'static str) -> Self {
        Self {
            start: std::time::Instant::now(),
            operation,
        }
    }

    /// Complete the timer and record duration.
    pub fn finish(self) -> std::time::Duration {
        let duration = self.start.elapsed();
        tracing::debug!(
            operation = %self.operation,
            duration_ms = %duration.as_millis(),
            "operation completed"
        );
        duration
    }
}

/// Macro for timing a block of code.
#[macro_export]
macro_rules! timed {
    ($name:expr, $body:expr) => {{
        let _timer = $crate::spans::Timer::start($name);
        let result = $body;
        _timer.finish();
        result
    }};
}
