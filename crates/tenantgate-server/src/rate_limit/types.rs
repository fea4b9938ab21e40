//! Rate limiting types.

use axum::http::{HeaderMap, HeaderName, HeaderValue};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::time::Instant;

pub const LIMIT_HEADER: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const REMAINING_HEADER: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
pub const RESET_HEADER: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// Fixed-window limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitRule {
    /// Maximum requests allowed per window.
    pub max_requests: u32,
    /// Length of the window.
    pub window: Duration,
}

impl RateLimitRule {
    pub fn new(max_requests: u32, window_secs: u64) -> Self {
        Self {
            max_requests,
            window: Duration::from_secs(window_secs),
        }
    }
}

/// Rule applied to paths starting with `prefix`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixRule {
    pub prefix: String,
    pub rule: RateLimitRule,
}

/// Default rule plus per-prefix overrides.
#[derive(Debug, Clone)]
pub struct RateLimitPolicy {
    pub default_rule: RateLimitRule,
    pub overrides: Vec<PrefixRule>,
    /// Minimum time between sweeps of expired counters.
    pub cleanup_interval: Duration,
}

impl RateLimitPolicy {
    pub fn new(default_rule: RateLimitRule) -> Self {
        Self {
            default_rule,
            overrides: Vec::new(),
            cleanup_interval: Duration::from_secs(60),
        }
    }

    pub fn with_override(mut self, prefix: impl Into<String>, rule: RateLimitRule) -> Self {
        self.overrides.push(PrefixRule {
            prefix: prefix.into(),
            rule,
        });
        self
    }

    pub fn with_cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }

    /// First override whose prefix matches, else the default.
    pub fn rule_for(&self, path: &str) -> RateLimitRule {
        self.overrides
            .iter()
            .find(|o| path.starts_with(&o.prefix))
            .map(|o| o.rule)
            .unwrap_or(self.default_rule)
    }
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self::new(RateLimitRule::new(100, 60))
            .with_override("/api/reports", RateLimitRule::new(30, 60))
            .with_override("/api/export", RateLimitRule::new(10, 60))
    }
}

/// Requests counted in the current window of one key.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitCounter {
    pub count: u32,
    pub reset_at: Instant,
}

impl RateLimitCounter {
    /// Counter for a window opened by one request at `now`.
    pub fn open(rule: &RateLimitRule, now: Instant) -> Self {
        Self {
            count: 1,
            reset_at: now + rule.window,
        }
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now > self.reset_at
    }
}

/// Outcome of a rate limit check.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    pub reset_at: Instant,
}

impl RateLimitDecision {
    /// Time left in the current window.
    pub fn reset_after(&self) -> Duration {
        self.reset_at.saturating_duration_since(Instant::now())
    }

    /// Whole seconds a rejected caller should wait, at least one.
    pub fn retry_after_secs(&self) -> u64 {
        let after = self.reset_after();
        let secs = after.as_secs() + u64::from(after.subsec_nanos() > 0);
        secs.max(1)
    }

    pub fn headers(&self) -> RateLimitHeaders {
        let reset = SystemTime::now() + self.reset_after();
        RateLimitHeaders {
            limit: self.limit,
            remaining: self.remaining,
            reset: reset
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or_default(),
        }
    }
}

/// Values of the `X-RateLimit-*` response headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitHeaders {
    pub limit: u32,
    pub remaining: u32,
    /// Unix time, in seconds, at which the window resets.
    pub reset: u64,
}

impl RateLimitHeaders {
    pub fn apply(&self, headers: &mut HeaderMap) {
        headers.insert(LIMIT_HEADER, HeaderValue::from(self.limit));
        headers.insert(REMAINING_HEADER, HeaderValue::from(self.remaining));
        headers.insert(RESET_HEADER, HeaderValue::from(self.reset));
    }
}
