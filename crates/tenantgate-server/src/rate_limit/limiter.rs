//! Fixed-window rate limiter keyed by identity and path.

use super::store::RateLimitStore;
use super::types::{RateLimitDecision, RateLimitHeaders, RateLimitPolicy};
use crate::auth::Identity;
use crate::error::ApiResult;
use crate::metrics;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Applies a [`RateLimitPolicy`] over a counter store.
pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
    policy: RateLimitPolicy,
    last_sweep: Mutex<Instant>,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn RateLimitStore>, policy: RateLimitPolicy) -> Self {
        Self {
            store,
            policy,
            last_sweep: Mutex::new(Instant::now()),
        }
    }

    pub fn policy(&self) -> &RateLimitPolicy {
        &self.policy
    }

    fn key(identity: &Identity, path: &str) -> String {
        format!("{}:{}", identity.id, path)
    }

    /// Count one request by `identity` on `path`.
    ///
    /// Denial is a normal decision, not an error. Store failures are errors.
    pub async fn check_rate_limit(&self, identity: &Identity, path: &str) -> ApiResult<RateLimitDecision> {
        self.maybe_sweep().await;

        let rule = self.policy.rule_for(path);
        let decision = self
            .store
            .check_and_consume(&Self::key(identity, path), &rule)
            .await?;

        if !decision.allowed {
            metrics::record_rate_limited();
            warn!(
                identity = %identity.id,
                path,
                limit = decision.limit,
                "Rate limit exceeded"
            );
        }

        Ok(decision)
    }

    /// Header values for `identity` on `path`, without counting a request.
    pub async fn rate_limit_headers(&self, identity: &Identity, path: &str) -> ApiResult<RateLimitHeaders> {
        let rule = self.policy.rule_for(path);
        let decision = self.store.peek(&Self::key(identity, path), &rule).await?;
        Ok(decision.headers())
    }

    /// Sweep expired counters, at most once per cleanup interval.
    async fn maybe_sweep(&self) {
        let now = Instant::now();
        let due = {
            let mut last = self.last_sweep.lock();
            if now.duration_since(*last) >= self.policy.cleanup_interval {
                *last = now;
                true
            } else {
                false
            }
        };

        if due {
            let removed = self.store.sweep().await;
            debug!(removed, "Swept expired rate limit counters");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate_limit::{InMemoryStore, RateLimitRule};
    use std::time::Duration;
    use uuid::Uuid;

    fn identity() -> Identity {
        Identity::new(Uuid::new_v4(), None)
    }

    #[tokio::test(start_paused = true)]
    async fn test_reporting_prefix_denies_31st_call() {
        let limiter = RateLimiter::new(Arc::new(InMemoryStore::new()), RateLimitPolicy::default());
        let caller = identity();

        for call in 1..=30 {
            let d = limiter.check_rate_limit(&caller, "/api/reports/sales").await.unwrap();
            assert!(d.allowed, "call {} should pass", call);
        }

        let denied = limiter.check_rate_limit(&caller, "/api/reports/sales").await.unwrap();
        assert!(!denied.allowed);
        assert!(denied.reset_after() <= Duration::from_secs(60));
        assert!(denied.retry_after_secs() <= 60);
    }

    #[tokio::test(start_paused = true)]
    async fn test_paths_and_identities_are_counted_separately() {
        let policy = RateLimitPolicy::new(RateLimitRule::new(1, 60));
        let limiter = RateLimiter::new(Arc::new(InMemoryStore::new()), policy);
        let alice = identity();
        let bob = identity();

        assert!(limiter.check_rate_limit(&alice, "/api/a").await.unwrap().allowed);
        assert!(!limiter.check_rate_limit(&alice, "/api/a").await.unwrap().allowed);
        assert!(limiter.check_rate_limit(&alice, "/api/b").await.unwrap().allowed);
        assert!(limiter.check_rate_limit(&bob, "/api/a").await.unwrap().allowed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_headers_do_not_consume() {
        let limiter = RateLimiter::new(Arc::new(InMemoryStore::new()), RateLimitPolicy::default());
        let caller = identity();

        limiter.check_rate_limit(&caller, "/api/export").await.unwrap();
        let first = limiter.rate_limit_headers(&caller, "/api/export").await.unwrap();
        let second = limiter.rate_limit_headers(&caller, "/api/export").await.unwrap();

        assert_eq!(first.limit, 10);
        assert_eq!(first.remaining, 9);
        assert_eq!(second.remaining, 9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_runs_after_cleanup_interval() {
        let store = Arc::new(InMemoryStore::new());
        let policy = RateLimitPolicy::new(RateLimitRule::new(10, 5))
            .with_cleanup_interval(Duration::from_secs(60));
        let limiter = RateLimiter::new(store.clone(), policy);

        limiter.check_rate_limit(&identity(), "/api/a").await.unwrap();
        limiter.check_rate_limit(&identity(), "/api/b").await.unwrap();
        assert_eq!(store.len(), 2);

        tokio::time::advance(Duration::from_secs(30)).await;
        limiter.check_rate_limit(&identity(), "/api/c").await.unwrap();
        assert_eq!(store.len(), 3);

        tokio::time::advance(Duration::from_secs(31)).await;
        limiter.check_rate_limit(&identity(), "/api/d").await.unwrap();
        assert_eq!(store.len(), 1);
    }
}
