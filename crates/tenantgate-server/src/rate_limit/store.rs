//! Rate limit counter storage.

use super::types::{RateLimitCounter, RateLimitDecision, RateLimitRule};
use crate::store::StoreResult;
use async_trait::async_trait;
use dashmap::{mapref::entry::Entry, DashMap};
use tokio::time::Instant;

/// Counter storage for the fixed-window limiter.
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    /// Count one request against `key` if the window has room.
    ///
    /// A denied request leaves the counter untouched.
    async fn check_and_consume(&self, key: &str, rule: &RateLimitRule) -> StoreResult<RateLimitDecision>;

    /// Current state of `key` without counting a request.
    async fn peek(&self, key: &str, rule: &RateLimitRule) -> StoreResult<RateLimitDecision>;

    /// Drop expired counters, returning how many were removed.
    async fn sweep(&self) -> usize;
}

/// Single-process counter store.
#[derive(Default)]
pub struct InMemoryStore {
    counters: DashMap<String, RateLimitCounter>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.counters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }
}

fn decision(rule: &RateLimitRule, counter: &RateLimitCounter, allowed: bool) -> RateLimitDecision {
    RateLimitDecision {
        allowed,
        limit: rule.max_requests,
        remaining: rule.max_requests.saturating_sub(counter.count),
        reset_at: counter.reset_at,
    }
}

#[async_trait]
impl RateLimitStore for InMemoryStore {
    async fn check_and_consume(&self, key: &str, rule: &RateLimitRule) -> StoreResult<RateLimitDecision> {
        let now = Instant::now();

        // The entry guard holds the shard lock for the whole read-modify-write.
        let result = match self.counters.entry(key.to_string()) {
            Entry::Vacant(vacant) => {
                let counter = RateLimitCounter::open(rule, now);
                vacant.insert(counter);
                decision(rule, &counter, true)
            }
            Entry::Occupied(mut occupied) => {
                let counter = occupied.get_mut();
                if counter.is_expired(now) {
                    *counter = RateLimitCounter::open(rule, now);
                    decision(rule, counter, true)
                } else if counter.count >= rule.max_requests {
                    decision(rule, counter, false)
                } else {
                    counter.count += 1;
                    decision(rule, counter, true)
                }
            }
        };

        Ok(result)
    }

    async fn peek(&self, key: &str, rule: &RateLimitRule) -> StoreResult<RateLimitDecision> {
        let now = Instant::now();
        let current = self
            .counters
            .get(key)
            .map(|c| *c.value())
            .filter(|c| !c.is_expired(now));

        Ok(match current {
            Some(counter) => decision(rule, &counter, counter.count < rule.max_requests),
            None => RateLimitDecision {
                allowed: true,
                limit: rule.max_requests,
                remaining: rule.max_requests,
                reset_at: now + rule.window,
            },
        })
    }

    async fn sweep(&self) -> usize {
        let now = Instant::now();
        let before = self.counters.len();
        self.counters.retain(|_, counter| !counter.is_expired(now));
        before.saturating_sub(self.counters.len())
    }
}

/// Counters shared between gateway instances through Redis.
#[cfg(feature = "redis")]
pub struct RedisStore {
    client: redis::Client,
    prefix: String,
    script: redis::Script,
}

#[cfg(feature = "redis")]
const CONSUME_SCRIPT: &str = r#"
local current = tonumber(redis.call('GET', KEYS[1]) or '0')
if current >= tonumber(ARGV[2]) then
    return {current, redis.call('PTTL', KEYS[1]), 0}
end
current = redis.call('INCR', KEYS[1])
if current == 1 then
    redis.call('PEXPIRE', KEYS[1], ARGV[1])
end
return {current, redis.call('PTTL', KEYS[1]), 1}
"#;

#[cfg(feature = "redis")]
impl RedisStore {
    pub fn new(redis_url: &str, prefix: &str) -> Result<Self, redis::RedisError> {
        Ok(Self {
            client: redis::Client::open(redis_url)?,
            prefix: prefix.to_string(),
            script: redis::Script::new(CONSUME_SCRIPT),
        })
    }

    fn redis_key(&self, key: &str) -> String {
        format!("{}:{}", self.prefix, key)
    }

    async fn connection(&self) -> StoreResult<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(unavailable)
    }
}

#[cfg(feature = "redis")]
fn unavailable(err: redis::RedisError) -> crate::store::StoreError {
    crate::store::StoreError::Unavailable(err.to_string())
}

#[cfg(feature = "redis")]
fn reset_from_pttl(pttl_ms: i64, rule: &RateLimitRule, now: Instant) -> Instant {
    if pttl_ms > 0 {
        now + std::time::Duration::from_millis(pttl_ms as u64)
    } else {
        now + rule.window
    }
}

#[cfg(feature = "redis")]
#[async_trait]
impl RateLimitStore for RedisStore {
    async fn check_and_consume(&self, key: &str, rule: &RateLimitRule) -> StoreResult<RateLimitDecision> {
        let mut conn = self.connection().await?;
        let (count, pttl, allowed): (u32, i64, u8) = self
            .script
            .key(self.redis_key(key))
            .arg(rule.window.as_millis() as u64)
            .arg(rule.max_requests)
            .invoke_async(&mut conn)
            .await
            .map_err(unavailable)?;

        let counter = RateLimitCounter {
            count,
            reset_at: reset_from_pttl(pttl, rule, Instant::now()),
        };
        Ok(decision(rule, &counter, allowed == 1))
    }

    async fn peek(&self, key: &str, rule: &RateLimitRule) -> StoreResult<RateLimitDecision> {
        let mut conn = self.connection().await?;
        let redis_key = self.redis_key(key);
        let (count, pttl): (Option<u32>, i64) = redis::pipe()
            .cmd("GET")
            .arg(&redis_key)
            .cmd("PTTL")
            .arg(&redis_key)
            .query_async(&mut conn)
            .await
            .map_err(unavailable)?;

        let counter = RateLimitCounter {
            count: count.unwrap_or(0),
            reset_at: reset_from_pttl(pttl, rule, Instant::now()),
        };
        Ok(decision(rule, &counter, counter.count < rule.max_requests))
    }

    async fn sweep(&self) -> usize {
        // Keys expire server-side.
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn rule() -> RateLimitRule {
        RateLimitRule::new(3, 60)
    }

    #[tokio::test(start_paused = true)]
    async fn test_allows_up_to_max_then_denies() {
        let store = InMemoryStore::new();

        for expected_remaining in [2, 1, 0] {
            let d = store.check_and_consume("u:/api/x", &rule()).await.unwrap();
            assert!(d.allowed);
            assert_eq!(d.remaining, expected_remaining);
        }

        let denied = store.check_and_consume("u:/api/x", &rule()).await.unwrap();
        assert!(!denied.allowed);
        assert_eq!(denied.remaining, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_denial_does_not_extend_window() {
        let store = InMemoryStore::new();
        let first = store.check_and_consume("k", &RateLimitRule::new(1, 60)).await.unwrap();

        tokio::time::advance(Duration::from_secs(30)).await;
        let denied = store.check_and_consume("k", &RateLimitRule::new(1, 60)).await.unwrap();

        assert!(!denied.allowed);
        assert_eq!(denied.reset_at, first.reset_at);
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_resets_after_expiry() {
        let store = InMemoryStore::new();
        for _ in 0..3 {
            store.check_and_consume("k", &rule()).await.unwrap();
        }
        assert!(!store.check_and_consume("k", &rule()).await.unwrap().allowed);

        tokio::time::advance(Duration::from_secs(60) + Duration::from_millis(1)).await;

        let fresh = store.check_and_consume("k", &rule()).await.unwrap();
        assert!(fresh.allowed);
        assert_eq!(fresh.remaining, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_keys_are_independent() {
        let store = InMemoryStore::new();
        let tight = RateLimitRule::new(1, 60);

        assert!(store.check_and_consume("a", &tight).await.unwrap().allowed);
        assert!(!store.check_and_consume("a", &tight).await.unwrap().allowed);
        assert!(store.check_and_consume("b", &tight).await.unwrap().allowed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_peek_does_not_count() {
        let store = InMemoryStore::new();
        store.check_and_consume("k", &rule()).await.unwrap();

        for _ in 0..5 {
            let peeked = store.peek("k", &rule()).await.unwrap();
            assert_eq!(peeked.remaining, 2);
        }

        let untouched = store.peek("other", &rule()).await.unwrap();
        assert_eq!(untouched.remaining, 3);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_removes_only_expired() {
        let store = InMemoryStore::new();
        store.check_and_consume("old", &RateLimitRule::new(5, 10)).await.unwrap();
        store.check_and_consume("young", &RateLimitRule::new(5, 120)).await.unwrap();

        tokio::time::advance(Duration::from_secs(11)).await;

        assert_eq!(store.sweep().await, 1);
        assert_eq!(store.len(), 1);
        assert!(store.peek("young", &rule()).await.unwrap().remaining < 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_consumers_never_exceed_limit() {
        let store = std::sync::Arc::new(InMemoryStore::new());
        let rule = RateLimitRule::new(50, 60);

        let handles: Vec<_> = (0..200)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.check_and_consume("shared", &rule).await.unwrap().allowed })
            })
            .collect();

        let mut allowed = 0;
        for handle in handles {
            if handle.await.unwrap() {
                allowed += 1;
            }
        }
        assert_eq!(allowed, 50);
    }
}
