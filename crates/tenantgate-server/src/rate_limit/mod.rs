//! Per-identity request throttling.

pub mod limiter;
pub mod store;
pub mod types;

pub use limiter::RateLimiter;
#[cfg(feature = "redis")]
pub use store::RedisStore;
pub use store::{InMemoryStore, RateLimitStore};
pub use types::{
    PrefixRule, RateLimitCounter, RateLimitDecision, RateLimitHeaders, RateLimitPolicy, RateLimitRule,
};
