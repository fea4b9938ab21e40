//! Configuration validation.

use super::types::{GatewayConfig, RateLimitBackend};
use tenantgate_common_log::LogLevel;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid JWT secret: must be at least 32 characters")]
    InvalidJwtSecret,

    #[error("Invalid database URL")]
    InvalidDatabaseUrl,

    #[error("Invalid port: {0}")]
    InvalidPort(u16),

    #[error("Invalid rate limit for '{0}': requests and window must be positive")]
    InvalidRateLimit(String),

    #[error("Rate limit override prefix must start with '/': {0}")]
    InvalidOverridePrefix(String),

    #[error("Redis rate limit backend requires rate_limit.redis_url")]
    MissingRedisUrl,

    #[error("Redis rate limit backend requires the `redis` feature")]
    RedisNotCompiled,

    #[error("Permission cache TTL must be positive")]
    InvalidCacheTtl,

    #[error("Webhook timeout must be positive")]
    InvalidWebhookTimeout,

    #[error("Invalid log level: {0}")]
    InvalidLogLevel(String),

    #[error("Admin token must be at least 16 characters")]
    WeakAdminToken,
}

/// Validate gateway configuration, reporting every problem found.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.auth.jwt_secret.len() < 32 {
        errors.push(ConfigError::InvalidJwtSecret);
    }

    if let Some(database) = &config.database {
        if database.url.trim().is_empty() {
            errors.push(ConfigError::InvalidDatabaseUrl);
        }
    }

    if config.server.port == 0 {
        errors.push(ConfigError::InvalidPort(0));
    }

    if config.server.admin_token.as_deref().is_some_and(|t| t.len() < 16) {
        errors.push(ConfigError::WeakAdminToken);
    }

    let rate_limit = &config.rate_limit;
    if rate_limit.max_requests == 0 || rate_limit.window_secs == 0 {
        errors.push(ConfigError::InvalidRateLimit("default".into()));
    }
    for o in &rate_limit.overrides {
        if !o.prefix.starts_with('/') {
            errors.push(ConfigError::InvalidOverridePrefix(o.prefix.clone()));
        }
        if o.max_requests == 0 || o.window_secs == 0 {
            errors.push(ConfigError::InvalidRateLimit(o.prefix.clone()));
        }
    }

    if rate_limit.backend == RateLimitBackend::Redis {
        if rate_limit.redis_url.as_deref().map_or(true, str::is_empty) {
            errors.push(ConfigError::MissingRedisUrl);
        }
        if !cfg!(feature = "redis") {
            errors.push(ConfigError::RedisNotCompiled);
        }
    }

    if config.permissions.cache_ttl_secs == 0 {
        errors.push(ConfigError::InvalidCacheTtl);
    }

    if config.webhooks.timeout_secs == 0 {
        errors.push(ConfigError::InvalidWebhookTimeout);
    }

    if LogLevel::parse(&config.logging.level).is_none() {
        errors.push(ConfigError::InvalidLogLevel(config.logging.level.clone()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
