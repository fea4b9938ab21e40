//! Gateway configuration types.

use crate::db::DbConfig;
use crate::rate_limit::{RateLimitPolicy, RateLimitRule};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tenantgate_common_log::{LogConfig, LogFormat, LogLevel};

/// Main gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Server binding configuration.
    pub server: ServerBindConfig,
    /// Postgres stores. Without it the gateway runs on the memory store.
    #[serde(default)]
    pub database: Option<DbConfig>,
    /// Memory store settings, used when no database is configured.
    #[serde(default)]
    pub memory_store: MemoryStoreConfig,
    /// Authentication configuration.
    pub auth: AuthConfig,
    /// Rate limiting configuration.
    pub rate_limit: RateLimitConfig,
    /// Permission cache configuration.
    #[serde(default)]
    pub permissions: PermissionsConfig,
    /// Webhook delivery configuration.
    #[serde(default)]
    pub webhooks: WebhooksConfig,
    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Server binding configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerBindConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to bind to.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Request timeout.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Maximum request body size.
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
    /// Shared secret for `/internal/admin`. Admin routes are disabled when unset.
    #[serde(default)]
    pub admin_token: Option<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_request_timeout() -> u64 {
    30
}

fn default_body_limit() -> usize {
    2 * 1024 * 1024
}

impl ServerBindConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Memory store configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryStoreConfig {
    /// JSON file with memberships, permissions and webhooks to preload.
    pub seed_path: Option<PathBuf>,
}

/// Authentication configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HS256 secret shared with the identity provider.
    pub jwt_secret: String,
    /// Clock skew tolerated on `exp`.
    #[serde(default)]
    pub leeway_secs: u64,
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Requests per window when no override matches.
    #[serde(default = "default_rate_limit")]
    pub max_requests: u32,
    /// Window length.
    #[serde(default = "default_rate_window")]
    pub window_secs: u64,
    /// Per-prefix overrides, first match wins.
    #[serde(default)]
    pub overrides: Vec<RateLimitOverride>,
    /// Minimum time between sweeps of expired counters.
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_secs: u64,
    /// Counter backend.
    #[serde(default)]
    pub backend: RateLimitBackend,
    /// Redis URL for the `redis` backend.
    pub redis_url: Option<String>,
}

fn default_rate_limit() -> u32 {
    100
}

fn default_rate_window() -> u64 {
    60
}

fn default_cleanup_interval() -> u64 {
    60
}

/// Limit applied to paths under `prefix`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitOverride {
    pub prefix: String,
    pub max_requests: u32,
    pub window_secs: u64,
}

/// Where rate limit counters live.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RateLimitBackend {
    #[default]
    Memory,
    Redis,
}

impl RateLimitConfig {
    pub fn policy(&self) -> RateLimitPolicy {
        self.overrides.iter().fold(
            RateLimitPolicy::new(RateLimitRule::new(self.max_requests, self.window_secs))
                .with_cleanup_interval(Duration::from_secs(self.cleanup_interval_secs)),
            |policy, o| policy.with_override(o.prefix.clone(), RateLimitRule::new(o.max_requests, o.window_secs)),
        )
    }
}

/// Permission cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionsConfig {
    /// Lifetime of a cached permission set.
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,
    /// Role allowed everything without records. Empty disables the bypass.
    #[serde(default = "default_admin_role")]
    pub admin_role: String,
}

fn default_cache_ttl() -> u64 {
    300
}

fn default_admin_role() -> String {
    crate::authz::ADMIN_ROLE.to_string()
}

impl Default for PermissionsConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: default_cache_ttl(),
            admin_role: default_admin_role(),
        }
    }
}

impl PermissionsConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn admin_role(&self) -> Option<String> {
        (!self.admin_role.is_empty()).then(|| self.admin_role.clone())
    }
}

/// Webhook delivery configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhooksConfig {
    /// Per-delivery timeout.
    #[serde(default = "default_webhook_timeout")]
    pub timeout_secs: u64,
    /// `User-Agent` sent with deliveries.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_webhook_timeout() -> u64 {
    10
}

fn default_user_agent() -> String {
    format!("tenantgate/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for WebhooksConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_webhook_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

impl WebhooksConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (pretty, compact, json).
    #[serde(default = "default_log_format")]
    pub format: String,
    /// Also write logs to this file.
    pub file: Option<PathBuf>,
    /// Include file and line in pretty output.
    #[serde(default)]
    pub source_location: bool,
    /// Log span open/close events.
    #[serde(default)]
    pub span_events: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl LoggingConfig {
    /// `[logging]` settings with `TENANTGATE_LOG_*` variables layered on top.
    pub fn to_log_config(&self) -> LogConfig {
        self.base_log_config().with_env()
    }

    fn base_log_config(&self) -> LogConfig {
        LogConfig {
            level: LogLevel::parse(&self.level).unwrap_or_default(),
            format: LogFormat::parse(&self.format),
            file_path: self.file.clone(),
            source_location: self.source_location,
            span_events: self.span_events,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn logging(level: &str, format: &str) -> LoggingConfig {
        LoggingConfig {
            level: level.into(),
            format: format.into(),
            file: None,
            source_location: true,
            span_events: false,
        }
    }

    #[test]
    fn test_logging_section_maps_every_field() {
        let config = logging("warn", "compact").base_log_config();
        assert_eq!(config.level, LogLevel::Warn);
        assert_eq!(config.format, LogFormat::Compact);
        assert!(config.source_location);
        assert!(!config.span_events);
    }

    #[test]
    fn test_environment_overrides_logging_section() {
        let vars: HashMap<&str, &str> = [("TENANTGATE_LOG_SPANS", "1"), ("TENANTGATE_LOG_LEVEL", "debug")]
            .into_iter()
            .collect();

        let config = logging("warn", "json")
            .base_log_config()
            .with_lookup(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.level, LogLevel::Debug);
        assert_eq!(config.format, LogFormat::Json);
        assert!(config.source_location);
        assert!(config.span_events);
    }
}
