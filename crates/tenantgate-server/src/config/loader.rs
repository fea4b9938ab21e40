//! Configuration loading utilities.

use super::types::GatewayConfig;
use anyhow::{Context, Result};
use std::path::Path;
use tracing::{info, warn};

/// Load configuration from layered sources.
///
/// Embedded defaults, then an optional file, then `TENANTGATE__*`
/// environment variables (`__` separates nested keys).
pub struct ConfigLoader {
    config_path: Option<String>,
    env_prefix: String,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            config_path: None,
            env_prefix: "TENANTGATE".to_string(),
        }
    }

    /// Set config file path.
    pub fn with_config_path(mut self, path: impl Into<String>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    /// Set environment variable prefix.
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Load configuration.
    pub fn load(&self) -> Result<GatewayConfig> {
        let mut builder = config::Config::builder().add_source(config::File::from_str(
            include_str!("defaults.toml"),
            config::FileFormat::Toml,
        ));

        if let Some(path) = &self.config_path {
            if Path::new(path).exists() {
                info!(path = %path, "Loading config file");
                builder = builder.add_source(config::File::with_name(path));
            } else {
                warn!(path = %path, "Config file not found, using defaults");
            }
        }

        builder = builder.add_source(
            config::Environment::with_prefix(&self.env_prefix)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Load configuration, taking the file path from `CONFIG_PATH` when unset.
pub fn load_config(config_path: Option<String>) -> Result<GatewayConfig> {
    let mut loader = ConfigLoader::new();
    if let Some(path) = config_path.or_else(|| std::env::var("CONFIG_PATH").ok()) {
        loader = loader.with_config_path(path);
    }

    loader.load()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RateLimitBackend;
    use std::io::Write;

    #[test]
    fn test_defaults_load() {
        let config = ConfigLoader::new()
            .with_env_prefix("TENANTGATE_TEST_UNSET")
            .load()
            .unwrap();

        assert_eq!(config.server.port, 8080);
        assert!(config.database.is_none());
        assert_eq!(config.rate_limit.max_requests, 100);
        assert_eq!(config.rate_limit.overrides.len(), 2);
        assert_eq!(config.rate_limit.backend, RateLimitBackend::Memory);
        assert_eq!(config.permissions.cache_ttl_secs, 300);

        let policy = config.rate_limit.policy();
        assert_eq!(policy.rule_for("/api/reports/x").max_requests, 30);
        assert_eq!(policy.rule_for("/api/export").max_requests, 10);
    }

    #[test]
    fn test_file_overrides_defaults() {
        let path = std::env::temp_dir().join(format!("tenantgate-{}.toml", uuid::Uuid::new_v4()));
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
[server]
port = 9090

[auth]
jwt_secret = "file-secret-file-secret-file-secret"

[database]
url = "postgres://gateway@localhost/gateway"

[permissions]
cache_ttl_secs = 30
"#
        )
        .unwrap();

        let config = ConfigLoader::new()
            .with_env_prefix("TENANTGATE_TEST_UNSET")
            .with_config_path(path.to_string_lossy())
            .load()
            .unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.server.port, 9090);
        assert_eq!(config.permissions.cache_ttl_secs, 30);
        let database = config.database.unwrap();
        assert_eq!(database.max_connections, 10);
        assert!(database.run_migrations);
    }
}
