//! Gateway construction.

use super::pipeline::Gateway;
use super::route::RouteSpec;
use super::GatewayServices;
use crate::audit::AuditRecorder;
use crate::auth::{IdentityProvider, JwtIdentityProvider, TenantResolver};
use crate::authz::{PermissionAuthority, ADMIN_ROLE, DEFAULT_PERMISSION_TTL};
use crate::config::GatewayConfig;
use crate::rate_limit::{InMemoryStore, RateLimitPolicy, RateLimitStore, RateLimiter};
use crate::router::{RouteTable, RouterError};
use crate::store::{AuditSink, MemoryStore, MembershipStore, PermissionStore, WebhookStore};
use crate::webhook::{HttpWebhookTransport, WebhookDispatcher, WebhookTransport};
use axum::http::Method;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("gateway is missing a {0}")]
    Missing(&'static str),

    #[error(transparent)]
    Route(#[from] RouterError),

    #[error("failed to build webhook client: {0}")]
    WebhookClient(#[from] reqwest::Error),
}

/// Assembles a [`Gateway`] from its collaborators and routes.
///
/// Every stateful component is created here, so each gateway owns its own
/// permission cache and rate limit counters.
pub struct GatewayBuilder {
    identity_provider: Option<Arc<dyn IdentityProvider>>,
    memberships: Option<Arc<dyn MembershipStore>>,
    permissions: Option<Arc<dyn PermissionStore>>,
    webhooks: Option<Arc<dyn WebhookStore>>,
    audit_sink: Option<Arc<dyn AuditSink>>,
    webhook_transport: Option<Arc<dyn WebhookTransport>>,
    rate_limit_store: Option<Arc<dyn RateLimitStore>>,
    policy: RateLimitPolicy,
    permission_ttl: Duration,
    admin_role: Option<String>,
    routes: RouteTable<RouteSpec>,
}

impl Default for GatewayBuilder {
    fn default() -> Self {
        Self {
            identity_provider: None,
            memberships: None,
            permissions: None,
            webhooks: None,
            audit_sink: None,
            webhook_transport: None,
            rate_limit_store: None,
            policy: RateLimitPolicy::default(),
            permission_ttl: DEFAULT_PERMISSION_TTL,
            admin_role: Some(ADMIN_ROLE.to_string()),
            routes: RouteTable::new(),
        }
    }
}

impl GatewayBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Settings from configuration: JWT provider, rate limit policy,
    /// permission TTL and HTTP webhook transport.
    pub fn from_config(config: &GatewayConfig) -> Result<Self, BuildError> {
        let transport = HttpWebhookTransport::new(config.webhooks.timeout(), &config.webhooks.user_agent)?;

        Ok(Self::new()
            .identity_provider(Arc::new(JwtIdentityProvider::new(
                config.auth.jwt_secret.clone(),
                config.auth.leeway_secs,
            )))
            .rate_limit_policy(config.rate_limit.policy())
            .permission_ttl(config.permissions.cache_ttl())
            .admin_role(config.permissions.admin_role())
            .webhook_transport(Arc::new(transport)))
    }

    pub fn identity_provider(mut self, provider: Arc<dyn IdentityProvider>) -> Self {
        self.identity_provider = Some(provider);
        self
    }

    pub fn membership_store(mut self, store: Arc<dyn MembershipStore>) -> Self {
        self.memberships = Some(store);
        self
    }

    pub fn permission_store(mut self, store: Arc<dyn PermissionStore>) -> Self {
        self.permissions = Some(store);
        self
    }

    pub fn webhook_store(mut self, store: Arc<dyn WebhookStore>) -> Self {
        self.webhooks = Some(store);
        self
    }

    pub fn audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit_sink = Some(sink);
        self
    }

    /// Use one memory store for memberships, permissions, webhooks and audit.
    pub fn memory_store(self, store: Arc<MemoryStore>) -> Self {
        self.membership_store(store.clone())
            .permission_store(store.clone())
            .webhook_store(store.clone())
            .audit_sink(store)
    }

    pub fn webhook_transport(mut self, transport: Arc<dyn WebhookTransport>) -> Self {
        self.webhook_transport = Some(transport);
        self
    }

    pub fn rate_limit_store(mut self, store: Arc<dyn RateLimitStore>) -> Self {
        self.rate_limit_store = Some(store);
        self
    }

    pub fn rate_limit_policy(mut self, policy: RateLimitPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn permission_ttl(mut self, ttl: Duration) -> Self {
        self.permission_ttl = ttl;
        self
    }

    pub fn admin_role(mut self, role: Option<String>) -> Self {
        self.admin_role = role;
        self
    }

    /// Register a route. Patterns are validated here.
    pub fn route(mut self, method: Method, pattern: &str, spec: RouteSpec) -> Result<Self, BuildError> {
        self.routes.register(method, pattern, spec)?;
        Ok(self)
    }

    pub fn build(self) -> Result<Gateway, BuildError> {
        let provider = self.identity_provider.ok_or(BuildError::Missing("identity provider"))?;
        let memberships = self.memberships.ok_or(BuildError::Missing("membership store"))?;
        let permissions = self.permissions.ok_or(BuildError::Missing("permission store"))?;
        let webhooks = self.webhooks.ok_or(BuildError::Missing("webhook store"))?;
        let audit_sink = self.audit_sink.ok_or(BuildError::Missing("audit sink"))?;
        let transport = match self.webhook_transport {
            Some(transport) => transport,
            None => Arc::new(HttpWebhookTransport::new(
                Duration::from_secs(10),
                concat!("tenantgate/", env!("CARGO_PKG_VERSION")),
            )?),
        };
        let rate_limit_store = self
            .rate_limit_store
            .unwrap_or_else(|| Arc::new(InMemoryStore::new()));

        let services = GatewayServices {
            resolver: TenantResolver::new(provider, memberships),
            limiter: RateLimiter::new(rate_limit_store, self.policy),
            authority: PermissionAuthority::new(permissions, self.permission_ttl).with_admin_role(self.admin_role),
            audit: AuditRecorder::new(audit_sink),
            webhooks: WebhookDispatcher::new(webhooks, transport),
        };

        Ok(Gateway::new(self.routes, services))
    }
}
