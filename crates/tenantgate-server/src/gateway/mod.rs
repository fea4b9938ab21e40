//! The request gateway: route matching followed by tenant, rate limit and
//! permission stages, the handler, then audit and webhooks.

pub mod builder;
pub mod pipeline;
pub mod route;
pub mod service;

pub use builder::{BuildError, GatewayBuilder};
pub use pipeline::{Gateway, GatewayRequest, TENANT_HEADER, TENANT_PARAM};
pub use route::{AuditSpec, HandlerOutput, PermissionRequirement, RequestContext, RouteHandler, RouteSpec};
pub use service::GatewayService;

use crate::audit::AuditRecorder;
use crate::auth::TenantResolver;
use crate::authz::PermissionAuthority;
use crate::rate_limit::RateLimiter;
use crate::webhook::WebhookDispatcher;

/// Stage components owned by one gateway instance.
pub struct GatewayServices {
    pub resolver: TenantResolver,
    pub limiter: RateLimiter,
    pub authority: PermissionAuthority,
    pub audit: AuditRecorder,
    pub webhooks: WebhookDispatcher,
}
