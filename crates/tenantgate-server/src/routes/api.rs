//! Gateway routes served by the binary.

use crate::audit::AuditAction;
use crate::authz::Action;
use crate::error::ApiResult;
use crate::gateway::{BuildError, GatewayBuilder, HandlerOutput, RequestContext, RouteSpec};
use crate::response::{PaginatedResponse, PaginationParams};
use axum::http::Method;
use serde::Deserialize;
use serde_json::{json, Value};
use validator::{Validate, ValidationError};

/// Register the built-in `/api` routes.
pub fn register(builder: GatewayBuilder) -> Result<GatewayBuilder, BuildError> {
    builder
        .route(Method::GET, "/api/me", RouteSpec::new(me))?
        .route(
            Method::GET,
            "/api/tenants/:tenant_id/permissions",
            RouteSpec::new(list_permissions).require("settings", Action::View),
        )?
        .route(
            Method::POST,
            "/api/tenants/:tenant_id/webhooks/test",
            RouteSpec::new(test_webhook)
                .require("settings", Action::Edit)
                .audit(AuditAction::Update, "webhooks"),
        )
}

async fn me(ctx: RequestContext) -> ApiResult<HandlerOutput> {
    let identity = ctx.identity();
    Ok(HandlerOutput::ok(json!({
        "id": identity.id,
        "email": identity.email,
        "tenantId": ctx.tenant.tenant_id,
        "role": ctx.tenant.role,
    })))
}

async fn list_permissions(ctx: RequestContext) -> ApiResult<HandlerOutput> {
    let params = PaginationParams::from_query(&ctx.query);
    let records = ctx.services.authority.records_for(&ctx.tenant).await?;
    let page = PaginatedResponse::from_vec(records, params);

    Ok(HandlerOutput::ok(json!(page)))
}

/// Body of `POST /api/tenants/:tenant_id/webhooks/test`.
#[derive(Debug, Deserialize, Validate)]
pub struct WebhookTestRequest {
    #[validate(length(min = 1, max = 128), custom(function = "validate_event_name"))]
    pub event: String,
    #[serde(default)]
    pub data: Option<Value>,
}

/// Event names are dotted lowercase words, e.g. `sale.created`.
fn validate_event_name(event: &str) -> Result<(), ValidationError> {
    let valid = event
        .split('.')
        .all(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_'));

    if valid {
        Ok(())
    } else {
        Err(ValidationError::new("event_name"))
    }
}

async fn test_webhook(ctx: RequestContext) -> ApiResult<HandlerOutput> {
    let request: WebhookTestRequest = ctx.json()?;
    request.validate()?;

    let data = request.data.unwrap_or_else(|| json!({ "test": true }));
    let deliveries = ctx
        .services
        .webhooks
        .trigger(&ctx.tenant, &request.event, data)
        .await;

    Ok(HandlerOutput::ok(json!({
        "event": request.event,
        "deliveries": deliveries,
    }))
    .with_resource_id(request.event))
}
