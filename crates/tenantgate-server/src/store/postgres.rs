//! PostgreSQL-backed stores.

use super::{AuditSink, MembershipStore, PermissionStore, StoreResult, WebhookStore};
use crate::audit::AuditEntry;
use crate::auth::Membership;
use crate::authz::PermissionRecord;
use crate::webhook::WebhookRegistration;
use async_trait::async_trait;
use sqlx::PgPool;
use tenantgate_common_log::spans::store_span;
use tracing::Instrument;
use uuid::Uuid;

/// Store over the gateway tables created by the bundled migrations.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl MembershipStore for PgStore {
    async fn membership(&self, tenant_id: Uuid, identity_id: Uuid) -> StoreResult<Option<Membership>> {
        let membership = sqlx::query_as::<_, Membership>(
            r#"
            SELECT tenant_id, identity_id, role, active
            FROM tenant_members
            WHERE tenant_id = $1 AND identity_id = $2
            "#,
        )
        .bind(tenant_id)
        .bind(identity_id)
        .fetch_optional(&self.pool)
        .instrument(store_span("postgres", "membership"))
        .await?;

        Ok(membership)
    }
}

#[async_trait]
impl PermissionStore for PgStore {
    async fn permissions(&self, tenant_id: Uuid, role: &str) -> StoreResult<Vec<PermissionRecord>> {
        let records = sqlx::query_as::<_, PermissionRecord>(
            r#"
            SELECT tenant_id, role, module, can_view, can_create, can_edit, can_delete, can_export
            FROM role_permissions
            WHERE tenant_id = $1 AND role = $2
            ORDER BY module
            "#,
        )
        .bind(tenant_id)
        .bind(role)
        .fetch_all(&self.pool)
        .instrument(store_span("postgres", "permissions"))
        .await?;

        Ok(records)
    }
}

#[async_trait]
impl WebhookStore for PgStore {
    async fn active_registrations(&self, tenant_id: Uuid, event: &str) -> StoreResult<Vec<WebhookRegistration>> {
        let registrations = sqlx::query_as::<_, WebhookRegistration>(
            r#"
            SELECT id, tenant_id, url, events, active
            FROM webhook_registrations
            WHERE tenant_id = $1 AND active AND $2 = ANY(events)
            "#,
        )
        .bind(tenant_id)
        .bind(event)
        .fetch_all(&self.pool)
        .instrument(store_span("postgres", "webhooks"))
        .await?;

        Ok(registrations)
    }
}

#[async_trait]
impl AuditSink for PgStore {
    async fn append(&self, entry: &AuditEntry) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO audit_log
                (identity_id, tenant_id, action, resource, resource_id, metadata, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(entry.identity_id)
        .bind(entry.tenant_id)
        .bind(entry.action.as_str())
        .bind(&entry.resource)
        .bind(&entry.resource_id)
        .bind(&entry.metadata)
        .bind(entry.timestamp)
        .execute(&self.pool)
        .instrument(store_span("postgres", "audit"))
        .await?;

        Ok(())
    }
}
