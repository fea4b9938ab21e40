//! Audit trail of gateway actions.
//!
//! Recording never fails the request: sink errors are logged and dropped.

use crate::auth::{Identity, TenantContext};
use crate::metrics;
use crate::store::AuditSink;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Kind of action recorded in the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Create,
    Read,
    Update,
    Delete,
    Export,
    Login,
    Logout,
    AccessDenied,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Read => "read",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Export => "export",
            Self::Login => "login",
            Self::Logout => "logout",
            Self::AccessDenied => "access_denied",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One audit trail entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub identity_id: Uuid,
    pub tenant_id: Option<Uuid>,
    pub action: AuditAction,
    pub resource: String,
    pub resource_id: Option<String>,
    pub metadata: Value,
    pub timestamp: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(
        identity: &Identity,
        tenant_id: Option<Uuid>,
        action: AuditAction,
        resource: impl Into<String>,
        resource_id: Option<String>,
        metadata: Option<Value>,
    ) -> Self {
        Self {
            identity_id: identity.id,
            tenant_id,
            action,
            resource: resource.into(),
            resource_id,
            metadata: metadata.unwrap_or_else(|| Value::Object(Default::default())),
            timestamp: Utc::now(),
        }
    }

    pub fn log(&self) {
        info!(
            event = "audit",
            identity_id = %self.identity_id,
            tenant_id = ?self.tenant_id,
            action = %self.action,
            resource = %self.resource,
            resource_id = ?self.resource_id,
            "Audit entry"
        );
    }
}

/// Appends audit entries to a sink.
pub struct AuditRecorder {
    sink: Arc<dyn AuditSink>,
}

impl AuditRecorder {
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self { sink }
    }

    /// Record an action performed under `ctx`.
    pub async fn record(
        &self,
        ctx: &TenantContext,
        action: AuditAction,
        resource: &str,
        resource_id: Option<String>,
        metadata: Option<Value>,
    ) {
        let entry = AuditEntry::new(&ctx.identity, ctx.tenant_id, action, resource, resource_id, metadata);
        self.append(entry).await;
    }

    /// Record a refused request for a known identity.
    ///
    /// The tenant is whatever the request targeted, even when the identity
    /// holds no membership there.
    pub async fn record_denied(
        &self,
        identity: &Identity,
        tenant_id: Option<Uuid>,
        resource: &str,
        reason: &str,
    ) {
        let entry = AuditEntry::new(
            identity,
            tenant_id,
            AuditAction::AccessDenied,
            resource,
            None,
            Some(serde_json::json!({ "reason": reason })),
        );
        self.append(entry).await;
    }

    async fn append(&self, entry: AuditEntry) {
        entry.log();

        if let Err(err) = self.sink.append(&entry).await {
            metrics::record_audit_failure();
            warn!(
                error = %err,
                action = %entry.action,
                resource = %entry.resource,
                "Failed to persist audit entry"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn ctx() -> TenantContext {
        TenantContext::scoped(
            Identity::new(Uuid::new_v4(), Some("manager@example.com".into())),
            Uuid::new_v4(),
            "manager".into(),
        )
    }

    #[tokio::test]
    async fn test_record_appends_entry() {
        let store = Arc::new(MemoryStore::new());
        let recorder = AuditRecorder::new(store.clone());
        let ctx = ctx();

        recorder
            .record(&ctx, AuditAction::Create, "products", Some("sku-42".into()), Some(json!({"qty": 3})))
            .await;

        let entries = store.audit_entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].identity_id, ctx.identity.id);
        assert_eq!(entries[0].tenant_id, ctx.tenant_id);
        assert_eq!(entries[0].action, AuditAction::Create);
        assert_eq!(entries[0].resource_id.as_deref(), Some("sku-42"));
        assert_eq!(entries[0].metadata["qty"], 3);
    }

    #[tokio::test]
    async fn test_sink_failure_is_swallowed() {
        let store = Arc::new(MemoryStore::new());
        store.set_unavailable(true);
        let recorder = AuditRecorder::new(store.clone());

        recorder.record(&ctx(), AuditAction::Delete, "products", None, None).await;

        store.set_unavailable(false);
        assert!(store.audit_entries().is_empty());
    }

    #[tokio::test]
    async fn test_denied_entry_carries_reason() {
        let store = Arc::new(MemoryStore::new());
        let recorder = AuditRecorder::new(store.clone());
        let identity = Identity::new(Uuid::new_v4(), None);
        let tenant = Uuid::new_v4();

        recorder.record_denied(&identity, Some(tenant), "/api/tenants/x/payroll", "forbidden").await;

        let entries = store.audit_entries();
        assert_eq!(entries[0].action, AuditAction::AccessDenied);
        assert_eq!(entries[0].tenant_id, Some(tenant));
        assert_eq!(entries[0].metadata["reason"], "forbidden");
    }

    #[test]
    fn test_action_serializes_snake_case() {
        assert_eq!(serde_json::to_value(AuditAction::AccessDenied).unwrap(), "access_denied");
        assert_eq!(AuditAction::Export.to_string(), "export");
    }
}
