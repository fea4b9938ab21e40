//! In-process store for development and tests.

use super::{AuditSink, MembershipStore, PermissionStore, StoreError, StoreResult, WebhookStore};
use crate::audit::AuditEntry;
use crate::auth::Membership;
use crate::authz::PermissionRecord;
use crate::webhook::WebhookRegistration;
use anyhow::Context;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::info;
use uuid::Uuid;

/// Initial contents of a [`MemoryStore`], loadable from JSON.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Seed {
    pub memberships: Vec<Membership>,
    pub permissions: Vec<PermissionRecord>,
    pub webhooks: Vec<WebhookRegistration>,
}

impl Seed {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read seed file {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("Invalid seed file {}", path.display()))
    }
}

/// Implements every store trait over in-memory tables.
#[derive(Default)]
pub struct MemoryStore {
    memberships: RwLock<HashMap<(Uuid, Uuid), Membership>>,
    permissions: RwLock<Vec<PermissionRecord>>,
    webhooks: RwLock<Vec<WebhookRegistration>>,
    audit: RwLock<Vec<AuditEntry>>,
    permission_reads: AtomicU64,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_seed(seed: Seed) -> Self {
        let store = Self::new();
        info!(
            memberships = seed.memberships.len(),
            permissions = seed.permissions.len(),
            webhooks = seed.webhooks.len(),
            "Seeding memory store"
        );
        for membership in seed.memberships {
            store.add_membership(membership);
        }
        for record in seed.permissions {
            store.add_permission(record);
        }
        for webhook in seed.webhooks {
            store.add_webhook(webhook);
        }
        store
    }

    /// Insert or replace the membership of an identity in a tenant.
    pub fn add_membership(&self, membership: Membership) {
        self.memberships
            .write()
            .insert((membership.tenant_id, membership.identity_id), membership);
    }

    /// Insert or replace the record for `(tenant, role, module)`.
    pub fn add_permission(&self, record: PermissionRecord) {
        let mut permissions = self.permissions.write();
        permissions.retain(|r| {
            !(r.tenant_id == record.tenant_id && r.role == record.role && r.module == record.module)
        });
        permissions.push(record);
    }

    pub fn add_webhook(&self, registration: WebhookRegistration) {
        self.webhooks.write().push(registration);
    }

    /// Entries appended so far, oldest first.
    pub fn audit_entries(&self) -> Vec<AuditEntry> {
        self.audit.read().clone()
    }

    /// Number of permission lookups served.
    pub fn permission_reads(&self) -> u64 {
        self.permission_reads.load(Ordering::Relaxed)
    }

    /// Make every lookup fail until reset.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::Relaxed);
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::Relaxed) {
            Err(StoreError::Unavailable("memory store marked unavailable".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl MembershipStore for MemoryStore {
    async fn membership(&self, tenant_id: Uuid, identity_id: Uuid) -> StoreResult<Option<Membership>> {
        self.check_available()?;
        Ok(self.memberships.read().get(&(tenant_id, identity_id)).cloned())
    }
}

#[async_trait]
impl PermissionStore for MemoryStore {
    async fn permissions(&self, tenant_id: Uuid, role: &str) -> StoreResult<Vec<PermissionRecord>> {
        self.check_available()?;
        self.permission_reads.fetch_add(1, Ordering::Relaxed);
        Ok(self
            .permissions
            .read()
            .iter()
            .filter(|r| r.tenant_id == tenant_id && r.role == role)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl WebhookStore for MemoryStore {
    async fn active_registrations(&self, tenant_id: Uuid, event: &str) -> StoreResult<Vec<WebhookRegistration>> {
        self.check_available()?;
        Ok(self
            .webhooks
            .read()
            .iter()
            .filter(|w| w.tenant_id == tenant_id && w.active && w.subscribes_to(event))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl AuditSink for MemoryStore {
    async fn append(&self, entry: &AuditEntry) -> StoreResult<()> {
        self.check_available()?;
        self.audit.write().push(entry.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::Action;
    use std::io::Write;

    #[tokio::test]
    async fn test_permissions_filtered_by_tenant_and_role() {
        let store = MemoryStore::new();
        let tenant = Uuid::new_v4();
        store.add_permission(PermissionRecord::new(tenant, "cashier", "sales").grant(Action::View));
        store.add_permission(PermissionRecord::new(tenant, "manager", "sales").grant(Action::Edit));
        store.add_permission(PermissionRecord::new(Uuid::new_v4(), "cashier", "sales"));

        let records = store.permissions(tenant, "cashier").await.unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].can_view);
        assert_eq!(store.permission_reads(), 1);
    }

    #[tokio::test]
    async fn test_add_permission_replaces_same_module() {
        let store = MemoryStore::new();
        let tenant = Uuid::new_v4();
        store.add_permission(PermissionRecord::new(tenant, "cashier", "sales"));
        store.add_permission(PermissionRecord::new(tenant, "cashier", "sales").grant(Action::Export));

        let records = store.permissions(tenant, "cashier").await.unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].can_export);
    }

    #[tokio::test]
    async fn test_unavailable_store_fails_lookups() {
        let store = MemoryStore::new();
        store.set_unavailable(true);

        let err = store.membership(Uuid::new_v4(), Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
    }

    #[test]
    fn test_seed_from_file() {
        let tenant = Uuid::new_v4();
        let identity = Uuid::new_v4();
        let seed = serde_json::json!({
            "memberships": [
                {"tenantId": tenant, "identityId": identity, "role": "cashier", "active": true}
            ],
            "permissions": [
                {"tenantId": tenant, "role": "cashier", "module": "sales", "canView": true}
            ]
        });

        let path = std::env::temp_dir().join(format!("tenantgate-seed-{}.json", Uuid::new_v4()));
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(seed.to_string().as_bytes()).unwrap();

        let seed = Seed::from_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(seed.memberships.len(), 1);
        assert!(seed.permissions[0].can_view);
        assert!(!seed.permissions[0].can_edit);
        assert!(seed.webhooks.is_empty());
    }
}
