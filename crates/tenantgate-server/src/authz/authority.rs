//! Permission checks backed by a TTL cache of per-role records.

use super::types::{Action, CacheStats, PermissionRecord, ADMIN_ROLE};
use crate::auth::TenantContext;
use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::store::PermissionStore;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;
use uuid::Uuid;

/// Default lifetime of a cached permission set.
pub const DEFAULT_PERMISSION_TTL: Duration = Duration::from_secs(300);

struct CacheEntry {
    records: Arc<Vec<PermissionRecord>>,
    expires_at: Instant,
}

struct CacheStatsInner {
    hits: AtomicU64,
    misses: AtomicU64,
}

/// Decides whether a tenant context may perform an action on a module.
///
/// Records are cached per `(tenant, role)` and reloaded from the store once
/// the entry is older than the TTL. An entry is shared by every identity
/// holding that role in that tenant.
pub struct PermissionAuthority {
    store: Arc<dyn PermissionStore>,
    ttl: Duration,
    admin_role: Option<String>,
    entries: DashMap<String, Arc<CacheEntry>>,
    stats: CacheStatsInner,
}

impl PermissionAuthority {
    pub fn new(store: Arc<dyn PermissionStore>, ttl: Duration) -> Self {
        Self {
            store,
            ttl,
            admin_role: Some(ADMIN_ROLE.to_string()),
            entries: DashMap::new(),
            stats: CacheStatsInner {
                hits: AtomicU64::new(0),
                misses: AtomicU64::new(0),
            },
        }
    }

    /// Role that bypasses records, or `None` to check every role against
    /// its records.
    pub fn with_admin_role(mut self, role: Option<String>) -> Self {
        self.admin_role = role;
        self
    }

    fn cache_key(tenant_id: Uuid, role: &str) -> String {
        format!("{}:{}", tenant_id, role)
    }

    /// Whether the context may perform `action` on `module`.
    ///
    /// Unscoped contexts are never allowed. Store failures propagate.
    pub async fn has_permission(&self, ctx: &TenantContext, module: &str, action: Action) -> ApiResult<bool> {
        let Some((tenant_id, role)) = ctx.scope() else {
            return Ok(false);
        };

        if self.admin_role.as_deref() == Some(role) {
            debug!(tenant = %tenant_id, role = %role, module, action = %action, "admin bypass");
            return Ok(true);
        }

        let records = self.load(tenant_id, role).await?;
        let allowed = records
            .iter()
            .find(|r| r.module == module)
            .map(|r| r.allows(action))
            .unwrap_or(false);

        debug!(tenant = %tenant_id, role = %role, module, action = %action, allowed, "permission check");
        Ok(allowed)
    }

    /// Like [`has_permission`](Self::has_permission), but denial is an error.
    pub async fn require_permission(&self, ctx: &TenantContext, module: &str, action: Action) -> ApiResult<()> {
        if self.has_permission(ctx, module, action).await? {
            Ok(())
        } else {
            Err(ApiError::PermissionDenied {
                module: module.to_string(),
                action: action.to_string(),
            })
        }
    }

    /// Permission records for the context's role, through the cache.
    pub async fn records_for(&self, ctx: &TenantContext) -> ApiResult<Vec<PermissionRecord>> {
        match ctx.scope() {
            Some((tenant_id, role)) => Ok(self.load(tenant_id, role).await?.as_ref().clone()),
            None => Ok(Vec::new()),
        }
    }

    /// Drop the cached records of one role.
    pub fn invalidate(&self, tenant_id: Uuid, role: &str) {
        self.entries.remove(&Self::cache_key(tenant_id, role));
    }

    /// Drop every cached entry.
    pub fn clear(&self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        debug!(count, "permission cache cleared");
        count
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.stats.hits.load(Ordering::Relaxed),
            misses: self.stats.misses.load(Ordering::Relaxed),
            entries: self.entries.len(),
        }
    }

    async fn load(&self, tenant_id: Uuid, role: &str) -> ApiResult<Arc<Vec<PermissionRecord>>> {
        let key = Self::cache_key(tenant_id, role);

        if let Some(entry) = self.fresh_entry(&key) {
            self.stats.hits.fetch_add(1, Ordering::Relaxed);
            metrics::record_permission_lookup(true);
            return Ok(entry.records.clone());
        }

        self.stats.misses.fetch_add(1, Ordering::Relaxed);
        metrics::record_permission_lookup(false);

        // Concurrent misses may both reach the store; the last insert wins.
        let records = Arc::new(self.store.permissions(tenant_id, role).await?);
        self.entries.insert(
            key,
            Arc::new(CacheEntry {
                records: records.clone(),
                expires_at: Instant::now() + self.ttl,
            }),
        );

        Ok(records)
    }

    fn fresh_entry(&self, key: &str) -> Option<Arc<CacheEntry>> {
        let entry = self.entries.get(key)?.value().clone();
        (entry.expires_at > Instant::now()).then_some(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Identity;
    use crate::store::MemoryStore;

    const TTL: Duration = Duration::from_secs(300);

    fn ctx(tenant_id: Uuid, role: &str) -> TenantContext {
        TenantContext::scoped(Identity::new(Uuid::new_v4(), None), tenant_id, role.to_string())
    }

    fn setup() -> (Arc<MemoryStore>, PermissionAuthority, Uuid) {
        let tenant = Uuid::new_v4();
        let store = Arc::new(MemoryStore::new());
        store.add_permission(
            PermissionRecord::new(tenant, "cashier", "sales")
                .grant(Action::View)
                .grant(Action::Create),
        );
        store.add_permission(PermissionRecord::new(tenant, "cashier", "payroll"));
        let authority = PermissionAuthority::new(store.clone(), TTL);
        (store, authority, tenant)
    }

    #[tokio::test]
    async fn test_granted_flag_allows() {
        let (_, authority, tenant) = setup();
        let cashier = ctx(tenant, "cashier");

        assert!(authority.has_permission(&cashier, "sales", Action::Create).await.unwrap());
        assert!(!authority.has_permission(&cashier, "sales", Action::Delete).await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_module_denies() {
        let (_, authority, tenant) = setup();
        let cashier = ctx(tenant, "cashier");

        assert!(!authority.has_permission(&cashier, "inventory", Action::View).await.unwrap());
        assert!(!authority.has_permission(&cashier, "payroll", Action::View).await.unwrap());
    }

    #[tokio::test]
    async fn test_admin_bypasses_records() {
        let (store, authority, tenant) = setup();
        let admin = ctx(tenant, ADMIN_ROLE);

        assert!(authority.has_permission(&admin, "payroll", Action::Export).await.unwrap());
        assert_eq!(store.permission_reads(), 0);
    }

    #[tokio::test]
    async fn test_admin_bypass_can_be_disabled() {
        let (_, authority, tenant) = setup();
        let authority = authority.with_admin_role(None);

        assert!(!authority
            .has_permission(&ctx(tenant, ADMIN_ROLE), "payroll", Action::View)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_unscoped_context_denied() {
        let (_, authority, _) = setup();
        let unscoped = TenantContext::unscoped(Identity::new(Uuid::new_v4(), None));

        assert!(!authority.has_permission(&unscoped, "sales", Action::View).await.unwrap());
    }

    #[tokio::test]
    async fn test_require_permission_names_module_and_action() {
        let (_, authority, tenant) = setup();
        let err = authority
            .require_permission(&ctx(tenant, "cashier"), "payroll", Action::View)
            .await
            .unwrap_err();

        match err {
            ApiError::PermissionDenied { module, action } => {
                assert_eq!(module, "payroll");
                assert_eq!(action, "view");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_cache_shared_across_identities_with_same_role() {
        let (store, authority, tenant) = setup();

        authority.has_permission(&ctx(tenant, "cashier"), "sales", Action::View).await.unwrap();
        authority.has_permission(&ctx(tenant, "cashier"), "sales", Action::Edit).await.unwrap();

        assert_eq!(store.permission_reads(), 1);
        let stats = authority.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_reloads_after_ttl() {
        let (store, authority, tenant) = setup();
        let cashier = ctx(tenant, "cashier");

        authority.has_permission(&cashier, "sales", Action::View).await.unwrap();
        tokio::time::advance(TTL - Duration::from_secs(1)).await;
        authority.has_permission(&cashier, "sales", Action::View).await.unwrap();
        assert_eq!(store.permission_reads(), 1);

        tokio::time::advance(Duration::from_secs(2)).await;
        authority.has_permission(&cashier, "sales", Action::View).await.unwrap();
        assert_eq!(store.permission_reads(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_grant_visible_until_expiry() {
        let (store, authority, tenant) = setup();
        let cashier = ctx(tenant, "cashier");

        assert!(!authority.has_permission(&cashier, "sales", Action::Export).await.unwrap());

        store.add_permission(
            PermissionRecord::new(tenant, "cashier", "sales")
                .grant(Action::View)
                .grant(Action::Create)
                .grant(Action::Export),
        );
        assert!(!authority.has_permission(&cashier, "sales", Action::Export).await.unwrap());

        tokio::time::advance(TTL + Duration::from_secs(1)).await;
        assert!(authority.has_permission(&cashier, "sales", Action::Export).await.unwrap());
    }

    #[tokio::test]
    async fn test_invalidate_forces_reload() {
        let (store, authority, tenant) = setup();
        let cashier = ctx(tenant, "cashier");

        authority.has_permission(&cashier, "sales", Action::View).await.unwrap();
        authority.invalidate(tenant, "cashier");
        authority.has_permission(&cashier, "sales", Action::View).await.unwrap();
        assert_eq!(store.permission_reads(), 2);

        assert_eq!(authority.clear(), 1);
        assert_eq!(authority.stats().entries, 0);
    }

    #[tokio::test]
    async fn test_store_failure_propagates() {
        let (store, authority, tenant) = setup();
        store.set_unavailable(true);

        let err = authority
            .has_permission(&ctx(tenant, "cashier"), "sales", Action::View)
            .await
            .unwrap_err();
        assert!(err.is_server_error());
    }

    #[tokio::test]
    async fn test_records_for_scoped_role() {
        let (_, authority, tenant) = setup();

        let records = authority.records_for(&ctx(tenant, "cashier")).await.unwrap();
        assert_eq!(records.len(), 2);

        let unscoped = TenantContext::unscoped(Identity::new(Uuid::new_v4(), None));
        assert!(authority.records_for(&unscoped).await.unwrap().is_empty());
    }
}
