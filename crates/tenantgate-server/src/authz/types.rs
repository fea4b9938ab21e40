//! Permission types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Role that bypasses module permission checks.
pub const ADMIN_ROLE: &str = "admin";

/// Actions a role may be granted on a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    View,
    Create,
    Edit,
    Delete,
    Export,
}

impl Action {
    pub const ALL: [Action; 5] = [
        Action::View,
        Action::Create,
        Action::Edit,
        Action::Delete,
        Action::Export,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::View => "view",
            Self::Create => "create",
            Self::Edit => "edit",
            Self::Delete => "delete",
            Self::Export => "export",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "view" => Ok(Self::View),
            "create" => Ok(Self::Create),
            "edit" => Ok(Self::Edit),
            "delete" => Ok(Self::Delete),
            "export" => Ok(Self::Export),
            other => Err(format!("unknown action '{}'", other)),
        }
    }
}

/// Flags granted to one role on one module within a tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PermissionRecord {
    pub tenant_id: Uuid,
    pub role: String,
    pub module: String,
    #[serde(default)]
    pub can_view: bool,
    #[serde(default)]
    pub can_create: bool,
    #[serde(default)]
    pub can_edit: bool,
    #[serde(default)]
    pub can_delete: bool,
    #[serde(default)]
    pub can_export: bool,
}

impl PermissionRecord {
    /// Record with every flag cleared.
    pub fn new(tenant_id: Uuid, role: impl Into<String>, module: impl Into<String>) -> Self {
        Self {
            tenant_id,
            role: role.into(),
            module: module.into(),
            can_view: false,
            can_create: false,
            can_edit: false,
            can_delete: false,
            can_export: false,
        }
    }

    /// Set the flag for `action`.
    pub fn grant(mut self, action: Action) -> Self {
        match action {
            Action::View => self.can_view = true,
            Action::Create => self.can_create = true,
            Action::Edit => self.can_edit = true,
            Action::Delete => self.can_delete = true,
            Action::Export => self.can_export = true,
        }
        self
    }

    pub fn allows(&self, action: Action) -> bool {
        match action {
            Action::View => self.can_view,
            Action::Create => self.can_create,
            Action::Edit => self.can_edit,
            Action::Delete => self.can_delete,
            Action::Export => self.can_export,
        }
    }
}

/// Cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(Action::View; "view")]
    #[test_case(Action::Create; "create")]
    #[test_case(Action::Edit; "edit")]
    #[test_case(Action::Delete; "delete")]
    #[test_case(Action::Export; "export")]
    fn test_grant_sets_only_that_flag(action: Action) {
        let record = PermissionRecord::new(Uuid::new_v4(), "cashier", "sales").grant(action);

        for other in Action::ALL {
            assert_eq!(record.allows(other), other == action, "{}", other);
        }
    }

    #[test]
    fn test_action_parse() {
        assert_eq!("export".parse::<Action>().unwrap(), Action::Export);
        assert!("approve".parse::<Action>().is_err());
    }

    #[test]
    fn test_record_serializes_camel_case() {
        let record = PermissionRecord::new(Uuid::nil(), "cashier", "sales").grant(Action::View);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["canView"], true);
        assert_eq!(json["canExport"], false);
        assert_eq!(json["module"], "sales");
    }

    #[test]
    fn test_hit_rate() {
        let stats = CacheStats {
            hits: 3,
            misses: 1,
            entries: 1,
        };
        assert!((stats.hit_rate() - 0.75).abs() < f64::EPSILON);
        assert_eq!(CacheStats::default().hit_rate(), 0.0);
    }
}
