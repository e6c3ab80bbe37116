//! Statically configured keys, read once at startup.
//!
//! The registry is immutable after construction and shared by `Arc`. Legacy
//! keys are compared by raw value, in constant time, and carry the fixed flat
//! permission tags of their role.

use keyward_core::{constant_time_eq, RawKey, Role};
use keyward_perms::{legacy_tags, PermissionSet};

/// Environment variable holding the legacy admin key.
pub const ADMIN_API_KEY_VAR: &str = "ADMIN_API_KEY";
/// Environment variable holding the legacy analyst key.
pub const ANALYST_API_KEY_VAR: &str = "ANALYST_API_KEY";
/// Environment variable holding the legacy client key.
pub const CLIENT_API_KEY_VAR: &str = "CLIENT_API_KEY";

/// Raw legacy keys per role. Absent roles never match.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct LegacyConfig {
    pub admin: Option<String>,
    pub analyst: Option<String>,
    pub client: Option<String>,
}

impl LegacyConfig {
    /// Read `ADMIN_API_KEY`, `ANALYST_API_KEY` and `CLIENT_API_KEY`.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        Self {
            admin: read(ADMIN_API_KEY_VAR),
            analyst: read(ANALYST_API_KEY_VAR),
            client: read(CLIENT_API_KEY_VAR),
        }
    }

    /// Set the key for `role`.
    pub fn with_key(mut self, role: Role, key: impl Into<String>) -> Self {
        let key = Some(key.into());
        match role {
            Role::Admin => self.admin = key,
            Role::Analyst => self.analyst = key,
            Role::Client => self.client = key,
        }
        self
    }

    pub fn key_for(&self, role: Role) -> Option<&str> {
        match role {
            Role::Admin => self.admin.as_deref(),
            Role::Analyst => self.analyst.as_deref(),
            Role::Client => self.client.as_deref(),
        }
    }
}

impl std::fmt::Debug for LegacyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mark = |v: &Option<String>| if v.is_some() { "<set>" } else { "<unset>" };
        f.debug_struct("LegacyConfig")
            .field("admin", &mark(&self.admin))
            .field("analyst", &mark(&self.analyst))
            .field("client", &mark(&self.client))
            .finish()
    }
}

/// One configured legacy key.
#[derive(Debug, Clone)]
pub struct LegacyKeyEntry {
    pub role: Role,
    key: RawKey,
    pub permissions: PermissionSet,
}

impl LegacyKeyEntry {
    fn new(role: Role, key: RawKey) -> Self {
        Self {
            role,
            key,
            permissions: legacy_tags(role),
        }
    }

    /// Principal id reported for this entry.
    pub fn principal_id(&self) -> String {
        format!("legacy-{}", self.role.as_str())
    }

    pub fn display_prefix(&self) -> String {
        self.key.display_prefix()
    }
}

/// Immutable set of legacy keys.
#[derive(Debug, Clone, Default)]
pub struct LegacyRegistry {
    entries: Vec<LegacyKeyEntry>,
}

impl LegacyRegistry {
    /// A registry with no keys: the fallback path always misses.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_config(config: &LegacyConfig) -> Self {
        let entries: Vec<LegacyKeyEntry> = Role::ALL
            .iter()
            .filter_map(|&role| {
                config
                    .key_for(role)
                    .map(|key| LegacyKeyEntry::new(role, RawKey::new(key)))
            })
            .collect();

        tracing::info!(
            configured = entries.len(),
            roles = ?entries.iter().map(|e| e.role.as_str()).collect::<Vec<_>>(),
            "loaded legacy API keys"
        );

        Self { entries }
    }

    /// Find the entry whose raw key equals `raw`.
    ///
    /// Every entry is compared so timing does not reveal which role matched.
    /// If one value is configured for several roles the first in
    /// [`Role::ALL`] order wins.
    pub fn lookup(&self, raw: &RawKey) -> Option<&LegacyKeyEntry> {
        let presented = raw.expose().as_bytes();
        let mut found = None;
        for entry in &self.entries {
            let hit = constant_time_eq(entry.key.expose().as_bytes(), presented);
            if hit && found.is_none() {
                found = Some(entry);
            }
        }
        found
    }

    pub fn roles(&self) -> impl Iterator<Item = Role> + '_ {
        self.entries.iter().map(|e| e.role)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyward_perms::Permission;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> LegacyConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        LegacyConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_from_lookup() {
        let cfg = config(&[(ADMIN_API_KEY_VAR, "xyz"), (CLIENT_API_KEY_VAR, "  ")]);
        assert_eq!(cfg.key_for(Role::Admin), Some("xyz"));
        assert_eq!(cfg.key_for(Role::Analyst), None);
        assert_eq!(cfg.key_for(Role::Client), None);
        assert!(!format!("{cfg:?}").contains("xyz"));
    }

    #[test]
    fn test_lookup_by_raw_value() {
        let registry = LegacyRegistry::from_config(
            &LegacyConfig::default()
                .with_key(Role::Admin, "xyz")
                .with_key(Role::Analyst, "analyst-secret"),
        );
        assert_eq!(registry.len(), 2);

        let admin = registry.lookup(&RawKey::new("xyz")).unwrap();
        assert_eq!(admin.role, Role::Admin);
        assert_eq!(admin.principal_id(), "legacy-admin");
        assert!(admin
            .permissions
            .allows(&Permission::parse("anything:anything").unwrap()));

        let analyst = registry.lookup(&RawKey::new("analyst-secret")).unwrap();
        assert_eq!(analyst.role, Role::Analyst);
        assert!(!analyst
            .permissions
            .allows(&Permission::parse("submit:create").unwrap()));

        assert!(registry.lookup(&RawKey::new("xy")).is_none());
        assert!(registry.lookup(&RawKey::new("xyzz")).is_none());
    }

    #[test]
    fn test_empty_registry_always_misses() {
        let registry = LegacyRegistry::from_config(&config(&[]));
        assert!(registry.is_empty());
        assert!(registry.lookup(&RawKey::new("xyz")).is_none());
    }

    #[test]
    fn test_shared_value_resolves_to_first_role() {
        let registry = LegacyRegistry::from_config(
            &LegacyConfig::default()
                .with_key(Role::Client, "same")
                .with_key(Role::Admin, "same"),
        );
        assert_eq!(registry.lookup(&RawKey::new("same")).unwrap().role, Role::Admin);
    }
}
