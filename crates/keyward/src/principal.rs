//! The identity attached to an authorized request.

use serde::Serialize;

use keyward_core::{KeyId, KeySource, Role};
use keyward_perms::{Permission, PermissionSet, PermsError};
use keyward_store::KeyRecord;

use crate::legacy::LegacyKeyEntry;

/// Resolved identity and permissions of a validated key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    /// Owning user for stored keys, `legacy-{role}` for legacy keys.
    pub id: String,
    pub role: Role,
    pub permissions: PermissionSet,
    pub source: KeySource,
    /// Unix ms. Always `None` for legacy keys.
    pub expires_at: Option<i64>,
    /// Set only when `source` is [`KeySource::Store`].
    pub key_id: Option<KeyId>,
    pub key_prefix: String,
}

impl Principal {
    pub fn from_record(record: &KeyRecord) -> Self {
        Self {
            id: record.user_id.clone(),
            role: record.role,
            permissions: record.permissions.clone(),
            source: KeySource::Store,
            expires_at: record.expires_at,
            key_id: Some(record.id),
            key_prefix: record.key_prefix.clone(),
        }
    }

    pub fn from_legacy(entry: &LegacyKeyEntry) -> Self {
        Self {
            id: entry.principal_id(),
            role: entry.role,
            permissions: entry.permissions.clone(),
            source: KeySource::Legacy,
            expires_at: None,
            key_id: None,
            key_prefix: entry.display_prefix(),
        }
    }

    /// Whether this principal holds `required`.
    pub fn allows(&self, required: &Permission) -> bool {
        self.permissions.allows(required)
    }

    /// Parse `required` and check it.
    pub fn allows_str(&self, required: &str) -> Result<bool, PermsError> {
        self.permissions.allows_str(required)
    }
}
