//! The persisted key entity and list filters.

use serde::{Deserialize, Serialize};

use keyward_core::{KeyFingerprint, KeyId, Role};
use keyward_perms::PermissionSet;

/// A stored API key. Holds the fingerprint, never the raw key.
///
/// Records are never deleted: revocation flips `active` and keeps the row
/// for audit continuity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyRecord {
    pub id: KeyId,
    pub fingerprint: KeyFingerprint,
    /// Display prefix of the raw key (e.g. `ana_x7Qp`).
    pub key_prefix: String,
    /// Owning user.
    pub user_id: String,
    pub role: Role,
    pub permissions: PermissionSet,
    pub description: Option<String>,
    pub active: bool,
    /// Unix ms.
    pub created_at: i64,
    /// Unix ms. `None` never expires.
    pub expires_at: Option<i64>,
    pub last_used_at: Option<i64>,
    pub usage_count: u64,
    /// Requests per minute. `None` is unlimited.
    pub rate_limit: Option<u32>,
    pub revoked_at: Option<i64>,
    pub revocation_reason: Option<String>,
}

/// Effective state of a record at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyStatus {
    Active,
    Revoked,
    Expired,
}

impl KeyRecord {
    /// Whether the expiration time has passed at `now`.
    pub fn is_expired(&self, now: i64) -> bool {
        self.expires_at.is_some_and(|expires| now > expires)
    }

    /// Revocation takes precedence over expiry.
    pub fn status(&self, now: i64) -> KeyStatus {
        if !self.active {
            KeyStatus::Revoked
        } else if self.is_expired(now) {
            KeyStatus::Expired
        } else {
            KeyStatus::Active
        }
    }
}

/// Filter for listing stored keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListFilter {
    pub user_id: Option<String>,
    pub role: Option<Role>,
    /// Skip revoked keys.
    pub active_only: bool,
}

impl ListFilter {
    /// A filter matching every key.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn role(mut self, role: Role) -> Self {
        self.role = Some(role);
        self
    }

    pub fn active_only(mut self) -> Self {
        self.active_only = true;
        self
    }

    /// Whether `record` passes this filter.
    pub fn matches(&self, record: &KeyRecord) -> bool {
        if let Some(user) = &self.user_id {
            if &record.user_id != user {
                return false;
            }
        }
        if let Some(role) = self.role {
            if record.role != role {
                return false;
            }
        }
        !(self.active_only && !record.active)
    }
}

#[cfg(test)]
pub(crate) fn sample_record(raw: &str, user_id: &str, role: Role, created_at: i64) -> KeyRecord {
    let raw = keyward_core::RawKey::new(raw);
    KeyRecord {
        id: KeyId::generate(),
        fingerprint: raw.fingerprint(),
        key_prefix: raw.display_prefix(),
        user_id: user_id.into(),
        role,
        permissions: keyward_perms::default_scopes(role),
        description: None,
        active: true,
        created_at,
        expires_at: None,
        last_used_at: None,
        usage_count: 0,
        rate_limit: None,
        revoked_at: None,
        revocation_reason: None,
    }
}
