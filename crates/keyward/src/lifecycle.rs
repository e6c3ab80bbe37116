//! Key lifecycle: create, revoke, list, and validate pass-through.

use std::sync::Arc;

use serde::Serialize;

use keyward_core::{
    AuditAction, AuditEvent, KeyId, RawKey, Role, KEY_PAYLOAD_LEN, MILLIS_PER_DAY,
};
use keyward_perms::{default_scopes, PermissionSet};
use keyward_store::{InsertResult, KeyRecord, KeyStore, ListFilter};

use crate::error::{LifecycleError, Rejection, Result};
use crate::legacy::LegacyRegistry;
use crate::principal::Principal;
use crate::validator::{emit_audit, Validator};

/// Configuration for key creation.
#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    /// Base62 characters after the role prefix.
    pub payload_len: usize,
    /// Applied when a create request does not set `expires_in_days`.
    pub default_expires_in_days: Option<u32>,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            payload_len: KEY_PAYLOAD_LEN,
            default_expires_in_days: None,
        }
    }
}

/// Optional parameters for [`KeyLifecycle::create`].
#[derive(Debug, Clone, Default)]
pub struct CreateOptions {
    pub description: Option<String>,
    pub expires_in_days: Option<u32>,
    /// Scope strings. The role's defaults when `None`.
    pub permissions: Option<Vec<String>>,
    /// Requests per minute.
    pub rate_limit: Option<u32>,
    /// Who is creating the key. Defaults to the owning user.
    pub actor: Option<String>,
}

impl CreateOptions {
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn expires_in_days(mut self, days: u32) -> Self {
        self.expires_in_days = Some(days);
        self
    }

    pub fn permissions<I, P>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        self.permissions = Some(permissions.into_iter().map(Into::into).collect());
        self
    }

    pub fn rate_limit(mut self, per_minute: u32) -> Self {
        self.rate_limit = Some(per_minute);
        self
    }

    pub fn actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }
}

/// A stored key as shown to administrators. Never carries the fingerprint
/// or the raw key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeySummary {
    pub id: KeyId,
    pub key_prefix: String,
    pub user_id: String,
    pub role: Role,
    pub permissions: Vec<String>,
    pub description: Option<String>,
    pub active: bool,
    pub created_at: i64,
    pub expires_at: Option<i64>,
    pub last_used_at: Option<i64>,
    pub usage_count: u64,
    pub rate_limit: Option<u32>,
    pub revoked_at: Option<i64>,
    pub revocation_reason: Option<String>,
}

impl From<&KeyRecord> for KeySummary {
    fn from(record: &KeyRecord) -> Self {
        Self {
            id: record.id,
            key_prefix: record.key_prefix.clone(),
            user_id: record.user_id.clone(),
            role: record.role,
            permissions: record.permissions.to_strings(),
            description: record.description.clone(),
            active: record.active,
            created_at: record.created_at,
            expires_at: record.expires_at,
            last_used_at: record.last_used_at,
            usage_count: record.usage_count,
            rate_limit: record.rate_limit,
            revoked_at: record.revoked_at,
            revocation_reason: record.revocation_reason.clone(),
        }
    }
}

/// Result of [`KeyLifecycle::create`]. The only place the raw key appears.
#[derive(Debug)]
pub struct CreatedKey {
    pub raw: RawKey,
    pub summary: KeySummary,
}

/// How an administrator names a key to revoke.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyRef {
    Id(KeyId),
    Raw(RawKey),
}

impl KeyRef {
    /// A 32-character hex string is an id; anything else is a raw key.
    pub fn parse(s: &str) -> Self {
        let s = s.trim();
        if s.len() == 32 && s.bytes().all(|b| b.is_ascii_hexdigit()) {
            if let Ok(id) = KeyId::from_hex(s) {
                return KeyRef::Id(id);
            }
        }
        KeyRef::Raw(RawKey::new(s))
    }
}

impl From<KeyId> for KeyRef {
    fn from(id: KeyId) -> Self {
        KeyRef::Id(id)
    }
}

impl From<RawKey> for KeyRef {
    fn from(raw: RawKey) -> Self {
        KeyRef::Raw(raw)
    }
}

/// Acknowledgement of a revocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevokeAck {
    pub id: KeyId,
    pub key_prefix: String,
    /// The key was already inactive; its original reason is kept.
    pub already_revoked: bool,
}

/// Administrative operations over stored keys.
pub struct KeyLifecycle<S: KeyStore + 'static> {
    validator: Validator<S>,
    config: LifecycleConfig,
}

impl<S: KeyStore + 'static> KeyLifecycle<S> {
    /// Create a lifecycle manager with a default validator.
    pub fn new(store: Arc<S>, legacy: Arc<LegacyRegistry>) -> Self {
        Self::from_validator(Validator::new(store, legacy))
    }

    /// Wrap an existing validator, sharing its store and clock.
    pub fn from_validator(validator: Validator<S>) -> Self {
        Self {
            validator,
            config: LifecycleConfig::default(),
        }
    }

    pub fn with_config(mut self, config: LifecycleConfig) -> Self {
        self.config = config;
        self
    }

    pub fn validator(&self) -> &Validator<S> {
        &self.validator
    }

    fn store(&self) -> &S {
        self.validator.store()
    }

    fn now(&self) -> i64 {
        self.validator.clock().now_millis()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Create
    // ─────────────────────────────────────────────────────────────────────────

    /// Issue a new key for `user_id`.
    ///
    /// The raw key is returned exactly once. A fingerprint collision is
    /// retried with a fresh key; a second collision fails.
    pub async fn create(
        &self,
        role: Role,
        user_id: &str,
        options: CreateOptions,
    ) -> Result<CreatedKey> {
        let user_id = user_id.trim();
        if user_id.is_empty() {
            return Err(LifecycleError::InvalidRequest("user id must not be empty".into()));
        }
        if options.rate_limit == Some(0) {
            return Err(LifecycleError::InvalidRequest(
                "rate limit must be at least 1 request per minute".into(),
            ));
        }

        let permissions = match &options.permissions {
            None => default_scopes(role),
            Some(scopes) if scopes.is_empty() => {
                return Err(LifecycleError::InvalidRequest(
                    "explicit permission list must not be empty".into(),
                ))
            }
            Some(scopes) => PermissionSet::parse(scopes)?,
        };

        let now = self.now();
        let expires_at = match options.expires_in_days.or(self.config.default_expires_in_days) {
            None => None,
            Some(0) => {
                return Err(LifecycleError::InvalidRequest(
                    "expiry must be at least one day".into(),
                ))
            }
            Some(days) => Some(
                i64::from(days)
                    .checked_mul(MILLIS_PER_DAY)
                    .and_then(|ms| now.checked_add(ms))
                    .ok_or_else(|| LifecycleError::InvalidRequest("expiry out of range".into()))?,
            ),
        };

        for attempt in 1..=2 {
            let raw = RawKey::generate(role, self.config.payload_len);
            let record = KeyRecord {
                id: KeyId::generate(),
                fingerprint: raw.fingerprint(),
                key_prefix: raw.display_prefix(),
                user_id: user_id.to_string(),
                role,
                permissions: permissions.clone(),
                description: options.description.clone(),
                active: true,
                created_at: now,
                expires_at,
                last_used_at: None,
                usage_count: 0,
                rate_limit: options.rate_limit,
                revoked_at: None,
                revocation_reason: None,
            };

            match self.store().insert(&record).await? {
                InsertResult::Inserted => {
                    tracing::info!(
                        key_id = %record.id,
                        key_prefix = %record.key_prefix,
                        role = %role,
                        user_id = %user_id,
                        "created API key"
                    );

                    let actor = options.actor.as_deref().unwrap_or(user_id);
                    let detail = format!("role={} user={}", role.as_str(), user_id);
                    let event =
                        AuditEvent::success(now, actor, AuditAction::Create, &record.key_prefix)
                            .with_detail(detail);
                    self.append_audit(event).await;

                    return Ok(CreatedKey {
                        summary: KeySummary::from(&record),
                        raw,
                    });
                }
                InsertResult::DuplicateFingerprint => {
                    tracing::warn!(
                        attempt,
                        role = %role,
                        "generated key collided with an existing fingerprint"
                    );
                }
            }
        }

        Err(LifecycleError::DuplicateFingerprint)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Revoke
    // ─────────────────────────────────────────────────────────────────────────

    /// Deactivate a stored key by id or raw value.
    ///
    /// Legacy keys cannot be revoked here; they are removed from
    /// configuration instead.
    pub async fn revoke(&self, key: &KeyRef, reason: &str, actor: &str) -> Result<RevokeAck> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(LifecycleError::InvalidRequest(
                "revocation reason must not be empty".into(),
            ));
        }

        let record = match key {
            KeyRef::Id(id) => self.store().get(id).await?,
            KeyRef::Raw(raw) => self.store().lookup(&raw.fingerprint()).await?,
        };
        let record = record.ok_or_else(|| {
            LifecycleError::KeyNotFound(match key {
                KeyRef::Id(id) => id.to_hex(),
                KeyRef::Raw(raw) => raw.display_prefix(),
            })
        })?;

        let now = self.now();
        let already_revoked = !record.active;
        self.store().mark_revoked(&record.id, reason, now).await?;
        self.validator.limiter().forget(&record.id);

        tracing::info!(
            key_id = %record.id,
            key_prefix = %record.key_prefix,
            already_revoked,
            "revoked API key"
        );

        let event = AuditEvent::success(now, actor, AuditAction::Revoke, &record.key_prefix)
            .with_detail(reason);
        self.append_audit(event).await;

        Ok(RevokeAck {
            id: record.id,
            key_prefix: record.key_prefix,
            already_revoked,
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────

    /// List stored keys, newest first.
    pub async fn list(&self, filter: &ListFilter) -> Result<Vec<KeySummary>> {
        let records = self.store().list(filter).await?;
        Ok(records.iter().map(KeySummary::from).collect())
    }

    /// The most recent audit events, newest first.
    pub async fn audit_log(&self, limit: usize) -> Result<Vec<AuditEvent>> {
        Ok(self.store().audit_log(limit).await?)
    }

    /// Validate a presented key.
    pub async fn validate(&self, raw: &RawKey) -> std::result::Result<Principal, Rejection> {
        self.validator.validate(raw).await
    }

    /// Administrative audit writes are awaited, but a failure does not undo
    /// the operation it records.
    async fn append_audit(&self, event: AuditEvent) {
        emit_audit(&event);
        if let Err(e) = self.store().append_audit(&event).await {
            tracing::warn!(action = %event.action, error = %e, "failed to append audit event");
        }
    }
}
