//! The Validator: raw key to Principal or Rejection.
//!
//! Resolution order:
//!
//! 1. Blank or absent key: `Missing`, no source is consulted.
//! 2. Fingerprint lookup in the store, bounded by `store_timeout`.
//!    - Found: revocation, expiry and rate limit decide the result. The
//!      legacy registry is not consulted.
//!    - NotFound or Unavailable: fall through.
//! 3. Legacy registry by raw value: hit authorizes, miss is `NotFound`.
//!
//! Usage counters and validation audit events are written from spawned
//! tasks and never delay the decision.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;

use keyward_core::{AuditAction, AuditEvent, Clock, KeySource, RawKey, SystemClock};
use keyward_store::{KeyRecord, KeyStatus, KeyStore, LookupOutcome, StoreExt};

use crate::error::Rejection;
use crate::legacy::LegacyRegistry;
use crate::principal::Principal;
use crate::rate_limit::RateLimiter;

/// Actor recorded for validation failures with no resolved owner.
pub const ANONYMOUS_ACTOR: &str = "anonymous";

/// Tracing target carrying audit events.
pub const AUDIT_TARGET: &str = "keyward::audit";

/// Configuration for the Validator.
#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    /// Upper bound on a store lookup before falling back to legacy keys.
    pub store_timeout: Duration,
    /// Whether successful store validations bump usage counters.
    pub track_usage: bool,
    /// Whether validation outcomes are appended to the audit trail.
    pub audit_validations: bool,
    /// Upper bound on one background usage or audit write.
    pub background_write_timeout: Duration,
    /// Background writes allowed in flight. Further writes are dropped.
    pub max_pending_writes: usize,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            store_timeout: Duration::from_millis(250),
            track_usage: true,
            audit_validations: true,
            background_write_timeout: Duration::from_secs(1),
            max_pending_writes: 256,
        }
    }
}

/// Validates presented keys against the store, then the legacy registry.
///
/// Safe to share across tasks: the registry is read-only, the store is
/// externally synchronized and the rate limiter locks internally.
pub struct Validator<S: KeyStore + 'static> {
    store: Arc<S>,
    legacy: Arc<LegacyRegistry>,
    clock: Arc<dyn Clock>,
    limiter: RateLimiter,
    pending_writes: Arc<Semaphore>,
    config: ValidatorConfig,
}

impl<S: KeyStore + 'static> Validator<S> {
    /// Create a validator using the system clock and default configuration.
    pub fn new(store: Arc<S>, legacy: Arc<LegacyRegistry>) -> Self {
        Self {
            store,
            legacy,
            clock: Arc::new(SystemClock),
            limiter: RateLimiter::new(),
            pending_writes: Arc::new(Semaphore::new(ValidatorConfig::default().max_pending_writes)),
            config: ValidatorConfig::default(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_config(mut self, config: ValidatorConfig) -> Self {
        self.pending_writes = Arc::new(Semaphore::new(config.max_pending_writes));
        self.config = config;
        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn legacy(&self) -> &LegacyRegistry {
        &self.legacy
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    pub(crate) fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Validate a key that may be absent, e.g. straight from a header.
    pub async fn validate_presented(
        &self,
        presented: Option<&RawKey>,
    ) -> Result<Principal, Rejection> {
        match presented {
            Some(raw) => self.validate(raw).await,
            None => Err(Rejection::Missing),
        }
    }

    /// Validate a presented key.
    pub async fn validate(&self, raw: &RawKey) -> Result<Principal, Rejection> {
        if raw.is_blank() {
            tracing::debug!("rejecting request without API key");
            return Err(Rejection::Missing);
        }

        let key_prefix = raw.display_prefix();
        let fingerprint = raw.fingerprint();

        match self
            .store
            .lookup_within(&fingerprint, self.config.store_timeout)
            .await
        {
            LookupOutcome::Found(record) => return self.check_record(record, &key_prefix),
            LookupOutcome::NotFound => {
                tracing::debug!(key_prefix = %key_prefix, "key not in store, trying legacy keys");
            }
            LookupOutcome::Unavailable(reason) => {
                tracing::warn!(
                    key_prefix = %key_prefix,
                    reason = %reason,
                    "key store unavailable, falling back to legacy keys"
                );
            }
        }

        match self.legacy.lookup(raw) {
            Some(entry) => {
                let principal = Principal::from_legacy(entry);
                self.audit_success(&principal);
                Ok(principal)
            }
            None => Err(self.reject(Rejection::NotFound, ANONYMOUS_ACTOR, &key_prefix, None)),
        }
    }

    fn check_record(&self, record: KeyRecord, key_prefix: &str) -> Result<Principal, Rejection> {
        let now = self.clock.now_millis();
        let source = Some(KeySource::Store);

        let rejection = match record.status(now) {
            KeyStatus::Active => None,
            KeyStatus::Revoked => Some(Rejection::Revoked),
            KeyStatus::Expired => Some(Rejection::Expired),
        };
        if let Some(rejection) = rejection {
            // A dead key never needs its bucket again.
            self.limiter.forget(&record.id);
            return Err(self.reject(rejection, &record.user_id, key_prefix, source));
        }

        if let Some(limit) = record.rate_limit {
            if let Err(retry_after_ms) = self.limiter.check(record.id, limit, now) {
                return Err(self.reject(
                    Rejection::RateLimited { retry_after_ms },
                    &record.user_id,
                    key_prefix,
                    source,
                ));
            }
        }

        let principal = Principal::from_record(&record);

        if self.config.track_usage {
            let store = Arc::clone(&self.store);
            let id = record.id;
            self.spawn_write("usage", async move {
                if let Err(e) = store.record_usage(&id, now).await {
                    tracing::debug!(key_id = %id, error = %e, "failed to record key usage");
                }
            });
        }

        self.audit_success(&principal);
        Ok(principal)
    }

    fn audit_success(&self, principal: &Principal) {
        tracing::debug!(
            principal = %principal.id,
            role = %principal.role,
            source = %principal.source,
            key_prefix = %principal.key_prefix,
            "API key authorized"
        );

        let event = AuditEvent::success(
            self.clock.now_millis(),
            principal.id.clone(),
            AuditAction::ValidateSuccess,
            principal.key_prefix.clone(),
        )
        .with_source(principal.source);
        self.spawn_audit(event);
    }

    fn reject(
        &self,
        rejection: Rejection,
        actor: &str,
        key_prefix: &str,
        source: Option<KeySource>,
    ) -> Rejection {
        tracing::info!(
            key_prefix = %key_prefix,
            reason = rejection.reason(),
            "API key rejected"
        );

        let mut event = AuditEvent::failure(
            self.clock.now_millis(),
            actor,
            AuditAction::ValidateFailure,
            key_prefix,
            rejection.reason(),
        );
        if let Rejection::RateLimited { retry_after_ms } = &rejection {
            event = event.with_detail(format!("retry after {retry_after_ms}ms"));
        }
        if let Some(source) = source {
            event = event.with_source(source);
        }
        self.spawn_audit(event);

        rejection
    }

    fn spawn_audit(&self, event: AuditEvent) {
        emit_audit(&event);
        if !self.config.audit_validations {
            return;
        }

        let store = Arc::clone(&self.store);
        self.spawn_write("audit", async move {
            if let Err(e) = store.append_audit(&event).await {
                tracing::warn!(action = %event.action, error = %e, "failed to append audit event");
            }
        });
    }

    /// Run a best-effort write in the background.
    ///
    /// Writes beyond `max_pending_writes` are dropped. Each write is cut off
    /// after `background_write_timeout`.
    fn spawn_write<F>(&self, kind: &'static str, write: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let Ok(permit) = Arc::clone(&self.pending_writes).try_acquire_owned() else {
            tracing::debug!(kind, "background write backlog full, dropping write");
            return;
        };

        let limit = self.config.background_write_timeout;
        tokio::spawn(async move {
            let _permit = permit;
            if tokio::time::timeout(limit, write).await.is_err() {
                tracing::debug!(
                    kind,
                    timeout_ms = limit.as_millis() as u64,
                    "background write timed out"
                );
            }
        });
    }

    /// Background writes currently in flight.
    pub fn pending_writes(&self) -> usize {
        self.config
            .max_pending_writes
            .saturating_sub(self.pending_writes.available_permits())
    }
}

/// Emit an audit event under the `keyward::audit` target.
pub(crate) fn emit_audit(event: &AuditEvent) {
    tracing::event!(
        target: AUDIT_TARGET,
        tracing::Level::INFO,
        audit.timestamp = event.timestamp,
        audit.actor = %event.actor,
        audit.action = %event.action,
        audit.key_prefix = %event.key_prefix,
        audit.outcome = %event.outcome,
        audit.detail = event.detail.as_deref().unwrap_or(""),
        audit.source = event.source.map(|s| s.as_str()).unwrap_or(""),
        "audit_event"
    );
}
