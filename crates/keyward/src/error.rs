//! Error types for validation and key lifecycle.

use keyward_perms::PermsError;
use keyward_store::StoreError;
use thiserror::Error;

/// Why a presented key was not accepted.
///
/// Each variant is a distinct audit reason. Callers outside the service
/// should be shown [`Rejection::public_message`], which does not separate
/// revoked, expired and unknown keys.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    /// No key was presented, or it was blank.
    #[error("no API key presented")]
    Missing,

    /// Neither the store nor the legacy registry knows the key.
    #[error("API key not recognized")]
    NotFound,

    /// The key exists but has been revoked.
    #[error("API key has been revoked")]
    Revoked,

    /// The key exists but its expiration time has passed.
    #[error("API key has expired")]
    Expired,

    /// The key's per-minute request budget is exhausted.
    #[error("rate limit exceeded, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },
}

impl Rejection {
    /// Short reason recorded in audit events and logs.
    pub const fn reason(&self) -> &'static str {
        match self {
            Rejection::Missing => "missing",
            Rejection::NotFound => "not-found",
            Rejection::Revoked => "revoked",
            Rejection::Expired => "expired",
            Rejection::RateLimited { .. } => "rate-limited",
        }
    }

    /// Message safe to return to the caller.
    pub const fn public_message(&self) -> &'static str {
        match self {
            Rejection::Missing => "API key required",
            Rejection::RateLimited { .. } => "rate limit exceeded",
            Rejection::NotFound | Rejection::Revoked | Rejection::Expired => {
                "invalid or expired API key"
            }
        }
    }
}

/// Errors that can occur during key lifecycle operations.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Malformed permission in a create request.
    #[error("permission error: {0}")]
    Permission(#[from] PermsError),

    /// A freshly generated key collided with an existing fingerprint twice.
    #[error("generated key collided with an existing fingerprint after retry")]
    DuplicateFingerprint,

    /// No stored key matches the given id or raw key.
    #[error("key not found: {0}")]
    KeyNotFound(String),

    /// Invalid request parameters.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// Result type for lifecycle operations.
pub type Result<T> = std::result::Result<T, LifecycleError>;
