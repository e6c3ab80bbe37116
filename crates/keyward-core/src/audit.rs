//! Audit events for key lifecycle and validation.
//!
//! Events are append-only. They carry the display prefix of a key, never
//! the key itself or its fingerprint.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;
use crate::types::KeySource;

/// Action recorded by an audit event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuditAction {
    Create,
    Revoke,
    ValidateSuccess,
    ValidateFailure,
}

impl AuditAction {
    pub const fn as_str(self) -> &'static str {
        match self {
            AuditAction::Create => "create",
            AuditAction::Revoke => "revoke",
            AuditAction::ValidateSuccess => "validate-success",
            AuditAction::ValidateFailure => "validate-failure",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditAction {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(AuditAction::Create),
            "revoke" => Ok(AuditAction::Revoke),
            "validate-success" => Ok(AuditAction::ValidateSuccess),
            "validate-failure" => Ok(AuditAction::ValidateFailure),
            other => Err(CoreError::Decoding(format!("unknown audit action: {other}"))),
        }
    }
}

/// A single audit record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// When the event occurred (Unix ms).
    pub timestamp: i64,
    /// Who triggered it: an administrator, or the principal id on validation.
    pub actor: String,
    pub action: AuditAction,
    /// Display prefix of the key involved.
    pub key_prefix: String,
    /// `"success"` or the rejection/failure reason.
    pub outcome: String,
    /// Free-form context, e.g. a revocation reason.
    pub detail: Option<String>,
    /// The source that resolved the key, for validation events.
    pub source: Option<KeySource>,
}

impl AuditEvent {
    /// Outcome string for successful actions.
    pub const SUCCESS: &'static str = "success";

    /// Create a successful event.
    pub fn success(
        timestamp: i64,
        actor: impl Into<String>,
        action: AuditAction,
        key_prefix: impl Into<String>,
    ) -> Self {
        Self {
            timestamp,
            actor: actor.into(),
            action,
            key_prefix: key_prefix.into(),
            outcome: Self::SUCCESS.to_string(),
            detail: None,
            source: None,
        }
    }

    /// Create a failed event with the given reason.
    pub fn failure(
        timestamp: i64,
        actor: impl Into<String>,
        action: AuditAction,
        key_prefix: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            outcome: reason.into(),
            ..Self::success(timestamp, actor, action, key_prefix)
        }
    }

    /// Attach free-form context.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Attach the resolving source.
    pub fn with_source(mut self, source: KeySource) -> Self {
        self.source = Some(source);
        self
    }

    pub fn is_success(&self) -> bool {
        self.outcome == Self::SUCCESS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_parse_roundtrip() {
        for action in [
            AuditAction::Create,
            AuditAction::Revoke,
            AuditAction::ValidateSuccess,
            AuditAction::ValidateFailure,
        ] {
            assert_eq!(action.as_str().parse::<AuditAction>().unwrap(), action);
        }
        assert!("delete".parse::<AuditAction>().is_err());
    }

    #[test]
    fn test_serde_matches_stored_form() {
        for action in [AuditAction::Create, AuditAction::ValidateSuccess] {
            let json = serde_json::to_string(&action).unwrap();
            assert_eq!(json, format!("\"{}\"", action.as_str()));
            assert_eq!(serde_json::from_str::<AuditAction>(&json).unwrap(), action);
        }
        assert_eq!(
            serde_json::to_string(&AuditAction::ValidateFailure).unwrap(),
            "\"validate-failure\""
        );
    }

    #[test]
    fn test_failure_event() {
        let event =
            AuditEvent::failure(10, "user-1", AuditAction::ValidateFailure, "ana_abcd", "expired")
                .with_source(KeySource::Store);
        assert!(!event.is_success());
        assert_eq!(event.outcome, "expired");
        assert_eq!(event.source, Some(KeySource::Store));
        assert_eq!(event.detail, None);
    }
}
