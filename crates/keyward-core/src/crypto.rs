//! Secret key material and its one-way fingerprint.
//!
//! Wraps SHA-256 hashing and key generation with strong types. Raw keys
//! never print in full: `Debug` shows only the display prefix.

use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::error::CoreError;
use crate::types::Role;

/// Length of the random payload after the role prefix and separator.
pub const KEY_PAYLOAD_LEN: usize = 40;

/// Separator between the role prefix and the random payload.
pub const KEY_SEPARATOR: char = '_';

/// Number of leading characters retained for display and audit.
pub const DISPLAY_PREFIX_LEN: usize = 8;

/// Base62 alphabet: URL-safe, no padding or punctuation.
const BASE62_CHARS: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// A raw API key as presented by a caller or returned once at creation.
#[derive(Clone, PartialEq, Eq)]
pub struct RawKey(String);

impl RawKey {
    /// Wrap a presented key string.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Generate a fresh key for `role`: `{prefix}_{payload_len base62 chars}`.
    ///
    /// Uses `rand::thread_rng()`, a CSPRNG reseeded from the OS.
    pub fn generate(role: Role, payload_len: usize) -> Self {
        let mut rng = rand::thread_rng();
        let payload: String = (0..payload_len)
            .map(|_| BASE62_CHARS[rng.gen_range(0..BASE62_CHARS.len())] as char)
            .collect();
        Self(format!("{}{}{}", role.prefix(), KEY_SEPARATOR, payload))
    }

    /// Access the secret value. Callers must not log the result.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Compute the fingerprint of this key.
    pub fn fingerprint(&self) -> KeyFingerprint {
        KeyFingerprint::of(&self.0)
    }

    /// Leading characters safe to show in listings and audit records.
    ///
    /// Capped at half the key length so short legacy keys are never
    /// shown in full.
    pub fn display_prefix(&self) -> String {
        let len = self.0.chars().count();
        let take = DISPLAY_PREFIX_LEN.min(len / 2);
        self.0.chars().take(take).collect()
    }

    /// The role encoded in the key prefix, if it carries one.
    pub fn role_hint(&self) -> Option<Role> {
        let (prefix, _) = self.0.split_once(KEY_SEPARATOR)?;
        Role::from_prefix(prefix)
    }

    /// Whether the value is empty or whitespace only.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for RawKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RawKey({}…)", self.display_prefix())
    }
}

impl From<&str> for RawKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for RawKey {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// A 32-byte SHA-256 digest of a raw key. The only persisted form of a key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyFingerprint(pub [u8; 32]);

impl KeyFingerprint {
    /// Hash raw key material.
    pub fn of(raw: &str) -> Self {
        let digest = Sha256::digest(raw.as_bytes());
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&digest);
        Self(bytes)
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string.
    pub fn from_hex(s: &str) -> Result<Self, CoreError> {
        let bytes = hex::decode(s).map_err(|e| CoreError::InvalidFingerprint(e.to_string()))?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CoreError::InvalidFingerprint("expected 32 bytes".into()))?;
        Ok(Self(arr))
    }
}

impl fmt::Debug for KeyFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyFingerprint({})", &self.to_hex()[..12])
    }
}

impl AsRef<[u8]> for KeyFingerprint {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Compare two byte strings without short-circuiting on the first mismatch.
///
/// Length is still observable; every differing byte position is not.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
