//! Strong type definitions for Keyward.
//!
//! Identifiers are newtypes to prevent misuse at compile time.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// A 16-byte random identifier for a stored key.
///
/// Unlike the fingerprint, the id is not secret: it is what administrators
/// use to refer to a key after creation.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct KeyId(pub [u8; 16]);

impl KeyId {
    /// Generate a new random id.
    pub fn generate() -> Self {
        Self(rand::random())
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Convert to hex string (32 characters).
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string.
    pub fn from_hex(s: &str) -> Result<Self, CoreError> {
        let bytes = hex::decode(s).map_err(|e| CoreError::InvalidKeyId(e.to_string()))?;
        let arr: [u8; 16] = bytes
            .try_into()
            .map_err(|_| CoreError::InvalidKeyId("expected 16 bytes".into()))?;
        Ok(Self(arr))
    }
}

impl fmt::Debug for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyId({})", self.to_hex())
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for KeyId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

/// Coarse role a key is issued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Analyst,
    Client,
}

impl Role {
    /// All roles, in configuration order.
    pub const ALL: [Role; 3] = [Role::Admin, Role::Analyst, Role::Client];

    /// Three-letter prefix carried by generated keys.
    pub const fn prefix(self) -> &'static str {
        match self {
            Role::Admin => "adm",
            Role::Analyst => "ana",
            Role::Client => "cli",
        }
    }

    /// Canonical lowercase name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Analyst => "analyst",
            Role::Client => "client",
        }
    }

    /// Resolve a key prefix back to its role.
    pub fn from_prefix(prefix: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.prefix() == prefix)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = CoreError;

    /// Accepts the canonical name or the key prefix.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|r| r.as_str() == s || r.prefix() == s)
            .ok_or_else(|| CoreError::InvalidRole(s.to_string()))
    }
}

/// Which credential source resolved a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeySource {
    /// The persistent key store.
    Store,
    /// The statically configured legacy registry.
    Legacy,
}

impl KeySource {
    pub const fn as_str(self) -> &'static str {
        match self {
            KeySource::Store => "store",
            KeySource::Legacy => "legacy",
        }
    }
}

impl fmt::Display for KeySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KeySource {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "store" => Ok(KeySource::Store),
            "legacy" => Ok(KeySource::Legacy),
            other => Err(CoreError::Decoding(format!("unknown key source: {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_id_hex_roundtrip() {
        let id = KeyId::from_bytes([0x42; 16]);
        let hex = id.to_hex();
        assert_eq!(hex.len(), 32);
        assert_eq!(KeyId::from_hex(&hex).unwrap(), id);
    }

    #[test]
    fn test_key_id_rejects_wrong_length() {
        assert!(KeyId::from_hex("abcd").is_err());
        assert!(KeyId::from_hex("not hex at all").is_err());
    }

    #[test]
    fn test_role_prefixes() {
        assert_eq!(Role::from_prefix("adm"), Some(Role::Admin));
        assert_eq!(Role::from_prefix("ana"), Some(Role::Analyst));
        assert_eq!(Role::from_prefix("cli"), Some(Role::Client));
        assert_eq!(Role::from_prefix("xyz"), None);
    }

    #[test]
    fn test_role_from_str() {
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!("ana".parse::<Role>().unwrap(), Role::Analyst);
        assert!("Admin".parse::<Role>().is_err());
    }

    #[test]
    fn test_serde_names() {
        assert_eq!(serde_json::to_string(&Role::Analyst).unwrap(), "\"analyst\"");
        assert_eq!(serde_json::to_string(&KeySource::Legacy).unwrap(), "\"legacy\"");
    }
}
