//! Error types for Keyward core primitives.

use thiserror::Error;

/// Errors raised while parsing or decoding core types.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid key id: {0}")]
    InvalidKeyId(String),

    #[error("invalid fingerprint: {0}")]
    InvalidFingerprint(String),

    #[error("unknown role: {0}")]
    InvalidRole(String),

    #[error("decoding error: {0}")]
    Decoding(String),
}
