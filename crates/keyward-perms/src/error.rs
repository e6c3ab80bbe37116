//! Error types for the permissions module.

use thiserror::Error;

/// Errors that can occur while parsing permissions.
#[derive(Debug, Error)]
pub enum PermsError {
    /// Malformed permission string.
    #[error("invalid permission {0}")]
    InvalidPermission(String),
}

/// Result type for permission operations.
pub type Result<T> = std::result::Result<T, PermsError>;
