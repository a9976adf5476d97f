//! Domain error model.

use thiserror::Error;

/// Domain-level error.
///
/// Business-rule checks on an aggregate do not produce this type; they are
/// reported as a [`crate::ValidationResult`]. What remains is input that
/// cannot even be turned into a domain value.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),
}

impl DomainError {
    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }
}
