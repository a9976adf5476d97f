//! Validation-as-data.
//!
//! Rule sets collect every failure into a [`ValidationResult`] instead of
//! returning on the first one, so callers can report all field errors at once
//! and decide for themselves whether a failure is fatal.

use serde::{Deserialize, Serialize};

/// A single field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationErrorDetail {
    /// Dotted path of the offending field (e.g. `items[2].quantity`).
    pub field: String,
    pub message: String,
}

impl ValidationErrorDetail {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Outcome of running a rule set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    errors: Vec<ValidationErrorDetail>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[ValidationErrorDetail] {
        &self.errors
    }

    /// Record a failure unconditionally.
    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ValidationErrorDetail::new(field, message));
    }

    /// Record `message` against `field` when `ok` is false.
    pub fn ensure(&mut self, ok: bool, field: impl Into<String>, message: impl Into<String>) {
        if !ok {
            self.push(field, message);
        }
    }

    /// Fold a nested result in, prefixing each field with `prefix.`.
    pub fn merge_nested(&mut self, prefix: &str, nested: ValidationResult) {
        self.errors.extend(nested.errors.into_iter().map(|e| ValidationErrorDetail {
            field: format!("{prefix}.{}", e.field),
            message: e.message,
        }));
    }

    /// Returns `Ok(())` when valid, otherwise the collected errors.
    pub fn into_result(self) -> Result<(), Vec<ValidationErrorDetail>> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(self.errors)
        }
    }
}

/// Character-count bounds check (inclusive), counting Unicode scalar values.
pub fn char_len_between(value: &str, min: usize, max: usize) -> bool {
    let len = value.chars().count();
    len >= min && len <= max
}
