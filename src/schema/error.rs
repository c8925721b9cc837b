use std::collections::BTreeMap;

use thiserror::Error;

/// Schema violation with per-field detail.
///
/// Field keys are the input names as the caller sent them (`title`, `dueDate`, `id`),
/// so the detail can be rendered back without translation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ValidationError {
    pub message: String,
    pub field_errors: BTreeMap<String, String>,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            field_errors: BTreeMap::new(),
        }
    }

    /// Single-field failure
    pub fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut error = Self::new("Validation failed");
        error.push(field, message);
        error
    }

    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.field_errors.insert(field.into(), message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.field_errors.is_empty()
    }
}
