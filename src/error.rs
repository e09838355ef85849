//! Error types for the planning engine.
//!
//! Only file-level failures and rejected direct edits are errors. Malformed
//! import rows and unresolved references are handled in place (dropped or
//! treated as unassigned) and never surface here.

use std::path::PathBuf;

use thiserror::Error;

/// Result type for planner operations.
pub type Result<T> = std::result::Result<T, PlannerError>;

/// Errors that can occur in planner operations.
#[derive(Debug, Error)]
pub enum PlannerError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A workbook could not be read or parsed as a whole.
    #[error("cannot read workbook {path}: {message}")]
    Workbook { path: PathBuf, message: String },

    /// Workbook path is neither a CSV directory nor a `.json` file.
    #[error("unsupported workbook format: {path}")]
    UnsupportedFormat { path: PathBuf },

    /// A direct edit failed local validation; nothing was written.
    #[error("invalid value for {field}: {message}")]
    Validation { field: String, message: String },

    /// Entity not found
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// Name already taken within a collection.
    #[error("{kind} '{name}' already exists")]
    Duplicate { kind: &'static str, name: String },

    /// Epic still owns tasks and cannot be deleted.
    #[error("epic '{id}' has {count} task(s) and cannot be deleted")]
    EpicInUse { id: String, count: usize },

    /// The Backlog identity cannot be used for a sprint.
    #[error("'{0}' is reserved for the backlog")]
    ReservedIdentity(String),
}

impl PlannerError {
    /// Create a validation error
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a not-found error
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound { kind, id: id.into() }
    }

    /// Create a workbook (file-level) error
    pub fn workbook(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Workbook {
            path: path.into(),
            message: message.into(),
        }
    }
}
