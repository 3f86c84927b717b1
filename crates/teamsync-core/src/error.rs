//! Error types for the reconciliation engine.

use thiserror::Error;

use crate::directory::DirectoryError;

/// Result type alias using `ReconcileError`.
pub type ReconcileResult<T> = Result<T, ReconcileError>;

/// Input or target problems detected before any remote mutation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// Required header columns are absent.
    #[error("missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    /// The table has a header but no data rows.
    #[error("input contains no records")]
    Empty,

    /// A row could not be read or has empty required fields.
    #[error("malformed input at line {line}: {message}")]
    Malformed { line: u64, message: String },

    /// The input file could not be opened.
    #[error("cannot read input {path}: {message}")]
    Unreadable { path: String, message: String },

    /// The target team does not exist.
    #[error("team not found: {0}")]
    TeamNotFound(String),

    /// Engine configuration is invalid.
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Run-fatal errors. Per-item failures never surface here; they are recorded
/// in the run report instead.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A listing call failed, so current state is unknown and no diff can be
    /// computed.
    #[error("cannot read current state ({context}): {source}")]
    Directory {
        context: String,
        #[source]
        source: DirectoryError,
    },
}

impl ReconcileError {
    pub(crate) fn directory(context: impl Into<String>, source: DirectoryError) -> Self {
        Self::Directory {
            context: context.into(),
            source,
        }
    }

    /// Returns true for errors caused by input or target validation.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}
