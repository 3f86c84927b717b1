//! CLI error types and exit codes

use teamsync_connector_graph::GraphError;
use teamsync_core::{DirectoryErrorKind, ReconcileError, ValidationError};
use thiserror::Error;

/// Exit codes for the CLI
/// - 0: Success (including runs with recorded per-item failures)
/// - 1: General error
/// - 3: Network error
/// - 4: Validation error
pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Directory error: {0}")]
    Directory(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Network(_) => 3,
            CliError::Validation(_) => 4,
            CliError::Directory(_) | CliError::Config(_) | CliError::Io(_) => 1,
        }
    }

    /// Print the error to stderr with appropriate formatting
    pub fn print(&self) {
        let use_color = std::env::var("NO_COLOR").is_err();

        if use_color {
            eprintln!("\x1b[31mError:\x1b[0m {self}");
        } else {
            eprintln!("Error: {self}");
        }

        if let Some(suggestion) = self.suggestion() {
            if use_color {
                eprintln!("\n\x1b[33mSuggestion:\x1b[0m {suggestion}");
            } else {
                eprintln!("\nSuggestion: {suggestion}");
            }
        }
    }

    fn suggestion(&self) -> Option<&'static str> {
        match self {
            CliError::Network(_) => Some("Check connectivity to Microsoft Graph and run again; completed changes are not repeated."),
            CliError::Config(_) => Some("Set TEAMSYNC_TENANT_ID, TEAMSYNC_CLIENT_ID and TEAMSYNC_CLIENT_SECRET, or point --config at a teamsync.yaml."),
            _ => None,
        }
    }
}

impl From<ValidationError> for CliError {
    fn from(e: ValidationError) -> Self {
        match e {
            ValidationError::Config(msg) => CliError::Config(msg),
            other => CliError::Validation(other.to_string()),
        }
    }
}

impl From<ReconcileError> for CliError {
    fn from(e: ReconcileError) -> Self {
        match e {
            ReconcileError::Validation(v) => v.into(),
            ReconcileError::Directory { ref source, .. } => match source.kind {
                DirectoryErrorKind::Connection
                | DirectoryErrorKind::Unavailable
                | DirectoryErrorKind::RateLimited => CliError::Network(e.to_string()),
                _ => CliError::Directory(e.to_string()),
            },
        }
    }
}

impl From<GraphError> for CliError {
    fn from(e: GraphError) -> Self {
        match e {
            GraphError::Config(_) | GraphError::Url(_) => CliError::Config(e.to_string()),
            GraphError::Http(_) | GraphError::CircuitOpen => CliError::Network(e.to_string()),
            other => CliError::Directory(other.to_string()),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(e: std::io::Error) -> Self {
        CliError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        CliError::Io(format!("JSON error: {e}"))
    }
}
