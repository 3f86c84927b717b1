//! Error types for the Graph directory client.

use teamsync_core::{DirectoryError, DirectoryErrorKind};
use thiserror::Error;

/// Result type alias using `GraphError`.
pub type GraphResult<T> = Result<T, GraphError>;

/// OData error codes Graph uses for duplicate names.
const NAME_CONFLICT_CODES: &[&str] = &["NameAlreadyExists", "Conflict", "ChannelNameAlreadyExists"];

/// Errors that can occur when talking to Microsoft Graph.
#[derive(Debug, Error)]
pub enum GraphError {
    /// Configuration validation error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// `OAuth2` authentication error.
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Microsoft Graph API error.
    #[error("Graph API error ({status}): {code} - {message}")]
    GraphApi {
        status: u16,
        code: String,
        message: String,
    },

    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing error.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// A named resource could not be resolved to an id.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// A display name resolved to more than one resource.
    #[error("Ambiguous name: {0}")]
    Ambiguous(String),

    /// Circuit breaker is open, requests are being rejected.
    #[error("Circuit breaker open, failing fast")]
    CircuitOpen,

    /// Maximum retry attempts exceeded.
    #[error("Maximum retries ({attempts}) exceeded for rate limit")]
    MaxRetriesExceeded { attempts: u32 },
}

impl GraphError {
    /// Whether the error reports that a resource with the same name exists.
    ///
    /// Graph does not always answer a duplicate channel name with 409, so the
    /// message is checked as a last resort.
    pub fn is_name_conflict(&self) -> bool {
        match self {
            Self::GraphApi {
                status,
                code,
                message,
            } => {
                *status == 409
                    || NAME_CONFLICT_CODES.contains(&code.as_str())
                    || message.to_lowercase().contains("already exist")
            }
            _ => false,
        }
    }

    /// Classifies the error for the reconciliation engine.
    pub fn directory_kind(&self) -> DirectoryErrorKind {
        if self.is_name_conflict() {
            return DirectoryErrorKind::NameConflict;
        }
        match self {
            Self::GraphApi { status, .. } => match status {
                429 => DirectoryErrorKind::RateLimited,
                404 => DirectoryErrorKind::NotFound,
                401 | 403 => DirectoryErrorKind::PermissionDenied,
                500..=599 => DirectoryErrorKind::Unavailable,
                _ => DirectoryErrorKind::Other,
            },
            Self::MaxRetriesExceeded { .. } => DirectoryErrorKind::RateLimited,
            Self::CircuitOpen => DirectoryErrorKind::Unavailable,
            Self::Http(_) => DirectoryErrorKind::Connection,
            Self::NotFound(_) => DirectoryErrorKind::NotFound,
            Self::Auth(_) => DirectoryErrorKind::PermissionDenied,
            Self::Config(_) | Self::Json(_) | Self::Url(_) | Self::Ambiguous(_) => {
                DirectoryErrorKind::Other
            }
        }
    }
}

impl From<GraphError> for DirectoryError {
    fn from(err: GraphError) -> Self {
        DirectoryError::new(err.directory_kind(), err.to_string())
    }
}
