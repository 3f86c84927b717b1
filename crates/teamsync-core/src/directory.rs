//! Remote directory interface consumed by the engine.
//!
//! The engine never talks to a concrete service. Callers construct a
//! [`DirectoryClient`] once and inject it, which also lets tests substitute an
//! in-memory double.

use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

use crate::model::{ChannelDescriptor, ChannelMembership, MembershipType, Team, TeamMembership};
use crate::role::CanonicalRole;

/// Result type alias using `DirectoryError`.
pub type DirectoryResult<T> = Result<T, DirectoryError>;

/// Classification of a remote failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DirectoryErrorKind {
    /// A resource with the same name already exists (or is still being
    /// created and not yet visible).
    NameConflict,
    /// The service throttled the request.
    RateLimited,
    /// The target resource does not exist.
    NotFound,
    /// The caller lacks permission.
    PermissionDenied,
    /// The service is temporarily unavailable.
    Unavailable,
    /// Transport-level failure.
    Connection,
    /// Any other rejection.
    Other,
}

impl DirectoryErrorKind {
    /// Get an error code for classification.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NameConflict => "NAME_CONFLICT",
            Self::RateLimited => "RATE_LIMITED",
            Self::NotFound => "NOT_FOUND",
            Self::PermissionDenied => "PERMISSION_DENIED",
            Self::Unavailable => "UNAVAILABLE",
            Self::Connection => "CONNECTION",
            Self::Other => "OTHER",
        }
    }
}

impl fmt::Display for DirectoryErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Error returned by a [`DirectoryClient`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct DirectoryError {
    pub kind: DirectoryErrorKind,
    pub message: String,
}

impl DirectoryError {
    pub fn new(kind: DirectoryErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn name_conflict(message: impl Into<String>) -> Self {
        Self::new(DirectoryErrorKind::NameConflict, message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(DirectoryErrorKind::RateLimited, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(DirectoryErrorKind::NotFound, message)
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(DirectoryErrorKind::Other, message)
    }

    /// Whether a channel create that failed with this error may be retried.
    pub fn is_transient(&self) -> bool {
        matches!(
            self.kind,
            DirectoryErrorKind::NameConflict | DirectoryErrorKind::RateLimited
        )
    }

    /// Whether the error signals a name collision.
    pub fn is_name_conflict(&self) -> bool {
        self.kind == DirectoryErrorKind::NameConflict
    }
}

/// Operations the engine needs from the remote directory.
///
/// Implementations issue one remote call per method (plus whatever lookups
/// they need to resolve ids) and must not retry name collisions themselves;
/// that policy belongs to the engine.
#[async_trait]
pub trait DirectoryClient: Send + Sync {
    /// Looks up a team by display name.
    async fn get_team(&self, name: &str) -> DirectoryResult<Option<Team>>;

    /// Lists channels of a team, optionally filtered by membership type.
    async fn list_channels(
        &self,
        group_id: &str,
        membership_type: Option<MembershipType>,
    ) -> DirectoryResult<Vec<ChannelDescriptor>>;

    /// Creates a channel.
    async fn create_channel(
        &self,
        group_id: &str,
        name: &str,
        membership_type: MembershipType,
    ) -> DirectoryResult<()>;

    /// Lists the members of a team.
    async fn list_team_members(&self, group_id: &str) -> DirectoryResult<Vec<TeamMembership>>;

    /// Adds a user to a team with the given role.
    async fn add_team_member(
        &self,
        group_id: &str,
        user: &str,
        role: CanonicalRole,
    ) -> DirectoryResult<()>;

    /// Removes a user from a team.
    async fn remove_team_member(&self, group_id: &str, user: &str) -> DirectoryResult<()>;

    /// Lists the members of a private channel.
    async fn list_channel_members(
        &self,
        group_id: &str,
        channel: &str,
    ) -> DirectoryResult<Vec<ChannelMembership>>;

    /// Adds a user to a private channel as a member.
    async fn add_channel_member(
        &self,
        group_id: &str,
        channel: &str,
        user: &str,
    ) -> DirectoryResult<()>;

    /// Removes a user from a private channel.
    async fn remove_channel_member(
        &self,
        group_id: &str,
        channel: &str,
        user: &str,
    ) -> DirectoryResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_kinds() {
        assert!(DirectoryError::name_conflict("exists").is_transient());
        assert!(DirectoryError::rate_limited("slow down").is_transient());
        for kind in [
            DirectoryErrorKind::NotFound,
            DirectoryErrorKind::PermissionDenied,
            DirectoryErrorKind::Unavailable,
            DirectoryErrorKind::Connection,
            DirectoryErrorKind::Other,
        ] {
            assert!(
                !DirectoryError::new(kind, "x").is_transient(),
                "{kind} should not be transient"
            );
        }
    }

    #[test]
    fn test_error_display() {
        let err = DirectoryError::not_found("channel Eng");
        assert_eq!(err.to_string(), "NOT_FOUND: channel Eng");
    }
}
