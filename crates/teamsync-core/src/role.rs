//! Canonical membership roles and normalization of free-form role input.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Role of a user within a team or a private channel.
///
/// Ordered so that `Owner > Member`, which lets callers pick the strongest
/// role across several input rows with `max`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum CanonicalRole {
    /// Regular member.
    #[default]
    Member,
    /// Owner. Never removed automatically.
    Owner,
}

impl CanonicalRole {
    /// Parses a role string case-insensitively, ignoring surrounding whitespace.
    ///
    /// Returns `None` for anything other than `member` or `owner`.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.eq_ignore_ascii_case("member") {
            Some(Self::Member)
        } else if trimmed.eq_ignore_ascii_case("owner") {
            Some(Self::Owner)
        } else {
            None
        }
    }

    /// Returns the lowercase wire name of the role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Member => "member",
            Self::Owner => "owner",
        }
    }
}

impl fmt::Display for CanonicalRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maps a free-form role to a [`CanonicalRole`].
///
/// Unrecognized values fall back to [`CanonicalRole::Member`] and emit a
/// warning. This never fails.
pub fn normalize_role(raw: &str) -> CanonicalRole {
    CanonicalRole::parse(raw).unwrap_or_else(|| {
        tracing::warn!(role = %raw, "Unrecognized role, treating as member");
        CanonicalRole::Member
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_known_roles() {
        assert_eq!(normalize_role("owner"), CanonicalRole::Owner);
        assert_eq!(normalize_role("MEMBER"), CanonicalRole::Member);
        assert_eq!(normalize_role("  Owner "), CanonicalRole::Owner);
    }

    #[test]
    fn test_normalize_unknown_role_falls_back_to_member() {
        assert_eq!(normalize_role("admin"), CanonicalRole::Member);
        assert_eq!(normalize_role(""), CanonicalRole::Member);
    }

    #[test]
    fn test_parse_rejects_unknown() {
        assert_eq!(CanonicalRole::parse("admin"), None);
        assert_eq!(CanonicalRole::parse("guest"), None);
    }

    #[test]
    fn test_owner_outranks_member() {
        assert!(CanonicalRole::Owner > CanonicalRole::Member);
        assert_eq!(
            CanonicalRole::Member.max(CanonicalRole::Owner),
            CanonicalRole::Owner
        );
    }

    #[test]
    fn test_serde_lowercase() {
        let json = serde_json::to_string(&CanonicalRole::Owner).unwrap();
        assert_eq!(json, "\"owner\"");
    }
}
