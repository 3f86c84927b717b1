//! Records and remote entities the engine reasons about.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::role::CanonicalRole;

/// One desired (user, channel) assignment from the input table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesiredRecord {
    /// User identity (principal name), lower-cased at load time.
    pub user: String,
    /// Raw role string as written in the input.
    pub role: String,
    /// Channel name, case-sensitive.
    pub channel: String,
}

impl DesiredRecord {
    /// Creates a record, normalizing the user identity.
    pub fn new(user: impl AsRef<str>, role: impl Into<String>, channel: impl AsRef<str>) -> Self {
        Self {
            user: normalize_identity(user.as_ref()),
            role: role.into(),
            channel: channel.as_ref().trim().to_string(),
        }
    }
}

/// Normalizes a user identity for comparison: trimmed and lower-cased.
pub fn normalize_identity(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// A team resolved from the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    /// Directory group id backing the team.
    pub group_id: String,
    /// Team display name.
    pub display_name: String,
}

/// Channel membership model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MembershipType {
    /// Visible to every team member.
    Standard,
    /// Explicit membership list.
    #[default]
    Private,
}

impl MembershipType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Private => "private",
        }
    }
}

impl fmt::Display for MembershipType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A channel as listed by the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelDescriptor {
    pub name: String,
    pub membership_type: MembershipType,
}

impl ChannelDescriptor {
    pub fn new(name: impl Into<String>, membership_type: MembershipType) -> Self {
        Self {
            name: name.into(),
            membership_type,
        }
    }
}

/// Current membership of a user in a team.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamMembership {
    pub user: String,
    pub role: CanonicalRole,
}

/// Current membership of a user in a private channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelMembership {
    pub channel: String,
    pub user: String,
    pub role: CanonicalRole,
}
