//! Membership diffing.
//!
//! The same rule serves team-level and channel-level reconciliation:
//! desired users missing from the current listing are added, current
//! members absent from the desired set are removed unless they are owners.

use serde::Serialize;
use std::collections::HashSet;
use std::fmt;

use crate::role::CanonicalRole;

/// A user to add, with the role requested for the add call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedAdd {
    pub user: String,
    pub role: CanonicalRole,
}

impl fmt::Display for PlannedAdd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.user, self.role)
    }
}

/// Add and remove sets for one reconciliation step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MembershipDiff {
    pub to_add: Vec<PlannedAdd>,
    pub to_remove: Vec<String>,
}

impl MembershipDiff {
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }
}

/// Computes the membership diff between `current` and `desired`.
///
/// `current` yields each present member with its current role; `desired`
/// yields each wanted member with the role to use when adding it. Output
/// order follows input order and duplicates are collapsed to their first
/// occurrence.
pub fn compute_membership_diff<'a, C, D>(current: C, desired: D) -> MembershipDiff
where
    C: IntoIterator<Item = (&'a str, CanonicalRole)>,
    D: IntoIterator<Item = (&'a str, CanonicalRole)>,
{
    let current: Vec<(&str, CanonicalRole)> = current.into_iter().collect();
    let desired: Vec<(&str, CanonicalRole)> = desired.into_iter().collect();

    let current_users: HashSet<&str> = current.iter().map(|(user, _)| *user).collect();
    let desired_users: HashSet<&str> = desired.iter().map(|(user, _)| *user).collect();

    let mut seen = HashSet::new();
    let to_add = desired
        .iter()
        .filter(|(user, _)| !current_users.contains(user) && seen.insert(*user))
        .map(|(user, role)| PlannedAdd {
            user: (*user).to_string(),
            role: *role,
        })
        .collect();

    let mut seen = HashSet::new();
    let to_remove = current
        .iter()
        .filter(|(user, role)| {
            *role == CanonicalRole::Member && !desired_users.contains(user) && seen.insert(*user)
        })
        .map(|(user, _)| (*user).to_string())
        .collect();

    MembershipDiff { to_add, to_remove }
}
