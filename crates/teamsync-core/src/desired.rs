//! Typed projection of the input records.

use std::collections::HashMap;

use crate::model::{normalize_identity, DesiredRecord};
use crate::role::CanonicalRole;

/// Desired membership of one channel, in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelRoster {
    members: Vec<(String, CanonicalRole)>,
    index: HashMap<String, usize>,
}

impl ChannelRoster {
    /// Inserts or overwrites a user's role. The position of an existing user
    /// does not change.
    fn upsert(&mut self, user: &str, role: CanonicalRole) {
        if let Some(&i) = self.index.get(user) {
            self.members[i].1 = role;
        } else {
            self.index.insert(user.to_string(), self.members.len());
            self.members.push((user.to_string(), role));
        }
    }

    pub fn role_of(&self, user: &str) -> Option<CanonicalRole> {
        self.index.get(user).map(|&i| self.members[i].1)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Iterates `(user, role)` pairs in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, CanonicalRole)> {
        self.members.iter().map(|(u, r)| (u.as_str(), *r))
    }
}

/// Desired state derived from input records.
#[derive(Debug, Clone, Default)]
pub struct DesiredState {
    channels: Vec<String>,
    rosters: HashMap<String, ChannelRoster>,
    users: Vec<(String, CanonicalRole)>,
    user_index: HashMap<String, usize>,
    warnings: Vec<String>,
}

impl DesiredState {
    /// Builds the desired state.
    ///
    /// Users are compared by normalized identity however the records were
    /// built. Per channel, the last row for a user wins. A user's team role is the
    /// strongest role across all of their rows. Unrecognized roles become
    /// members and produce a warning naming the user and channel.
    pub fn from_records(records: &[DesiredRecord]) -> Self {
        let mut state = Self::default();

        for record in records {
            let role = match CanonicalRole::parse(&record.role) {
                Some(role) => role,
                None => {
                    let warning = format!(
                        "unrecognized role '{}' for user {} in channel {}, treating as member",
                        record.role, record.user, record.channel
                    );
                    tracing::warn!(
                        user = %record.user,
                        channel = %record.channel,
                        role = %record.role,
                        "Unrecognized role, treating as member"
                    );
                    state.warnings.push(warning);
                    CanonicalRole::Member
                }
            };

            let user = normalize_identity(&record.user);
            if !state.rosters.contains_key(&record.channel) {
                state.channels.push(record.channel.clone());
            }
            state
                .rosters
                .entry(record.channel.clone())
                .or_default()
                .upsert(&user, role);

            if let Some(&i) = state.user_index.get(&user) {
                let current = &mut state.users[i].1;
                *current = (*current).max(role);
            } else {
                state.user_index.insert(user.clone(), state.users.len());
                state.users.push((user, role));
            }
        }

        state
    }

    /// Distinct channel names in first-seen order.
    pub fn channels(&self) -> &[String] {
        &self.channels
    }

    /// Desired roster of a channel.
    pub fn roster(&self, channel: &str) -> Option<&ChannelRoster> {
        self.rosters.get(channel)
    }

    /// Distinct users with their strongest role, in first-seen order.
    pub fn users(&self) -> impl Iterator<Item = (&str, CanonicalRole)> {
        self.users.iter().map(|(u, r)| (u.as_str(), *r))
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    pub fn contains_user(&self, user: &str) -> bool {
        self.user_index.contains_key(user)
    }

    /// Warnings raised while building the state.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }
}
