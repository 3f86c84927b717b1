//! In-memory directory double for engine tests.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

use teamsync_core::{
    CanonicalRole, ChannelDescriptor, ChannelMembership, DesiredRecord, DirectoryClient,
    DirectoryError, DirectoryResult, MembershipType, Team, TeamMembership,
};

pub const GROUP_ID: &str = "group-1";

/// Scripted behavior for the next `create_channel` call.
#[derive(Debug, Clone)]
pub enum CreateScript {
    /// Report a name collision and make the channel visible in listings.
    ConflictThenVisible,
    /// Report a name collision without the channel ever appearing.
    ConflictHidden,
    /// Return this error.
    Fail(DirectoryError),
}

#[derive(Debug, Default)]
struct State {
    teams: Vec<Team>,
    channels: Vec<ChannelDescriptor>,
    team_members: Vec<TeamMembership>,
    channel_members: HashMap<String, Vec<ChannelMembership>>,
    create_script: VecDeque<CreateScript>,
    failing_users: HashSet<String>,
    fail_listing: bool,
    failing_channel_listings: HashSet<String>,
    calls: Vec<String>,
}

/// Directory double holding team state in memory.
#[derive(Debug, Default)]
pub struct FakeDirectory {
    state: Mutex<State>,
}

impl FakeDirectory {
    pub fn new() -> Self {
        let fake = Self::default();
        fake.state.lock().unwrap().teams.push(Team {
            group_id: GROUP_ID.to_string(),
            display_name: "Engineering".to_string(),
        });
        fake
    }

    pub fn with_channel(self, name: &str, membership_type: MembershipType) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            state
                .channels
                .push(ChannelDescriptor::new(name, membership_type));
            state.channel_members.entry(name.to_string()).or_default();
        }
        self
    }

    pub fn with_team_member(self, user: &str, role: CanonicalRole) -> Self {
        self.state.lock().unwrap().team_members.push(TeamMembership {
            user: user.to_string(),
            role,
        });
        self
    }

    pub fn with_channel_member(self, channel: &str, user: &str, role: CanonicalRole) -> Self {
        self.state
            .lock()
            .unwrap()
            .channel_members
            .entry(channel.to_string())
            .or_default()
            .push(ChannelMembership {
                channel: channel.to_string(),
                user: user.to_string(),
                role,
            });
        self
    }

    pub fn script_create(&self, script: CreateScript) {
        self.state.lock().unwrap().create_script.push_back(script);
    }

    /// Every add or remove involving `user` fails.
    pub fn fail_user(&self, user: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_users
            .insert(user.to_string());
    }

    /// Every listing call fails.
    pub fn fail_listings(&self) {
        self.state.lock().unwrap().fail_listing = true;
    }

    /// Member listing of `channel` fails.
    pub fn fail_channel_listing(&self, channel: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_channel_listings
            .insert(channel.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Mutating calls only.
    pub fn mutations(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| !c.starts_with("list") && !c.starts_with("get"))
            .collect()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    pub fn channel_names(&self) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state.channels.iter().map(|c| c.name.clone()).collect()
    }

    pub fn team_users(&self) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state.team_members.iter().map(|m| m.user.clone()).collect()
    }

    pub fn team_role(&self, user: &str) -> Option<CanonicalRole> {
        let state = self.state.lock().unwrap();
        state
            .team_members
            .iter()
            .find(|m| m.user == user)
            .map(|m| m.role)
    }

    pub fn channel_users(&self, channel: &str) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state
            .channel_members
            .get(channel)
            .map(|members| members.iter().map(|m| m.user.clone()).collect())
            .unwrap_or_default()
    }

    fn record(&self, call: String) {
        self.state.lock().unwrap().calls.push(call);
    }

    fn check_user(&self, user: &str) -> DirectoryResult<()> {
        if self.state.lock().unwrap().failing_users.contains(user) {
            return Err(DirectoryError::other(format!("{user} is blocked")));
        }
        Ok(())
    }

    fn check_listing(&self) -> DirectoryResult<()> {
        if self.state.lock().unwrap().fail_listing {
            return Err(DirectoryError::new(
                teamsync_core::DirectoryErrorKind::Connection,
                "connection reset",
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl DirectoryClient for FakeDirectory {
    async fn get_team(&self, name: &str) -> DirectoryResult<Option<Team>> {
        self.record(format!("get_team {name}"));
        let state = self.state.lock().unwrap();
        Ok(state.teams.iter().find(|t| t.display_name == name).cloned())
    }

    async fn list_channels(
        &self,
        group_id: &str,
        membership_type: Option<MembershipType>,
    ) -> DirectoryResult<Vec<ChannelDescriptor>> {
        self.record(format!("list_channels {group_id} {membership_type:?}"));
        self.check_listing()?;
        let state = self.state.lock().unwrap();
        Ok(state
            .channels
            .iter()
            .filter(|c| membership_type.map_or(true, |t| c.membership_type == t))
            .cloned()
            .collect())
    }

    async fn create_channel(
        &self,
        _group_id: &str,
        name: &str,
        membership_type: MembershipType,
    ) -> DirectoryResult<()> {
        self.record(format!("create_channel {name}"));
        let mut state = self.state.lock().unwrap();
        let script = state.create_script.pop_front();
        match script {
            Some(CreateScript::ConflictThenVisible) => {
                state
                    .channels
                    .push(ChannelDescriptor::new(name, membership_type));
                state.channel_members.entry(name.to_string()).or_default();
                Err(DirectoryError::name_conflict(format!(
                    "Channel name {name} already existed"
                )))
            }
            Some(CreateScript::ConflictHidden) => Err(DirectoryError::name_conflict(format!(
                "Channel name {name} already existed"
            ))),
            Some(CreateScript::Fail(e)) => Err(e),
            None => {
                if state.channels.iter().any(|c| c.name == name) {
                    return Err(DirectoryError::name_conflict(format!(
                        "Channel name {name} already existed"
                    )));
                }
                state
                    .channels
                    .push(ChannelDescriptor::new(name, membership_type));
                state.channel_members.entry(name.to_string()).or_default();
                Ok(())
            }
        }
    }

    async fn list_team_members(&self, group_id: &str) -> DirectoryResult<Vec<TeamMembership>> {
        self.record(format!("list_team_members {group_id}"));
        self.check_listing()?;
        Ok(self.state.lock().unwrap().team_members.clone())
    }

    async fn add_team_member(
        &self,
        _group_id: &str,
        user: &str,
        role: CanonicalRole,
    ) -> DirectoryResult<()> {
        self.record(format!("add_team_member {user} {role}"));
        self.check_user(user)?;
        self.state.lock().unwrap().team_members.push(TeamMembership {
            user: user.to_string(),
            role,
        });
        Ok(())
    }

    async fn remove_team_member(&self, _group_id: &str, user: &str) -> DirectoryResult<()> {
        self.record(format!("remove_team_member {user}"));
        self.check_user(user)?;
        self.state
            .lock()
            .unwrap()
            .team_members
            .retain(|m| m.user != user);
        Ok(())
    }

    async fn list_channel_members(
        &self,
        _group_id: &str,
        channel: &str,
    ) -> DirectoryResult<Vec<ChannelMembership>> {
        self.record(format!("list_channel_members {channel}"));
        self.check_listing()?;
        let state = self.state.lock().unwrap();
        if state.failing_channel_listings.contains(channel) {
            return Err(DirectoryError::not_found(format!("channel {channel}")));
        }
        Ok(state
            .channel_members
            .get(channel)
            .cloned()
            .unwrap_or_default())
    }

    async fn add_channel_member(
        &self,
        _group_id: &str,
        channel: &str,
        user: &str,
    ) -> DirectoryResult<()> {
        self.record(format!("add_channel_member {channel} {user}"));
        self.check_user(user)?;
        self.state
            .lock()
            .unwrap()
            .channel_members
            .entry(channel.to_string())
            .or_default()
            .push(ChannelMembership {
                channel: channel.to_string(),
                user: user.to_string(),
                role: CanonicalRole::Member,
            });
        Ok(())
    }

    async fn remove_channel_member(
        &self,
        _group_id: &str,
        channel: &str,
        user: &str,
    ) -> DirectoryResult<()> {
        self.record(format!("remove_channel_member {channel} {user}"));
        self.check_user(user)?;
        if let Some(members) = self.state.lock().unwrap().channel_members.get_mut(channel) {
            members.retain(|m| m.user != user);
        }
        Ok(())
    }
}

pub fn record(user: &str, role: &str, channel: &str) -> DesiredRecord {
    DesiredRecord::new(user, role, channel)
}
