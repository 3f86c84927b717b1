//! [`DirectoryClient`] over the Microsoft Teams endpoints of Graph.
//!
//! Members are identified by their lower-cased email. Channels are addressed
//! by name; their ids are resolved from channel listings and cached for the
//! lifetime of the handle. Membership ids are cached per team or channel from
//! the latest member listing, so removals after a listing cost one DELETE.
//!
//! Adds bind `users('{identity}')`, which Graph resolves by UPN or object id,
//! while listings are matched on the member's `email`. Identities must
//! therefore be addresses whose mail equals the UPN. A guest or a user whose
//! mail differs from the UPN never matches a listed member and is added again
//! on every run.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use teamsync_core::{
    normalize_identity, CanonicalRole, ChannelDescriptor, ChannelMembership, DirectoryClient,
    DirectoryResult, MembershipType, Team, TeamMembership,
};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use crate::{GraphClient, GraphConfig, GraphCredentials, GraphError, GraphResult, TokenCache};

const CONVERSATION_MEMBER_TYPE: &str = "#microsoft.graph.aadUserConversationMember";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphTeam {
    id: String,
    #[serde(default)]
    display_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphChannel {
    id: String,
    display_name: String,
    #[serde(default)]
    membership_type: Option<String>,
}

impl GraphChannel {
    fn membership_type(&self) -> MembershipType {
        match self.membership_type.as_deref() {
            Some(t) if t.eq_ignore_ascii_case("private") => MembershipType::Private,
            _ => MembershipType::Standard,
        }
    }
}

/// `aadUserConversationMember` as returned for team and channel listings.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConversationMember {
    /// Membership id, distinct from the user id.
    id: String,
    #[serde(default)]
    roles: Vec<String>,
    #[serde(default)]
    email: Option<String>,
}

impl ConversationMember {
    fn identity(&self) -> Option<String> {
        self.email
            .as_deref()
            .map(normalize_identity)
            .filter(|e| !e.is_empty())
    }

    fn role(&self) -> CanonicalRole {
        if self.roles.iter().any(|r| r.eq_ignore_ascii_case("owner")) {
            CanonicalRole::Owner
        } else {
            CanonicalRole::Member
        }
    }
}

/// Escapes a value for use inside an `OData` string literal.
fn odata_quote(value: &str) -> String {
    value.replace('\'', "''")
}

/// Graph-backed directory for one tenant.
#[derive(Debug)]
pub struct GraphDirectory {
    client: GraphClient,
    page_size: u32,
    private_channel_owner: Option<String>,
    /// (group id, channel name) -> channel id
    channel_ids: RwLock<HashMap<(String, String), String>>,
    /// Membership ids per scope, refreshed by every member listing.
    membership_ids: RwLock<HashMap<MemberScope, HashMap<String, String>>>,
}

/// Team (no channel id) or private channel whose members are listed.
type MemberScope = (String, Option<String>);

fn member_scope(group_id: &str, channel_id: Option<&str>) -> MemberScope {
    (group_id.to_string(), channel_id.map(str::to_string))
}

/// Body Graph returns for a created membership.
#[derive(Debug, Deserialize)]
struct CreatedMember {
    #[serde(default)]
    id: Option<String>,
}

impl GraphDirectory {
    /// Creates a directory client for the tenant in `config`.
    ///
    /// # Errors
    ///
    /// Returns `GraphError::Config` if the configuration is invalid.
    pub fn new(config: GraphConfig, credentials: GraphCredentials) -> GraphResult<Self> {
        config.validate()?;
        let token_cache = Arc::new(TokenCache::new(credentials, &config));
        let client = GraphClient::new(&config, token_cache)?;

        info!(
            cloud = ?config.cloud_environment,
            endpoint = %client.base_url(),
            "Graph directory initialized"
        );

        Ok(Self {
            client,
            page_size: config.page_size,
            private_channel_owner: config.private_channel_owner,
            channel_ids: RwLock::new(HashMap::new()),
            membership_ids: RwLock::new(HashMap::new()),
        })
    }

    /// Returns the underlying Graph client.
    #[must_use]
    pub fn client(&self) -> &GraphClient {
        &self.client
    }

    fn team_url(&self, group_id: &str) -> String {
        format!(
            "{}/teams/{}",
            self.client.base_url(),
            urlencoding::encode(group_id)
        )
    }

    fn member_body(&self, user: &str, role: CanonicalRole) -> serde_json::Value {
        let roles: Vec<&str> = match role {
            CanonicalRole::Owner => vec!["owner"],
            CanonicalRole::Member => Vec::new(),
        };
        json!({
            "@odata.type": CONVERSATION_MEMBER_TYPE,
            "roles": roles,
            "user@odata.bind": format!("{}/users('{}')", self.client.base_url(), odata_quote(user)),
        })
    }

    async fn fetch_channels(
        &self,
        group_id: &str,
        membership_type: Option<MembershipType>,
    ) -> GraphResult<Vec<GraphChannel>> {
        let mut url = format!("{}/channels", self.team_url(group_id));
        if let Some(t) = membership_type {
            let filter = format!("membershipType eq '{}'", t.as_str());
            url.push_str(&format!("?$filter={}", urlencoding::encode(&filter)));
        }

        let channels: Vec<GraphChannel> = self.client.get_all(&url).await?;

        let mut cache = self.channel_ids.write().await;
        for channel in &channels {
            cache.insert(
                (group_id.to_string(), channel.display_name.clone()),
                channel.id.clone(),
            );
        }
        Ok(channels)
    }

    async fn channel_id(&self, group_id: &str, name: &str) -> GraphResult<String> {
        let key = (group_id.to_string(), name.to_string());
        if let Some(id) = self.channel_ids.read().await.get(&key) {
            return Ok(id.clone());
        }

        debug!(channel = %name, "Channel id not cached, refreshing listing");
        self.fetch_channels(group_id, None).await?;
        self.channel_ids
            .read()
            .await
            .get(&key)
            .cloned()
            .ok_or_else(|| GraphError::NotFound(format!("channel {name}")))
    }

    async fn fetch_team_members(&self, group_id: &str) -> GraphResult<Vec<ConversationMember>> {
        let url = format!("{}/members?$top={}", self.team_url(group_id), self.page_size);
        let members = self.client.get_all(&url).await?;
        self.remember_members(member_scope(group_id, None), &members).await;
        Ok(members)
    }

    async fn fetch_channel_members(
        &self,
        group_id: &str,
        channel_id: &str,
    ) -> GraphResult<Vec<ConversationMember>> {
        let url = format!(
            "{}/channels/{}/members",
            self.team_url(group_id),
            urlencoding::encode(channel_id)
        );
        let members = self.client.get_all(&url).await?;
        self.remember_members(member_scope(group_id, Some(channel_id)), &members)
            .await;
        Ok(members)
    }

    async fn remember_members(&self, scope: MemberScope, members: &[ConversationMember]) {
        let ids = members
            .iter()
            .filter_map(|m| m.identity().map(|user| (user, m.id.clone())))
            .collect();
        self.membership_ids.write().await.insert(scope, ids);
    }

    async fn remember_membership(&self, scope: MemberScope, user: &str, id: String) {
        self.membership_ids
            .write()
            .await
            .entry(scope)
            .or_default()
            .insert(normalize_identity(user), id);
    }

    async fn forget_membership(&self, scope: &MemberScope, user: &str) {
        if let Some(ids) = self.membership_ids.write().await.get_mut(scope) {
            ids.remove(&normalize_identity(user));
        }
    }

    /// Membership id of `user`, from the last listing of the scope. Only a
    /// cache miss lists the members again.
    async fn resolve_membership(
        &self,
        group_id: &str,
        channel_id: Option<&str>,
        user: &str,
    ) -> GraphResult<String> {
        let scope = member_scope(group_id, channel_id);
        let cached = self
            .membership_ids
            .read()
            .await
            .get(&scope)
            .and_then(|ids| ids.get(&normalize_identity(user)).cloned());
        if let Some(id) = cached {
            return Ok(id);
        }

        debug!(user = %user, "Membership id not cached, listing members");
        let members = match channel_id {
            Some(channel_id) => self.fetch_channel_members(group_id, channel_id).await?,
            None => self.fetch_team_members(group_id).await?,
        };
        Self::membership_id(&members, user)
    }

    /// Deletes a membership resolved through the cache. The entry is dropped
    /// on success and on 404.
    async fn delete_membership(
        &self,
        group_id: &str,
        channel_id: Option<&str>,
        user: &str,
    ) -> GraphResult<()> {
        let membership_id = self.resolve_membership(group_id, channel_id, user).await?;
        let members_url = match channel_id {
            Some(channel_id) => format!(
                "{}/channels/{}/members",
                self.team_url(group_id),
                urlencoding::encode(channel_id)
            ),
            None => format!("{}/members", self.team_url(group_id)),
        };
        let url = format!("{members_url}/{}", urlencoding::encode(&membership_id));

        let result = self.client.delete(&url).await;
        let stale = matches!(result, Err(GraphError::GraphApi { status: 404, .. }));
        if result.is_ok() || stale {
            self.forget_membership(&member_scope(group_id, channel_id), user).await;
        }
        result
    }

    fn membership_id(members: &[ConversationMember], user: &str) -> GraphResult<String> {
        let user = normalize_identity(user);
        members
            .iter()
            .find(|m| m.identity().as_deref() == Some(user.as_str()))
            .map(|m| m.id.clone())
            .ok_or_else(|| GraphError::NotFound(format!("membership for {user}")))
    }

    /// Chooses the team named `name` from a case-insensitive filter result.
    ///
    /// A unique exact match wins. Without one, a single case-insensitive
    /// match is accepted with a warning. Several candidates are an error.
    fn pick_team(teams: Vec<GraphTeam>, name: &str) -> GraphResult<Option<GraphTeam>> {
        let (exact, other): (Vec<_>, Vec<_>) =
            teams.into_iter().partition(|t| t.display_name == name);

        let mut candidates = if exact.is_empty() { other } else { exact };
        match candidates.len() {
            0 => Ok(None),
            1 => {
                let team = candidates.remove(0);
                if team.display_name != name {
                    warn!(
                        requested = %name,
                        found = %team.display_name,
                        "Team matched by case-insensitive name only"
                    );
                }
                Ok(Some(team))
            }
            n => Err(GraphError::Ambiguous(format!("{n} teams named '{name}'"))),
        }
    }

    fn to_memberships(members: Vec<ConversationMember>) -> Vec<(String, CanonicalRole)> {
        members
            .into_iter()
            .filter_map(|m| {
                let role = m.role();
                match m.identity() {
                    Some(user) => Some((user, role)),
                    None => {
                        debug!(membership_id = %m.id, "Skipping member without email");
                        None
                    }
                }
            })
            .collect()
    }
}

#[async_trait]
impl DirectoryClient for GraphDirectory {
    #[instrument(skip(self))]
    async fn get_team(&self, name: &str) -> DirectoryResult<Option<Team>> {
        let filter = format!("displayName eq '{}'", odata_quote(name));
        let url = format!(
            "{}/teams?$filter={}",
            self.client.base_url(),
            urlencoding::encode(&filter)
        );
        let teams: Vec<GraphTeam> = self.client.get_all(&url).await?;
        Ok(Self::pick_team(teams, name)?.map(|t| Team {
            group_id: t.id,
            display_name: t.display_name,
        }))
    }

    #[instrument(skip(self))]
    async fn list_channels(
        &self,
        group_id: &str,
        membership_type: Option<MembershipType>,
    ) -> DirectoryResult<Vec<ChannelDescriptor>> {
        let channels = self.fetch_channels(group_id, membership_type).await?;
        Ok(channels
            .iter()
            .map(|c| ChannelDescriptor::new(c.display_name.clone(), c.membership_type()))
            .filter(|c| membership_type.map_or(true, |t| c.membership_type == t))
            .collect())
    }

    #[instrument(skip(self))]
    async fn create_channel(
        &self,
        group_id: &str,
        name: &str,
        membership_type: MembershipType,
    ) -> DirectoryResult<()> {
        let mut body = json!({
            "displayName": name,
            "membershipType": membership_type.as_str(),
        });
        if membership_type == MembershipType::Private {
            if let Some(owner) = &self.private_channel_owner {
                body["members"] = json!([self.member_body(owner, CanonicalRole::Owner)]);
            }
        }

        let url = format!("{}/channels", self.team_url(group_id));
        let created: GraphChannel = self.client.post(&url, &body).await?;
        self.channel_ids
            .write()
            .await
            .insert((group_id.to_string(), name.to_string()), created.id);
        Ok(())
    }

    #[instrument(skip(self))]
    async fn list_team_members(&self, group_id: &str) -> DirectoryResult<Vec<TeamMembership>> {
        let members = self.fetch_team_members(group_id).await?;
        Ok(Self::to_memberships(members)
            .into_iter()
            .map(|(user, role)| TeamMembership { user, role })
            .collect())
    }

    #[instrument(skip(self))]
    async fn add_team_member(
        &self,
        group_id: &str,
        user: &str,
        role: CanonicalRole,
    ) -> DirectoryResult<()> {
        let url = format!("{}/members", self.team_url(group_id));
        let created: CreatedMember = self
            .client
            .post(&url, &self.member_body(user, role))
            .await?;
        if let Some(id) = created.id {
            self.remember_membership(member_scope(group_id, None), user, id).await;
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn remove_team_member(&self, group_id: &str, user: &str) -> DirectoryResult<()> {
        self.delete_membership(group_id, None, user).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn list_channel_members(
        &self,
        group_id: &str,
        channel: &str,
    ) -> DirectoryResult<Vec<ChannelMembership>> {
        let channel_id = self.channel_id(group_id, channel).await?;
        let members = self.fetch_channel_members(group_id, &channel_id).await?;
        Ok(Self::to_memberships(members)
            .into_iter()
            .map(|(user, role)| ChannelMembership {
                channel: channel.to_string(),
                user,
                role,
            })
            .collect())
    }

    #[instrument(skip(self))]
    async fn add_channel_member(
        &self,
        group_id: &str,
        channel: &str,
        user: &str,
    ) -> DirectoryResult<()> {
        let channel_id = self.channel_id(group_id, channel).await?;
        let url = format!(
            "{}/channels/{}/members",
            self.team_url(group_id),
            urlencoding::encode(&channel_id)
        );
        let created: CreatedMember = self
            .client
            .post(&url, &self.member_body(user, CanonicalRole::Member))
            .await?;
        if let Some(id) = created.id {
            let scope = member_scope(group_id, Some(channel_id.as_str()));
            self.remember_membership(scope, user, id).await;
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn remove_channel_member(
        &self,
        group_id: &str,
        channel: &str,
        user: &str,
    ) -> DirectoryResult<()> {
        let channel_id = self.channel_id(group_id, channel).await?;
        self.delete_membership(group_id, Some(channel_id.as_str()), user).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(id: &str, email: Option<&str>, roles: &[&str]) -> ConversationMember {
        ConversationMember {
            id: id.to_string(),
            roles: roles.iter().map(|r| (*r).to_string()).collect(),
            email: email.map(str::to_string),
        }
    }

    #[test]
    fn test_odata_quote() {
        assert_eq!(odata_quote("O'Brien Team"), "O''Brien Team");
    }

    #[test]
    fn test_member_role_mapping() {
        assert_eq!(member("1", None, &["owner"]).role(), CanonicalRole::Owner);
        assert_eq!(member("1", None, &["Owner"]).role(), CanonicalRole::Owner);
        assert_eq!(member("1", None, &[]).role(), CanonicalRole::Member);
        assert_eq!(member("1", None, &["guest"]).role(), CanonicalRole::Member);
    }

    #[test]
    fn test_identity_is_normalized_email() {
        let m = member("1", Some("Alice@Contoso.COM"), &[]);
        assert_eq!(m.identity().as_deref(), Some("alice@contoso.com"));
        assert_eq!(member("2", Some(""), &[]).identity(), None);
    }

    #[test]
    fn test_membership_id_lookup() {
        let members = vec![
            member("m-1", Some("alice@contoso.com"), &[]),
            member("m-2", Some("bob@contoso.com"), &["owner"]),
        ];
        assert_eq!(
            GraphDirectory::membership_id(&members, "BOB@contoso.com").unwrap(),
            "m-2"
        );
        assert!(matches!(
            GraphDirectory::membership_id(&members, "carol@contoso.com"),
            Err(GraphError::NotFound(_))
        ));
    }

    #[test]
    fn test_members_without_email_skipped() {
        let members = vec![
            member("m-1", Some("alice@contoso.com"), &["owner"]),
            member("m-2", None, &[]),
        ];
        let mapped = GraphDirectory::to_memberships(members);
        assert_eq!(
            mapped,
            vec![("alice@contoso.com".to_string(), CanonicalRole::Owner)]
        );
    }

    #[test]
    fn test_channel_membership_type() {
        let channel = |t: Option<&str>| GraphChannel {
            id: "c".into(),
            display_name: "n".into(),
            membership_type: t.map(str::to_string),
        };
        assert_eq!(channel(Some("private")).membership_type(), MembershipType::Private);
        assert_eq!(channel(Some("standard")).membership_type(), MembershipType::Standard);
        assert_eq!(channel(Some("shared")).membership_type(), MembershipType::Standard);
        assert_eq!(channel(None).membership_type(), MembershipType::Standard);
    }

    #[test]
    fn test_member_body() {
        let config = GraphConfig::builder().tenant_id("t").build().unwrap();
        let directory =
            GraphDirectory::new(config, GraphCredentials::new("id", "secret")).unwrap();
        let body = directory.member_body("alice@contoso.com", CanonicalRole::Owner);
        assert_eq!(body["roles"], json!(["owner"]));
        assert_eq!(
            body["user@odata.bind"],
            "https://graph.microsoft.com/v1.0/users('alice@contoso.com')"
        );
        let body = directory.member_body("bob@contoso.com", CanonicalRole::Member);
        assert_eq!(body["roles"], json!([]));
    }

    fn team(id: &str, name: &str) -> GraphTeam {
        GraphTeam {
            id: id.to_string(),
            display_name: name.to_string(),
        }
    }

    #[test]
    fn test_pick_team_prefers_exact_match() {
        let teams = vec![team("t-1", "sales"), team("t-2", "Sales")];
        let picked = GraphDirectory::pick_team(teams, "Sales").unwrap();
        assert_eq!(picked.map(|t| t.id).as_deref(), Some("t-2"));
    }

    #[test]
    fn test_pick_team_accepts_single_case_variant() {
        let picked = GraphDirectory::pick_team(vec![team("t-1", "SALES")], "Sales").unwrap();
        assert_eq!(picked.map(|t| t.id).as_deref(), Some("t-1"));
    }

    #[test]
    fn test_pick_team_rejects_duplicates() {
        let exact = vec![team("t-1", "Sales"), team("t-2", "Sales")];
        assert!(matches!(
            GraphDirectory::pick_team(exact, "Sales"),
            Err(GraphError::Ambiguous(_))
        ));

        let variants = vec![team("t-1", "sales"), team("t-2", "SALES")];
        assert!(matches!(
            GraphDirectory::pick_team(variants, "Sales"),
            Err(GraphError::Ambiguous(_))
        ));
    }

    #[test]
    fn test_pick_team_none_when_empty() {
        assert!(GraphDirectory::pick_team(Vec::new(), "Sales")
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_member_scope_separates_team_and_channel() {
        assert_ne!(member_scope("g", None), member_scope("g", Some("c")));
        assert_eq!(
            member_scope("g", Some("c")),
            ("g".to_string(), Some("c".to_string()))
        );
    }

    #[test]
    fn test_created_member_id_optional() {
        let created: CreatedMember = serde_json::from_str(r#"{"id": "m-9"}"#).unwrap();
        assert_eq!(created.id.as_deref(), Some("m-9"));
        let created: CreatedMember = serde_json::from_str("{}").unwrap();
        assert!(created.id.is_none());
    }
}
