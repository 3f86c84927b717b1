//! Reconciliation orchestrator.
//!
//! A run moves through three stages in order and never goes back:
//! ensure channels, reconcile team members, reconcile private channel
//! members. Each stage reads current state fresh, so re-running after a
//! partial failure converges.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument, warn};

use crate::batch::{apply_batched, batch_size_for};
use crate::channel::{ChannelCreator, EnsureOutcome};
use crate::desired::{ChannelRoster, DesiredState};
use crate::diff::{compute_membership_diff, MembershipDiff, PlannedAdd};
use crate::directory::DirectoryClient;
use crate::error::{ReconcileError, ReconcileResult, ValidationError};
use crate::model::{DesiredRecord, MembershipType};
use crate::pacing::{pause, PacingPolicy};
use crate::report::{Operation, ReconcileMode, RunReport};
use crate::role::CanonicalRole;

/// Per-run options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileOptions {
    #[serde(default)]
    pub mode: ReconcileMode,
    /// Read everything, mutate nothing, report what would change.
    #[serde(default)]
    pub dry_run: bool,
    /// Add new team members with the strongest role from their input rows
    /// instead of always as members.
    #[serde(default)]
    pub team_roles_from_input: bool,
    /// Membership type for channels the run creates.
    #[serde(default)]
    pub channel_membership_type: MembershipType,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            mode: ReconcileMode::Full,
            dry_run: false,
            team_roles_from_input: false,
            channel_membership_type: MembershipType::Private,
        }
    }
}

impl ReconcileOptions {
    pub fn with_mode(mut self, mode: ReconcileMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

/// Drives a reconciliation run against an injected directory client.
pub struct Reconciler<D: DirectoryClient + ?Sized> {
    directory: Arc<D>,
    pacing: PacingPolicy,
}

impl<D: DirectoryClient + ?Sized> Reconciler<D> {
    /// Creates a reconciler.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::Config` if the pacing policy is invalid.
    pub fn new(directory: Arc<D>, pacing: PacingPolicy) -> ReconcileResult<Self> {
        pacing.validate().map_err(ValidationError::Config)?;
        Ok(Self { directory, pacing })
    }

    pub fn pacing(&self) -> &PacingPolicy {
        &self.pacing
    }

    /// Resolves the team by display name, then reconciles it.
    pub async fn reconcile_team(
        &self,
        team_name: &str,
        records: &[DesiredRecord],
        options: &ReconcileOptions,
    ) -> ReconcileResult<RunReport> {
        let team = self
            .directory
            .get_team(team_name)
            .await
            .map_err(|e| ReconcileError::directory(format!("look up team {team_name}"), e))?
            .ok_or_else(|| ValidationError::TeamNotFound(team_name.to_string()))?;

        info!(team = %team.display_name, group_id = %team.group_id, "Resolved team");
        self.reconcile(&team.group_id, records, options).await
    }

    /// Reconciles the team identified by `group_id` against `records`.
    ///
    /// Only input validation and failed listing calls abort the run. Every
    /// failed mutation is recorded in the report and the run continues.
    #[instrument(skip(self, records), fields(records = records.len()))]
    pub async fn reconcile(
        &self,
        group_id: &str,
        records: &[DesiredRecord],
        options: &ReconcileOptions,
    ) -> ReconcileResult<RunReport> {
        if records.is_empty() {
            return Err(ValidationError::Empty.into());
        }

        let started = Instant::now();
        let desired = DesiredState::from_records(records);
        let mut report = RunReport::new(options.mode, options.dry_run);
        report.warnings.extend(desired.warnings().iter().cloned());

        // Dry runs issue no mutations, so there is nothing to pace.
        let pacing = if options.dry_run {
            PacingPolicy {
                max_create_attempts: self.pacing.max_create_attempts,
                ..PacingPolicy::immediate()
            }
        } else {
            self.pacing.clone()
        };

        info!(
            mode = %options.mode,
            dry_run = options.dry_run,
            channels = desired.channels().len(),
            users = desired.user_count(),
            "Starting reconciliation"
        );

        self.ensure_channels(group_id, &desired, options, &pacing, &mut report)
            .await?;

        if options.mode == ReconcileMode::Full {
            self.reconcile_team_members(group_id, &desired, options, &pacing, &mut report)
                .await?;
            self.reconcile_channel_members(group_id, &desired, options, &pacing, &mut report)
                .await?;
        }

        report.elapsed = started.elapsed();
        info!(
            channels_created = report.channels_created,
            channels_skipped = report.channels_skipped,
            members_added = report.members_added,
            members_removed = report.members_removed,
            failures = report.failures.len(),
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Reconciliation finished"
        );
        Ok(report)
    }

    async fn ensure_channels(
        &self,
        group_id: &str,
        desired: &DesiredState,
        options: &ReconcileOptions,
        pacing: &PacingPolicy,
        report: &mut RunReport,
    ) -> ReconcileResult<()> {
        let existing: HashSet<String> = self
            .directory
            .list_channels(group_id, None)
            .await
            .map_err(|e| ReconcileError::directory("list channels", e))?
            .into_iter()
            .map(|c| c.name)
            .collect();

        let creator = ChannelCreator::new(self.directory.as_ref(), pacing);
        let mut created = 0usize;

        for name in desired.channels() {
            if existing.contains(name) {
                report.channels_skipped += 1;
                continue;
            }

            if options.dry_run {
                info!(channel = %name, "Would create channel");
                report.channels_created += 1;
                continue;
            }

            match creator
                .ensure_channel(group_id, name, options.channel_membership_type)
                .await
            {
                EnsureOutcome::Created => {
                    created += 1;
                    report.channels_created += 1;
                }
                EnsureOutcome::AlreadyExisted => report.channels_skipped += 1,
                EnsureOutcome::Failed { reason } => {
                    report.record_failure(name.as_str(), Operation::CreateChannel, reason);
                }
            }
            pause(pacing.item_delay()).await;
        }

        if created > 0 {
            info!(
                created,
                delay = ?pacing.propagation_delay(),
                "Waiting for created channels to propagate"
            );
            pause(pacing.propagation_delay()).await;
        }
        Ok(())
    }

    async fn reconcile_team_members(
        &self,
        group_id: &str,
        desired: &DesiredState,
        options: &ReconcileOptions,
        pacing: &PacingPolicy,
        report: &mut RunReport,
    ) -> ReconcileResult<()> {
        let current = self
            .directory
            .list_team_members(group_id)
            .await
            .map_err(|e| ReconcileError::directory("list team members", e))?;

        let diff = compute_membership_diff(
            current.iter().map(|m| (m.user.as_str(), m.role)),
            desired.users().map(|(user, role)| {
                let role = if options.team_roles_from_input {
                    role
                } else {
                    CanonicalRole::Member
                };
                (user, role)
            }),
        );

        info!(
            current = current.len(),
            desired = desired.user_count(),
            to_add = diff.to_add.len(),
            to_remove = diff.to_remove.len(),
            "Team membership diff"
        );

        let directory = self.directory.as_ref();
        let dry_run = options.dry_run;

        let removed = apply_batched(
            "remove_team_member",
            &diff.to_remove,
            batch_size_for(diff.to_remove.len()),
            pacing,
            |user: String| async move {
                if dry_run {
                    info!(user = %user, "Would remove team member");
                    return Ok(());
                }
                info!(user = %user, "Removing team member");
                directory.remove_team_member(group_id, &user).await
            },
        )
        .await;
        report.absorb(removed, Operation::RemoveTeamMember, None);

        let added = apply_batched(
            "add_team_member",
            &diff.to_add,
            batch_size_for(diff.to_add.len()),
            pacing,
            |add: PlannedAdd| async move {
                if dry_run {
                    info!(user = %add.user, role = %add.role, "Would add team member");
                    return Ok(());
                }
                info!(user = %add.user, role = %add.role, "Adding team member");
                directory.add_team_member(group_id, &add.user, add.role).await
            },
        )
        .await;
        report.absorb(added, Operation::AddTeamMember, None);

        Ok(())
    }

    async fn reconcile_channel_members(
        &self,
        group_id: &str,
        desired: &DesiredState,
        options: &ReconcileOptions,
        pacing: &PacingPolicy,
        report: &mut RunReport,
    ) -> ReconcileResult<()> {
        let private: HashSet<String> = self
            .directory
            .list_channels(group_id, Some(MembershipType::Private))
            .await
            .map_err(|e| ReconcileError::directory("list private channels", e))?
            .into_iter()
            .map(|c| c.name)
            .collect();

        for channel in desired.channels() {
            if !private.contains(channel) {
                warn!(channel = %channel, "Channel not in private channel listing, skipping");
                report.warn(format!(
                    "channel {channel} is not a visible private channel, membership not reconciled"
                ));
                continue;
            }
            let Some(roster) = desired.roster(channel) else {
                continue;
            };

            let diff = match self.channel_diff(group_id, channel, roster).await {
                Ok(diff) => diff,
                Err(reason) => {
                    report.record_failure(channel.as_str(), Operation::ListChannelMembers, reason);
                    continue;
                }
            };

            info!(
                channel = %channel,
                to_add = diff.to_add.len(),
                to_remove = diff.to_remove.len(),
                "Channel membership diff"
            );

            self.apply_channel_diff(group_id, channel, &diff, options.dry_run, pacing, report)
                .await;
        }
        Ok(())
    }

    async fn channel_diff(
        &self,
        group_id: &str,
        channel: &str,
        roster: &ChannelRoster,
    ) -> Result<MembershipDiff, String> {
        let current = self
            .directory
            .list_channel_members(group_id, channel)
            .await
            .map_err(|e| {
                warn!(channel = %channel, error = %e, "Cannot list channel members");
                e.to_string()
            })?;

        // Private channels take no role at add time.
        Ok(compute_membership_diff(
            current.iter().map(|m| (m.user.as_str(), m.role)),
            roster.iter().map(|(user, _)| (user, CanonicalRole::Member)),
        ))
    }

    async fn apply_channel_diff(
        &self,
        group_id: &str,
        channel: &str,
        diff: &MembershipDiff,
        dry_run: bool,
        pacing: &PacingPolicy,
        report: &mut RunReport,
    ) {
        let directory = self.directory.as_ref();

        let removed = apply_batched(
            "remove_channel_member",
            &diff.to_remove,
            batch_size_for(diff.to_remove.len()),
            pacing,
            |user: String| async move {
                if dry_run {
                    info!(channel = %channel, user = %user, "Would remove channel member");
                    return Ok(());
                }
                info!(channel = %channel, user = %user, "Removing channel member");
                directory
                    .remove_channel_member(group_id, channel, &user)
                    .await
            },
        )
        .await;
        report.absorb(removed, Operation::RemoveChannelMember, Some(channel));

        let users: Vec<String> = diff.to_add.iter().map(|a| a.user.clone()).collect();
        let added = apply_batched(
            "add_channel_member",
            &users,
            batch_size_for(users.len()),
            pacing,
            |user: String| async move {
                if dry_run {
                    info!(channel = %channel, user = %user, "Would add channel member");
                    return Ok(());
                }
                info!(channel = %channel, user = %user, "Adding channel member");
                directory.add_channel_member(group_id, channel, &user).await
            },
        )
        .await;
        report.absorb(added, Operation::AddChannelMember, Some(channel));
    }
}
