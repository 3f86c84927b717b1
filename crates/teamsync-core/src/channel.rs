//! Channel creation that tolerates eventual consistency.
//!
//! A create can fail with a name collision because an earlier create (ours or
//! someone else's) has not yet shown up in the listing. The creator waits,
//! refreshes the authoritative listing and only retries when the channel is
//! still not visible.

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::directory::{DirectoryClient, DirectoryError};
use crate::model::MembershipType;
use crate::pacing::{pause, PacingPolicy};

/// Result of [`ChannelCreator::ensure_channel`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum EnsureOutcome {
    /// The channel was created by this call.
    Created,
    /// The channel turned out to exist already.
    AlreadyExisted,
    /// The channel could not be created.
    Failed { reason: String },
}

impl EnsureOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Creates channels with bounded retry on collisions and throttling.
pub struct ChannelCreator<'a, D: DirectoryClient + ?Sized> {
    directory: &'a D,
    pacing: &'a PacingPolicy,
}

impl<'a, D: DirectoryClient + ?Sized> ChannelCreator<'a, D> {
    pub fn new(directory: &'a D, pacing: &'a PacingPolicy) -> Self {
        Self { directory, pacing }
    }

    /// Ensures the named channel exists.
    #[instrument(skip(self))]
    pub async fn ensure_channel(
        &self,
        group_id: &str,
        name: &str,
        membership_type: MembershipType,
    ) -> EnsureOutcome {
        let max_attempts = self.pacing.max_create_attempts.max(1);
        let mut last_error: Option<DirectoryError> = None;

        for attempt in 1..=max_attempts {
            match self
                .directory
                .create_channel(group_id, name, membership_type)
                .await
            {
                Ok(()) => {
                    info!(channel = %name, attempt, "Channel created");
                    return EnsureOutcome::Created;
                }
                Err(e) if e.is_name_conflict() => {
                    warn!(
                        channel = %name,
                        attempt,
                        max_attempts,
                        error = %e,
                        "Channel name collision, refreshing listing"
                    );
                    pause(self.pacing.collision_cooldown()).await;

                    if self.is_listed(group_id, name).await {
                        info!(channel = %name, "Channel already exists");
                        return EnsureOutcome::AlreadyExisted;
                    }
                    last_error = Some(e);
                }
                Err(e) if e.is_transient() => {
                    warn!(
                        channel = %name,
                        attempt,
                        max_attempts,
                        error = %e,
                        "Transient error creating channel"
                    );
                    if attempt < max_attempts {
                        pause(self.pacing.collision_cooldown()).await;
                    }
                    last_error = Some(e);
                }
                Err(e) => {
                    warn!(channel = %name, error = %e, "Channel creation failed");
                    return EnsureOutcome::Failed {
                        reason: e.to_string(),
                    };
                }
            }
        }

        let reason = match last_error {
            Some(e) => format!("gave up after {max_attempts} attempts: {e}"),
            None => format!("gave up after {max_attempts} attempts"),
        };
        warn!(channel = %name, %reason, "Channel creation exhausted retries");
        EnsureOutcome::Failed { reason }
    }

    /// Checks the authoritative listing for `name`. A failed listing counts
    /// as not visible.
    async fn is_listed(&self, group_id: &str, name: &str) -> bool {
        match self.directory.list_channels(group_id, None).await {
            Ok(channels) => channels.iter().any(|c| c.name == name),
            Err(e) => {
                debug!(channel = %name, error = %e, "Listing refresh failed");
                false
            }
        }
    }
}
