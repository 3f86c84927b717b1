//! Run report returned to the caller.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::batch::BatchOutcome;

/// Which stages a run executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileMode {
    /// Ensure channels exist, nothing else.
    ChannelsOnly,
    /// Ensure channels, then reconcile team and channel membership.
    #[default]
    Full,
}

impl fmt::Display for ReconcileMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ChannelsOnly => write!(f, "channels_only"),
            Self::Full => write!(f, "full"),
        }
    }
}

/// Kind of remote operation that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    CreateChannel,
    AddTeamMember,
    RemoveTeamMember,
    AddChannelMember,
    RemoveChannelMember,
    ListChannelMembers,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::CreateChannel => "create_channel",
            Self::AddTeamMember => "add_team_member",
            Self::RemoveTeamMember => "remove_team_member",
            Self::AddChannelMember => "add_channel_member",
            Self::RemoveChannelMember => "remove_channel_member",
            Self::ListChannelMembers => "list_channel_members",
        };
        f.write_str(s)
    }
}

/// One failed remote operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordedFailure {
    /// What the operation targeted, e.g. `alice@example.com` or `Eng/alice@example.com`.
    pub entity: String,
    pub operation: Operation,
    pub reason: String,
}

/// Aggregate result of a reconciliation run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub mode: ReconcileMode,
    pub dry_run: bool,
    pub channels_created: usize,
    /// Desired channels that already existed.
    pub channels_skipped: usize,
    pub members_added: usize,
    pub members_removed: usize,
    pub failures: Vec<RecordedFailure>,
    pub warnings: Vec<String>,
    #[serde(serialize_with = "serialize_elapsed")]
    pub elapsed: Duration,
}

fn serialize_elapsed<S: serde::Serializer>(elapsed: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(elapsed.as_millis() as u64)
}

impl RunReport {
    pub fn new(mode: ReconcileMode, dry_run: bool) -> Self {
        Self {
            mode,
            dry_run,
            ..Default::default()
        }
    }

    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    /// True when no mutation was planned or performed.
    pub fn is_noop(&self) -> bool {
        self.channels_created == 0 && self.members_added == 0 && self.members_removed == 0
    }

    pub(crate) fn record_failure(
        &mut self,
        entity: impl Into<String>,
        operation: Operation,
        reason: impl Into<String>,
    ) {
        self.failures.push(RecordedFailure {
            entity: entity.into(),
            operation,
            reason: reason.into(),
        });
    }

    /// Folds a batch outcome into the report.
    ///
    /// `scope` prefixes failed entities, e.g. the channel name.
    pub(crate) fn absorb(
        &mut self,
        outcome: BatchOutcome,
        operation: Operation,
        scope: Option<&str>,
    ) {
        match operation {
            Operation::AddTeamMember | Operation::AddChannelMember => {
                self.members_added += outcome.succeeded;
            }
            Operation::RemoveTeamMember | Operation::RemoveChannelMember => {
                self.members_removed += outcome.succeeded;
            }
            Operation::CreateChannel => self.channels_created += outcome.succeeded,
            Operation::ListChannelMembers => {}
        }
        for failure in outcome.failed {
            let entity = match scope {
                Some(scope) => format!("{scope}/{}", failure.item),
                None => failure.item,
            };
            self.record_failure(entity, operation, failure.reason);
        }
    }

    pub(crate) fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Reconciliation ({}){}",
            self.mode,
            if self.dry_run { " [dry run]" } else { "" }
        )?;
        writeln!(f, "  Channels created: {}", self.channels_created)?;
        writeln!(f, "  Channels skipped: {}", self.channels_skipped)?;
        writeln!(f, "  Members added:    {}", self.members_added)?;
        writeln!(f, "  Members removed:  {}", self.members_removed)?;
        writeln!(f, "  Failures:         {}", self.failures.len())?;
        for failure in &self.failures {
            writeln!(
                f,
                "    - {} {}: {}",
                failure.operation, failure.entity, failure.reason
            )?;
        }
        if !self.warnings.is_empty() {
            writeln!(f, "  Warnings:         {}", self.warnings.len())?;
            for warning in &self.warnings {
                writeln!(f, "    - {warning}")?;
            }
        }
        write!(f, "  Elapsed:          {:.1}s", self.elapsed.as_secs_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::ItemFailure;

    #[test]
    fn test_absorb_counts_and_scopes_failures() {
        let mut report = RunReport::new(ReconcileMode::Full, false);
        report.absorb(
            BatchOutcome {
                succeeded: 3,
                failed: vec![ItemFailure {
                    item: "bob".into(),
                    reason: "forbidden".into(),
                }],
                batches: 1,
            },
            Operation::AddChannelMember,
            Some("Eng"),
        );
        assert_eq!(report.members_added, 3);
        assert_eq!(report.failures[0].entity, "Eng/bob");
        assert_eq!(report.failures[0].operation, Operation::AddChannelMember);
        assert!(!report.is_noop());
    }

    #[test]
    fn test_serializes_elapsed_as_millis() {
        let report = RunReport {
            elapsed: Duration::from_millis(1500),
            ..RunReport::new(ReconcileMode::ChannelsOnly, true)
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["elapsed"], 1500);
        assert_eq!(json["mode"], "channels_only");
        assert_eq!(json["dry_run"], true);
    }

    #[test]
    fn test_display_lists_failures() {
        let mut report = RunReport::new(ReconcileMode::Full, false);
        report.record_failure("Sales", Operation::CreateChannel, "forbidden");
        let text = report.to_string();
        assert!(text.contains("create_channel Sales: forbidden"));
    }
}
