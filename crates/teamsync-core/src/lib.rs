//! Team membership and channel reconciliation engine.
//!
//! Reconciles one team's channels, team membership and private channel
//! membership against a desired state read from a CSV table. The engine
//! computes minimal add/remove sets, creates missing channels with retry on
//! eventual-consistency collisions, and applies changes sequentially in paced
//! batches against a rate-limited directory service.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use teamsync_core::{input, DirectoryClient, PacingPolicy, ReconcileOptions, Reconciler};
//!
//! # async fn example(directory: Arc<dyn DirectoryClient>) -> Result<(), Box<dyn std::error::Error>> {
//! let records = input::load_records("members.csv")?;
//! let reconciler = Reconciler::new(directory, PacingPolicy::default())?;
//! let report = reconciler
//!     .reconcile_team("Engineering", &records, &ReconcileOptions::default())
//!     .await?;
//! println!("{report}");
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod channel;
pub mod desired;
pub mod diff;
pub mod directory;
mod error;
pub mod input;
mod model;
mod pacing;
mod reconcile;
mod report;
mod role;

// Re-exports
pub use batch::{apply_batched, batch_size_for, BatchOutcome, ItemFailure};
pub use channel::{ChannelCreator, EnsureOutcome};
pub use desired::{ChannelRoster, DesiredState};
pub use diff::{compute_membership_diff, MembershipDiff, PlannedAdd};
pub use directory::{DirectoryClient, DirectoryError, DirectoryErrorKind, DirectoryResult};
pub use error::{ReconcileError, ReconcileResult, ValidationError};
pub use model::{
    normalize_identity, ChannelDescriptor, ChannelMembership, DesiredRecord, MembershipType, Team,
    TeamMembership,
};
pub use pacing::PacingPolicy;
pub use reconcile::{ReconcileOptions, Reconciler};
pub use report::{Operation, RecordedFailure, ReconcileMode, RunReport};
pub use role::{normalize_role, CanonicalRole};
