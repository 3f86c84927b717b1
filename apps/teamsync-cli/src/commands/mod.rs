//! CLI command implementations

pub mod reconcile;
pub mod validate;
