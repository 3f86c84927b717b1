//! Microsoft Graph directory client for teamsync.
//!
//! Implements [`teamsync_core::DirectoryClient`] over the Teams endpoints of
//! Microsoft Graph using app-only (client credentials) authentication.
//!
//! # Features
//!
//! - `OAuth2` client credentials with token caching
//! - `Retry-After` handling, exponential backoff with jitter and a circuit
//!   breaker for sustained throttling
//! - `@odata.nextLink` pagination
//! - Multi-cloud support (Commercial, US Government, China)
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use teamsync_connector_graph::{GraphConfig, GraphCredentials, GraphDirectory};
//! use teamsync_core::{PacingPolicy, Reconciler};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = GraphConfig::builder()
//!     .tenant_id("your-tenant-id")
//!     .private_channel_owner("teams-admin@contoso.com")
//!     .build()?;
//! let credentials = GraphCredentials::new("your-client-id", "your-client-secret");
//!
//! let directory = Arc::new(GraphDirectory::new(config, credentials)?);
//! let reconciler = Reconciler::new(directory, PacingPolicy::default())?;
//! # Ok(())
//! # }
//! ```

mod auth;
mod circuit_breaker;
mod config;
mod directory;
mod error;
mod graph_client;
mod metrics;
mod rate_limit;

// Re-exports
pub use auth::TokenCache;
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerState};
pub use config::{GraphCloudEnvironment, GraphConfig, GraphConfigBuilder, GraphCredentials};
pub use directory::GraphDirectory;
pub use error::{GraphError, GraphResult};
pub use graph_client::GraphClient;
pub use metrics::RateLimitMetrics;
pub use rate_limit::{RateLimitConfig, RateLimiter};
