//! CLI configuration: a YAML file plus environment overrides.
//!
//! ```yaml
//! graph:
//!   tenant_id: 00000000-0000-0000-0000-000000000000
//!   private_channel_owner: teams-admin@contoso.com
//! auth:
//!   client_id: 11111111-1111-1111-1111-111111111111
//! pacing:
//!   item_delay_ms: 200
//! reconcile:
//!   team_roles_from_input: false
//! ```
//!
//! The client secret is only read from `TEAMSYNC_CLIENT_SECRET`.

use secrecy::SecretString;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use teamsync_connector_graph::{GraphConfig, GraphCredentials};
use teamsync_core::{MembershipType, PacingPolicy, ReconcileMode, ReconcileOptions};

use crate::error::{CliError, CliResult};

pub const CONFIG_ENV: &str = "TEAMSYNC_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "teamsync.yaml";

const TENANT_ID_ENV: &str = "TEAMSYNC_TENANT_ID";
const CLIENT_ID_ENV: &str = "TEAMSYNC_CLIENT_ID";
const CLIENT_SECRET_ENV: &str = "TEAMSYNC_CLIENT_SECRET";

/// App registration settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(skip)]
    pub client_secret: Option<SecretString>,
}

/// Defaults for reconciliation options not given on the command line.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReconcileSettings {
    #[serde(default)]
    pub team_roles_from_input: bool,
    #[serde(default)]
    pub channel_membership_type: MembershipType,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub graph: GraphConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub pacing: PacingPolicy,
    #[serde(default)]
    pub reconcile: ReconcileSettings,
}

impl AppConfig {
    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> CliResult<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            CliError::Config(format!(
                "Failed to read config file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(content: &str) -> CliResult<Self> {
        serde_yaml::from_str(content)
            .map_err(|e| CliError::Config(format!("Failed to parse config: {e}")))
    }

    /// Resolves the config file: the explicit path, then `TEAMSYNC_CONFIG`
    /// (handled by clap), then `./teamsync.yaml` if present.
    pub fn config_path(explicit: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(path.to_path_buf());
        }
        let default = PathBuf::from(DEFAULT_CONFIG_FILE);
        default.exists().then_some(default)
    }

    /// Loads the file (if any) and applies environment overrides.
    pub fn load(explicit: Option<&Path>) -> CliResult<Self> {
        let mut config = match Self::config_path(explicit) {
            Some(path) => {
                tracing::debug!(path = %path.display(), "Loading configuration");
                Self::from_file(path)?
            }
            None => Self::default(),
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(tenant_id) = lookup(TENANT_ID_ENV) {
            self.graph.tenant_id = tenant_id;
        }
        if let Some(client_id) = lookup(CLIENT_ID_ENV) {
            self.auth.client_id = Some(client_id);
        }
        if let Some(secret) = lookup(CLIENT_SECRET_ENV) {
            self.auth.client_secret = Some(SecretString::new(secret));
        }
    }

    /// Builds Graph credentials from the loaded settings.
    pub fn credentials(&self) -> CliResult<GraphCredentials> {
        let client_id = self
            .auth
            .client_id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| CliError::Config(format!("client id missing (set {CLIENT_ID_ENV})")))?;
        let client_secret = self.auth.client_secret.clone().ok_or_else(|| {
            CliError::Config(format!("client secret missing (set {CLIENT_SECRET_ENV})"))
        })?;

        Ok(GraphCredentials {
            client_id,
            client_secret,
        })
    }

    /// Merges command-line flags with the configured defaults.
    pub fn reconcile_options(&self, mode: ReconcileMode, dry_run: bool) -> ReconcileOptions {
        ReconcileOptions {
            mode,
            dry_run,
            team_roles_from_input: self.reconcile.team_roles_from_input,
            channel_membership_type: self.reconcile.channel_membership_type,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
graph:
  tenant_id: contoso
  cloud_environment: us_government
  private_channel_owner: admin@contoso.com
  rate_limit:
    max_retries: 4
auth:
  client_id: app-id
pacing:
  item_delay_ms: 50
  max_create_attempts: 5
reconcile:
  team_roles_from_input: true
  channel_membership_type: standard
"#;

        let config = AppConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.graph.tenant_id, "contoso");
        assert_eq!(config.graph.graph_endpoint(), "https://graph.microsoft.us");
        assert_eq!(config.graph.rate_limit.max_retries, 4);
        assert_eq!(config.auth.client_id.as_deref(), Some("app-id"));
        assert_eq!(config.pacing.item_delay_ms, 50);
        assert_eq!(config.pacing.batch_delay_ms, 2_000);
        assert!(config.reconcile.team_roles_from_input);

        let options = config.reconcile_options(ReconcileMode::Full, true);
        assert!(options.dry_run);
        assert_eq!(options.channel_membership_type, MembershipType::Standard);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = AppConfig::from_yaml("{}").unwrap();
        assert_eq!(config.pacing, PacingPolicy::default());
        assert_eq!(config.graph.api_version, "v1.0");
        assert!(!config.reconcile.team_roles_from_input);
        assert_eq!(
            config.reconcile.channel_membership_type,
            MembershipType::Private
        );
    }

    #[test]
    fn test_invalid_yaml_is_config_error() {
        let err = AppConfig::from_yaml("graph: [").unwrap_err();
        assert!(matches!(err, CliError::Config(_)));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "graph:\n  tenant_id: from-file").unwrap();

        let config = AppConfig::load(Some(file.path())).unwrap();
        assert!(!config.graph.tenant_id.is_empty());
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let err = AppConfig::from_file("/nonexistent/teamsync.yaml").unwrap_err();
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_env_overrides_and_credentials() {
        let env: HashMap<&str, &str> = [
            (TENANT_ID_ENV, "env-tenant"),
            (CLIENT_ID_ENV, "env-client"),
            (CLIENT_SECRET_ENV, "env-secret"),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::from_yaml("graph:\n  tenant_id: yaml-tenant").unwrap();
        config.apply_overrides(|key| env.get(key).map(|v| (*v).to_string()));

        assert_eq!(config.graph.tenant_id, "env-tenant");
        let credentials = config.credentials().unwrap();
        assert_eq!(credentials.client_id, "env-client");
    }

    #[test]
    fn test_missing_secret_rejected() {
        let mut config = AppConfig::default();
        config.apply_overrides(|key| (key == CLIENT_ID_ENV).then(|| "client".to_string()));

        let err = config.credentials().unwrap_err();
        assert!(err.to_string().contains(CLIENT_SECRET_ENV));
    }

    #[test]
    fn test_explicit_path_wins() {
        let path = Path::new("/etc/teamsync/custom.yaml");
        assert_eq!(AppConfig::config_path(Some(path)), Some(path.to_path_buf()));
    }
}
