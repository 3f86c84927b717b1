//! Configuration for the Graph directory client.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::rate_limit::RateLimitConfig;
use crate::{GraphError, GraphResult};

/// National cloud hosting the tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GraphCloudEnvironment {
    /// Global Azure.
    #[default]
    Commercial,
    /// Azure US Government (GCC High / `DoD`).
    UsGovernment,
    /// Azure China (21Vianet).
    China,
}

impl GraphCloudEnvironment {
    /// Returns the Azure AD login endpoint.
    #[must_use]
    pub fn login_endpoint(&self) -> &'static str {
        match self {
            Self::Commercial => "https://login.microsoftonline.com",
            Self::UsGovernment => "https://login.microsoftonline.us",
            Self::China => "https://login.chinacloudapi.cn",
        }
    }

    /// Returns the Microsoft Graph endpoint.
    #[must_use]
    pub fn graph_endpoint(&self) -> &'static str {
        match self {
            Self::Commercial => "https://graph.microsoft.com",
            Self::UsGovernment => "https://graph.microsoft.us",
            Self::China => "https://microsoftgraph.chinacloudapi.cn",
        }
    }
}

/// App registration credentials for the client-credentials flow.
#[derive(Debug, Clone, Deserialize)]
pub struct GraphCredentials {
    pub client_id: String,
    pub client_secret: SecretString,
}

impl GraphCredentials {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: SecretString::new(client_secret.into()),
        }
    }
}

fn default_api_version() -> String {
    "v1.0".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_page_size() -> u32 {
    100
}

/// Graph client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphConfig {
    /// Directory (tenant) id.
    #[serde(default)]
    pub tenant_id: String,

    #[serde(default)]
    pub cloud_environment: GraphCloudEnvironment,

    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Overrides the cloud's Graph endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graph_endpoint: Option<String>,

    /// Overrides the cloud's login endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub login_endpoint: Option<String>,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// `$top` for member listings.
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// User added as owner when creating a private channel. Graph requires
    /// one when the caller authenticates as an application.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_channel_owner: Option<String>,

    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            tenant_id: String::new(),
            cloud_environment: GraphCloudEnvironment::default(),
            api_version: default_api_version(),
            graph_endpoint: None,
            login_endpoint: None,
            timeout_secs: default_timeout_secs(),
            page_size: default_page_size(),
            private_channel_owner: None,
            rate_limit: RateLimitConfig::default(),
        }
    }
}

impl GraphConfig {
    #[must_use]
    pub fn builder() -> GraphConfigBuilder {
        GraphConfigBuilder::default()
    }

    /// Graph endpoint in effect, without trailing slash.
    #[must_use]
    pub fn graph_endpoint(&self) -> String {
        self.graph_endpoint
            .as_deref()
            .unwrap_or(self.cloud_environment.graph_endpoint())
            .trim_end_matches('/')
            .to_string()
    }

    /// Login endpoint in effect, without trailing slash.
    #[must_use]
    pub fn login_endpoint(&self) -> String {
        self.login_endpoint
            .as_deref()
            .unwrap_or(self.cloud_environment.login_endpoint())
            .trim_end_matches('/')
            .to_string()
    }

    /// Validates the configuration.
    pub fn validate(&self) -> GraphResult<()> {
        if self.tenant_id.trim().is_empty() {
            return Err(GraphError::Config("tenant_id is required".to_string()));
        }
        if self.api_version.trim().is_empty() {
            return Err(GraphError::Config("api_version is required".to_string()));
        }
        if self.timeout_secs == 0 {
            return Err(GraphError::Config("timeout_secs must be > 0".to_string()));
        }
        if !(1..=999).contains(&self.page_size) {
            return Err(GraphError::Config(
                "page_size must be in range [1, 999]".to_string(),
            ));
        }
        url::Url::parse(&self.graph_endpoint())?;
        url::Url::parse(&self.login_endpoint())?;
        self.rate_limit.validate().map_err(GraphError::Config)?;
        Ok(())
    }
}

/// Builder for [`GraphConfig`].
#[derive(Debug, Default)]
pub struct GraphConfigBuilder {
    config: GraphConfig,
}

impl GraphConfigBuilder {
    #[must_use]
    pub fn tenant_id(mut self, tenant_id: impl Into<String>) -> Self {
        self.config.tenant_id = tenant_id.into();
        self
    }

    #[must_use]
    pub fn cloud_environment(mut self, env: GraphCloudEnvironment) -> Self {
        self.config.cloud_environment = env;
        self
    }

    #[must_use]
    pub fn api_version(mut self, version: impl Into<String>) -> Self {
        self.config.api_version = version.into();
        self
    }

    #[must_use]
    pub fn graph_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.graph_endpoint = Some(endpoint.into());
        self
    }

    #[must_use]
    pub fn login_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.login_endpoint = Some(endpoint.into());
        self
    }

    #[must_use]
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.config.timeout_secs = secs;
        self
    }

    #[must_use]
    pub fn page_size(mut self, size: u32) -> Self {
        self.config.page_size = size;
        self
    }

    #[must_use]
    pub fn private_channel_owner(mut self, owner: impl Into<String>) -> Self {
        self.config.private_channel_owner = Some(owner.into());
        self
    }

    #[must_use]
    pub fn rate_limit(mut self, rate_limit: RateLimitConfig) -> Self {
        self.config.rate_limit = rate_limit;
        self
    }

    /// Validates and returns the configuration.
    pub fn build(self) -> GraphResult<GraphConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
