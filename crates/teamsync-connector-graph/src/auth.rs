//! App-only (client credentials) tokens for Microsoft Graph.

use chrono::{DateTime, Duration, Utc};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use crate::{GraphConfig, GraphCredentials, GraphError, GraphResult};

/// Refresh this long before the token actually expires.
const REFRESH_MARGIN_MINUTES: i64 = 5;

#[derive(Serialize)]
struct TokenRequest<'a> {
    grant_type: &'static str,
    client_id: &'a str,
    client_secret: &'a str,
    scope: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Clone)]
struct AccessToken {
    value: String,
    expires_at: DateTime<Utc>,
}

impl AccessToken {
    fn usable_at(&self, now: DateTime<Utc>) -> bool {
        now + Duration::minutes(REFRESH_MARGIN_MINUTES) < self.expires_at
    }
}

/// Holds the current access token and fetches a new one when it is close to
/// expiry or has been invalidated.
#[derive(Debug)]
pub struct TokenCache {
    credentials: GraphCredentials,
    token_url: String,
    scope: String,
    http_client: reqwest::Client,
    current: RwLock<Option<AccessToken>>,
}

impl TokenCache {
    /// Token endpoint and scope come from the tenant and cloud in `config`.
    pub fn new(credentials: GraphCredentials, config: &GraphConfig) -> Self {
        Self {
            credentials,
            token_url: format!(
                "{}/{}/oauth2/v2.0/token",
                config.login_endpoint(),
                config.tenant_id
            ),
            scope: format!("{}/.default", config.graph_endpoint()),
            http_client: reqwest::Client::new(),
            current: RwLock::new(None),
        }
    }

    /// Returns a bearer token, fetching a new one if needed.
    #[instrument(skip(self))]
    pub async fn get_token(&self) -> GraphResult<String> {
        if let Some(token) = self.cached(Utc::now()).await {
            return Ok(token);
        }

        let mut current = self.current.write().await;
        // Another caller may have refreshed while we waited for the lock.
        if let Some(token) = current.as_ref().filter(|t| t.usable_at(Utc::now())) {
            return Ok(token.value.clone());
        }

        debug!("Requesting access token");
        let token = self.request_token().await?;
        let value = token.value.clone();
        *current = Some(token);
        Ok(value)
    }

    /// Drops the cached token; the next call fetches a new one.
    pub async fn invalidate(&self) {
        *self.current.write().await = None;
    }

    async fn cached(&self, now: DateTime<Utc>) -> Option<String> {
        self.current
            .read()
            .await
            .as_ref()
            .filter(|t| t.usable_at(now))
            .map(|t| t.value.clone())
    }

    async fn request_token(&self) -> GraphResult<AccessToken> {
        let form = TokenRequest {
            grant_type: "client_credentials",
            client_id: &self.credentials.client_id,
            client_secret: self.credentials.client_secret.expose_secret(),
            scope: &self.scope,
        };

        let response = self
            .http_client
            .post(&self.token_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| GraphError::Auth(format!("token request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GraphError::Auth(format!(
                "token endpoint returned {status}: {body}"
            )));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| GraphError::Auth(format!("invalid token response: {e}")))?;

        let expires_at = Utc::now() + Duration::seconds(body.expires_in);
        debug!(%expires_at, "Access token acquired");
        Ok(AccessToken {
            value: body.access_token,
            expires_at,
        })
    }
}
