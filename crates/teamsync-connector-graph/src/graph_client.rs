//! Microsoft Graph HTTP client with pagination and rate limiting.

use reqwest::{header, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use crate::metrics::RateLimitMetrics;
use crate::rate_limit::RateLimiter;
use crate::{GraphConfig, GraphError, GraphResult, TokenCache};

/// `OData` error response from Microsoft Graph.
#[derive(Debug, Deserialize)]
pub struct ODataError {
    pub error: ODataErrorBody,
}

/// `OData` error body.
#[derive(Debug, Deserialize)]
pub struct ODataErrorBody {
    pub code: String,
    pub message: String,
}

/// One page of a collection response.
#[derive(Debug, Deserialize)]
pub struct ODataResponse<T> {
    pub value: Vec<T>,
    #[serde(rename = "@odata.nextLink")]
    pub next_link: Option<String>,
}

/// Microsoft Graph API client.
#[derive(Debug)]
pub struct GraphClient {
    http_client: reqwest::Client,
    token_cache: Arc<TokenCache>,
    base_url: String,
    rate_limiter: Arc<RateLimiter>,
}

impl GraphClient {
    /// Creates a new Graph client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created or the rate
    /// limit config is invalid.
    pub fn new(config: &GraphConfig, token_cache: Arc<TokenCache>) -> GraphResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GraphError::Config(format!("Failed to create HTTP client: {e}")))?;

        let rate_limiter = RateLimiter::new(config.rate_limit.clone())
            .map_err(|e| GraphError::Config(format!("Invalid rate limit config: {e}")))?;

        Ok(Self {
            http_client,
            token_cache,
            base_url: format!("{}/{}", config.graph_endpoint(), config.api_version),
            rate_limiter: Arc::new(rate_limiter),
        })
    }

    #[must_use]
    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.rate_limiter
    }

    /// Returns current rate limit metrics.
    pub async fn rate_limit_metrics(&self) -> RateLimitMetrics {
        self.rate_limiter.metrics().await
    }

    /// Base URL for Graph requests, including the API version.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[instrument(skip(self))]
    pub async fn get<T: DeserializeOwned>(&self, url: &str) -> GraphResult<T> {
        let response = self
            .execute(reqwest::Method::GET, url, None::<&()>)
            .await?;
        Ok(response.json().await?)
    }

    #[instrument(skip(self, body))]
    pub async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        url: &str,
        body: &B,
    ) -> GraphResult<T> {
        let response = self
            .execute(reqwest::Method::POST, url, Some(body))
            .await?;
        Ok(response.json().await?)
    }

    /// DELETE; Graph answers 204 No Content.
    #[instrument(skip(self))]
    pub async fn delete(&self, url: &str) -> GraphResult<()> {
        self.execute(reqwest::Method::DELETE, url, None::<&()>)
            .await?;
        Ok(())
    }

    /// Sends the request, retrying throttled and transiently failed attempts.
    async fn execute<B: Serialize>(
        &self,
        method: reqwest::Method,
        url: &str,
        body: Option<&B>,
    ) -> GraphResult<reqwest::Response> {
        self.rate_limiter.admit().await?;

        let max_transient = self.rate_limiter.config().max_transient_retries;
        let mut throttled = 0u32;
        let mut transient = 0u32;
        let mut token_refreshed = false;

        loop {
            let token = self.token_cache.get_token().await?;
            let mut request = self
                .http_client
                .request(method.clone(), url)
                .bearer_auth(&token);
            if let Some(body) = body {
                request = request.json(body);
            }

            let response = request.send().await?;
            let status = response.status();

            match status {
                StatusCode::TOO_MANY_REQUESTS => {
                    let retry_after = response
                        .headers()
                        .get(header::RETRY_AFTER)
                        .and_then(|v| v.to_str().ok());
                    self.rate_limiter.on_throttled(retry_after, throttled).await?;
                    throttled += 1;
                }
                StatusCode::BAD_GATEWAY
                | StatusCode::SERVICE_UNAVAILABLE
                | StatusCode::GATEWAY_TIMEOUT
                    if transient < max_transient =>
                {
                    warn!(
                        status = status.as_u16(),
                        retry = transient + 1,
                        max = max_transient,
                        "Transient Graph error, retrying"
                    );
                    self.rate_limiter.wait_for_transient(transient).await;
                    transient += 1;
                }
                // A token revoked before its expiry gets one refresh.
                StatusCode::UNAUTHORIZED if !token_refreshed => {
                    debug!("Access token rejected, refreshing");
                    self.token_cache.invalidate().await;
                    token_refreshed = true;
                }
                _ if status.is_success() => {
                    self.rate_limiter.record_success().await;
                    return Ok(response);
                }
                _ => return Err(Self::api_error(response).await),
            }
        }
    }

    async fn api_error(response: reqwest::Response) -> GraphError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        match serde_json::from_str::<ODataError>(&body) {
            Ok(odata) => GraphError::GraphApi {
                status: status.as_u16(),
                code: odata.error.code,
                message: odata.error.message,
            },
            Err(_) => GraphError::GraphApi {
                status: status.as_u16(),
                code: status.canonical_reason().unwrap_or("Unknown").to_string(),
                message: body,
            },
        }
    }

    /// Follows `@odata.nextLink` until exhausted, handing each page to
    /// `callback`.
    #[instrument(skip(self, callback))]
    pub async fn get_paginated<T, F>(&self, initial_url: &str, mut callback: F) -> GraphResult<()>
    where
        T: DeserializeOwned,
        F: FnMut(Vec<T>) -> GraphResult<()>,
    {
        let mut url = initial_url.to_string();
        let mut pages = 0u32;

        loop {
            let response: ODataResponse<T> = self.get(&url).await?;
            pages += 1;
            debug!(page = pages, items = response.value.len(), "Fetched page");

            callback(response.value)?;

            match response.next_link {
                Some(next) => url = next,
                None => return Ok(()),
            }
        }
    }

    /// Collects every item of a paginated collection.
    pub async fn get_all<T: DeserializeOwned>(&self, url: &str) -> GraphResult<Vec<T>> {
        let mut items = Vec::new();
        self.get_paginated(url, |page: Vec<T>| {
            items.extend(page);
            Ok(())
        })
        .await?;
        Ok(items)
    }
}
