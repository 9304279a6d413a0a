use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;
use url::Url;

use crate::config::Config;
use crate::error::{FeedError, FetchCause, FetchError, ValidationError};

/// Source of raw feed payloads.
#[async_trait]
pub trait FeedFetcher: Send + Sync {
    /// Returns the raw feed document at `url`, or why it could not be had.
    async fn fetch(&self, url: &str) -> Result<String, FeedError>;
}

/// Fetches feeds through the `/api/news` proxy endpoint.
///
/// One request per call, no retries. The feed URL is percent-encoded
/// once into the `url` query parameter.
#[derive(Debug, Clone)]
pub struct FeedClient {
    client: Client,
    endpoint: String,
}

impl FeedClient {
    pub fn new(config: &Config) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(config.proxy.timeout())
            .user_agent(config.proxy.user_agent.as_str())
            .build()?;

        Ok(Self::with_client(client, config.proxy_endpoint()))
    }

    pub fn with_client(client: Client, endpoint: impl Into<String>) -> Self {
        let endpoint = endpoint.into().trim_end_matches('/').to_string();
        Self { client, endpoint }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Proxy URL that serves `feed_url`.
    pub fn request_url(&self, feed_url: &str) -> String {
        format!(
            "{}/api/news?url={}",
            self.endpoint,
            urlencoding::encode(feed_url)
        )
    }
}

#[async_trait]
impl FeedFetcher for FeedClient {
    async fn fetch(&self, url: &str) -> Result<String, FeedError> {
        validate_feed_url(url)?;
        let url = url.trim();

        debug!(url = url, proxy = %self.endpoint, "Fetching feed");

        let response = self
            .client
            .get(self.request_url(url))
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::new(url, FetchCause::HttpStatus(status.as_u16())).into());
        }

        let payload = response
            .text()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;

        Ok(payload)
    }
}

/// Checks that `url` is a non-empty absolute http(s) URL.
pub fn validate_feed_url(url: &str) -> Result<Url, ValidationError> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Empty);
    }

    let parsed = Url::parse(trimmed).map_err(|source| ValidationError::Malformed {
        url: trimmed.to_string(),
        source,
    })?;

    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        scheme => Err(ValidationError::UnsupportedScheme {
            url: trimmed.to_string(),
            scheme: scheme.to_string(),
        }),
    }
}
