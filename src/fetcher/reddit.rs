use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::USER_AGENT;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::app::error::truncate_body;
use crate::app::{Result, SavedFeedError};
use crate::auth::CredentialSource;
use crate::config::RedditConfig;
use crate::fetcher::{Page, SavedSource};

#[derive(Debug, Deserialize)]
struct Listing {
    data: Page,
}

/// Authenticated client for the Reddit OAuth API.
pub struct RedditClient {
    client: Client,
    api_url: Url,
    user_agent: String,
    credentials: Arc<dyn CredentialSource + Send + Sync>,
}

impl RedditClient {
    pub fn new(
        config: &RedditConfig,
        credentials: Arc<dyn CredentialSource + Send + Sync>,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .gzip(true)
            .brotli(true)
            .build()
            .map_err(|e| SavedFeedError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_url: Url::parse(&config.api_url)?,
            user_agent: config.user_agent.clone(),
            credentials,
        })
    }

    fn saved_url(&self, user: &str) -> Result<Url> {
        let mut url = self.api_url.clone();
        url.path_segments_mut()
            .map_err(|_| SavedFeedError::Config(format!("Unusable API URL: {}", self.api_url)))?
            .pop_if_empty()
            .extend(["user", user, "saved"]);
        Ok(url)
    }
}

#[async_trait]
impl SavedSource for RedditClient {
    async fn fetch_saved_page(&self, user: &str, after: Option<&str>) -> Result<Page> {
        let url = self.saved_url(user)?;
        debug!("Fetching saved items page {} (after: {:?})", url, after);

        let credential = self.credentials.current_token();
        let mut request = self
            .client
            .get(url)
            .bearer_auth(&credential.token)
            .header(USER_AGENT, &self.user_agent);
        if let Some(after) = after {
            request = request.query(&[("after", after)]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SavedFeedError::Upstream(format!("Saved items request failed: {}", e)))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            SavedFeedError::Upstream(format!("Failed to read saved items response: {}", e))
        })?;

        if status != StatusCode::OK {
            return Err(SavedFeedError::Upstream(format!(
                "Saved items request returned {}: {}",
                status,
                truncate_body(&body)
            )));
        }

        let listing: Listing = serde_json::from_str(&body).map_err(|e| {
            SavedFeedError::Upstream(format!("Malformed saved items response: {}", e))
        })?;

        Ok(listing.data)
    }
}
