use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::USER_AGENT;
use reqwest::Client;
use serde::Deserialize;
use tracing::info;
use url::Url;

use crate::app::error::truncate_body;
use crate::app::{Result, SavedFeedError};
use crate::auth::{AccessCredential, TokenExchange};
use crate::config::RedditConfig;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    expires_in: Option<u64>,
    error: Option<String>,
}

/// Resource-owner password grant against the Reddit token endpoint,
/// authenticated with the application's id and secret.
pub struct PasswordGrant {
    client: Client,
    token_url: Url,
    username: String,
    password: String,
    app_id: String,
    app_secret: String,
    user_agent: String,
}

impl PasswordGrant {
    pub fn new(config: &RedditConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .gzip(true)
            .brotli(true)
            .build()
            .map_err(|e| SavedFeedError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            token_url: Url::parse(&config.token_url)?,
            username: config.username.clone(),
            password: config.password.clone(),
            app_id: config.app_id.clone(),
            app_secret: config.app_secret.clone(),
            user_agent: config.user_agent.clone(),
        })
    }
}

#[async_trait]
impl TokenExchange for PasswordGrant {
    async fn exchange(&self) -> Result<AccessCredential> {
        info!("Requesting new access token");

        let response = self
            .client
            .post(self.token_url.clone())
            .basic_auth(&self.app_id, Some(&self.app_secret))
            .header(USER_AGENT, &self.user_agent)
            .form(&[
                ("grant_type", "password"),
                ("username", self.username.as_str()),
                ("password", self.password.as_str()),
            ])
            .send()
            .await
            .map_err(|e| SavedFeedError::Auth(format!("Token request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SavedFeedError::Auth(format!("Failed to read token response: {}", e)))?;

        if !status.is_success() {
            return Err(SavedFeedError::Auth(format!(
                "Token endpoint returned {}: {}",
                status,
                truncate_body(&body)
            )));
        }

        let parsed: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| SavedFeedError::Auth(format!("Malformed token response: {}", e)))?;

        // Rejected credentials still come back as 200 with an error field.
        if let Some(error) = parsed.error {
            return Err(SavedFeedError::Auth(format!("Token request rejected: {}", error)));
        }

        match (parsed.access_token, parsed.expires_in) {
            (Some(token), Some(expires_in)) if !token.is_empty() => Ok(AccessCredential::new(
                token,
                Duration::from_secs(expires_in),
            )),
            _ => Err(SavedFeedError::Auth(
                "Token response without access_token/expires_in".to_string(),
            )),
        }
    }
}
