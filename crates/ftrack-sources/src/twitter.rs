//! Twitter/X API v2 client (app-only bearer authentication).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ftrack_core::{Channel, Platform, RawItem};
use reqwest::{Client, Url};
use serde::Deserialize;

use crate::error::SourceError;
use crate::http::{build_client, join, parse_base_url, read_json};
use crate::{ClientConfig, PageSizes, SourceClient};

const DEFAULT_BASE_URL: &str = "https://api.twitter.com/2/";
const MIN_PAGE_SIZE: u32 = 5;
const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Deserialize)]
struct UserLookupResponse {
    data: Option<User>,
}

#[derive(Debug, Deserialize)]
struct User {
    id: String,
}

#[derive(Debug, Deserialize)]
struct TimelineResponse {
    #[serde(default)]
    data: Vec<Tweet>,
}

#[derive(Debug, Deserialize)]
struct Tweet {
    id: String,
    text: String,
    created_at: Option<DateTime<Utc>>,
}

/// Client for the Twitter/X v2 API.
pub struct TwitterClient {
    client: Client,
    bearer_token: Option<String>,
    base_url: Url,
    page_sizes: PageSizes,
}

impl TwitterClient {
    /// Creates a client pointed at the production API.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(bearer_token: Option<&str>, config: &ClientConfig) -> Result<Self, SourceError> {
        Self::with_base_url(bearer_token, config, DEFAULT_BASE_URL)
    }

    /// Creates a client with a custom base URL (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Http`] if the client cannot be constructed, or
    /// [`SourceError::InvalidBaseUrl`] if `base_url` does not parse.
    pub fn with_base_url(
        bearer_token: Option<&str>,
        config: &ClientConfig,
        base_url: &str,
    ) -> Result<Self, SourceError> {
        Ok(Self {
            client: build_client(config.timeout_secs, &config.user_agent)?,
            bearer_token: bearer_token
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_owned),
            base_url: parse_base_url(base_url)?,
            page_sizes: config.page_sizes,
        })
    }

    async fn resolve_user_id(&self, token: &str, username: &str) -> Result<String, SourceError> {
        let handle = username.trim_start_matches('@');
        let url = join(&self.base_url, &format!("users/by/username/{handle}"))?;

        let response = self.client.get(url).bearer_auth(token).send().await?;
        let body: UserLookupResponse = read_json(response, Platform::Twitter, "users/by/username")
            .await
            .map_err(|e| match e {
                SourceError::NotFound { .. } => not_found(username),
                other => other,
            })?;

        // Suspended or unknown users come back as 200 with an `errors` array.
        body.data.map(|u| u.id).ok_or_else(|| not_found(username))
    }

    async fn user_tweets(
        &self,
        token: &str,
        user_id: &str,
        page_size: u32,
    ) -> Result<Vec<RawItem>, SourceError> {
        let mut url = join(&self.base_url, &format!("users/{user_id}/tweets"))?;
        url.query_pairs_mut()
            .append_pair(
                "max_results",
                &page_size.clamp(MIN_PAGE_SIZE, MAX_PAGE_SIZE).to_string(),
            )
            .append_pair("tweet.fields", "created_at");

        let response = self.client.get(url).bearer_auth(token).send().await?;
        let body: TimelineResponse = read_json(response, Platform::Twitter, "users/tweets").await?;

        Ok(body.data.into_iter().map(to_raw_item).collect())
    }
}

#[async_trait]
impl SourceClient for TwitterClient {
    fn platform(&self) -> Platform {
        Platform::Twitter
    }

    async fn fetch_recent_items(&self, channel: &Channel) -> Result<Vec<RawItem>, SourceError> {
        let token = self
            .bearer_token
            .as_deref()
            .ok_or(SourceError::MissingCredentials {
                platform: Platform::Twitter,
            })?;

        let user_id = self.resolve_user_id(token, &channel.external_id).await?;
        let page_size = self.page_sizes.for_channel(channel);
        let items = self.user_tweets(token, &user_id, page_size).await?;

        tracing::debug!(
            channel_id = channel.id,
            handle = %channel.external_id,
            count = items.len(),
            "fetched tweets"
        );
        Ok(items)
    }
}

fn not_found(handle: &str) -> SourceError {
    SourceError::ChannelNotFound {
        platform: Platform::Twitter,
        external_id: handle.to_string(),
    }
}

/// Tweets have no title; the full text is the body.
fn to_raw_item(tweet: Tweet) -> RawItem {
    RawItem {
        external_id: tweet.id,
        title: String::new(),
        body: tweet.text,
        published_at: tweet.created_at,
    }
}
