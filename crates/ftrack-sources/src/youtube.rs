//! `YouTube` Data API v3 client.
//!
//! A channel is resolved to its uploads playlist on every fetch, then the
//! newest entries of that playlist are listed.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ftrack_core::{Channel, Platform, RawItem};
use reqwest::{Client, Url};
use serde::Deserialize;

use crate::error::SourceError;
use crate::http::{build_client, join, parse_base_url, read_json};
use crate::{ClientConfig, PageSizes, SourceClient};

const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/youtube/v3/";
const MAX_PAGE_SIZE: u32 = 50;

#[derive(Debug, Deserialize)]
struct ChannelListResponse {
    #[serde(default)]
    items: Vec<ChannelResource>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChannelResource {
    content_details: ContentDetails,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContentDetails {
    related_playlists: RelatedPlaylists,
}

#[derive(Debug, Deserialize)]
struct RelatedPlaylists {
    uploads: String,
}

#[derive(Debug, Deserialize)]
struct PlaylistItemsResponse {
    #[serde(default)]
    items: Vec<PlaylistItem>,
}

#[derive(Debug, Deserialize)]
struct PlaylistItem {
    snippet: Snippet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snippet {
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    published_at: Option<DateTime<Utc>>,
    resource_id: Option<ResourceId>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResourceId {
    video_id: Option<String>,
}

/// Client for the `YouTube` Data API.
///
/// Use [`YouTubeClient::new`] for production or
/// [`YouTubeClient::with_base_url`] to point at a mock server in tests.
pub struct YouTubeClient {
    client: Client,
    api_key: Option<String>,
    base_url: Url,
    page_sizes: PageSizes,
}

impl YouTubeClient {
    /// Creates a client pointed at the production API.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(api_key: Option<&str>, config: &ClientConfig) -> Result<Self, SourceError> {
        Self::with_base_url(api_key, config, DEFAULT_BASE_URL)
    }

    /// Creates a client with a custom base URL (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Http`] if the client cannot be constructed, or
    /// [`SourceError::InvalidBaseUrl`] if `base_url` does not parse.
    pub fn with_base_url(
        api_key: Option<&str>,
        config: &ClientConfig,
        base_url: &str,
    ) -> Result<Self, SourceError> {
        Ok(Self {
            client: build_client(config.timeout_secs, &config.user_agent)?,
            api_key: api_key
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(str::to_owned),
            base_url: parse_base_url(base_url)?,
            page_sizes: config.page_sizes,
        })
    }

    /// Which `channels.list` filter resolves this identifier.
    fn lookup_param(external_id: &str) -> &'static str {
        if external_id.starts_with('@') {
            "forHandle"
        } else if external_id.starts_with("UC") && external_id.len() == 24 {
            "id"
        } else {
            "forUsername"
        }
    }

    async fn uploads_playlist(&self, api_key: &str, external_id: &str) -> Result<String, SourceError> {
        let mut url = join(&self.base_url, "channels")?;
        url.query_pairs_mut()
            .append_pair("part", "contentDetails")
            .append_pair(Self::lookup_param(external_id), external_id)
            .append_pair("key", api_key);

        let response = self.client.get(url).send().await?;
        let body: ChannelListResponse = read_json(response, Platform::YouTube, "channels")
            .await
            .map_err(|e| match e {
                SourceError::NotFound { .. } => not_found(external_id),
                other => other,
            })?;

        body.items
            .into_iter()
            .next()
            .map(|c| c.content_details.related_playlists.uploads)
            .ok_or_else(|| not_found(external_id))
    }

    async fn playlist_items(
        &self,
        api_key: &str,
        playlist_id: &str,
        page_size: u32,
    ) -> Result<Vec<RawItem>, SourceError> {
        let mut url = join(&self.base_url, "playlistItems")?;
        url.query_pairs_mut()
            .append_pair("part", "snippet")
            .append_pair("playlistId", playlist_id)
            .append_pair(
                "maxResults",
                &page_size.clamp(1, MAX_PAGE_SIZE).to_string(),
            )
            .append_pair("key", api_key);

        let response = self.client.get(url).send().await?;
        let body: PlaylistItemsResponse =
            read_json(response, Platform::YouTube, "playlistItems").await?;

        Ok(body.items.into_iter().filter_map(to_raw_item).collect())
    }
}

#[async_trait]
impl SourceClient for YouTubeClient {
    fn platform(&self) -> Platform {
        Platform::YouTube
    }

    async fn fetch_recent_items(&self, channel: &Channel) -> Result<Vec<RawItem>, SourceError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(SourceError::MissingCredentials {
                platform: Platform::YouTube,
            })?;

        let playlist_id = self.uploads_playlist(api_key, &channel.external_id).await?;
        let page_size = self.page_sizes.for_channel(channel);
        let items = self.playlist_items(api_key, &playlist_id, page_size).await?;

        tracing::debug!(
            channel_id = channel.id,
            external_id = %channel.external_id,
            playlist_id = %playlist_id,
            count = items.len(),
            "fetched youtube uploads"
        );
        Ok(items)
    }
}

fn not_found(external_id: &str) -> SourceError {
    SourceError::ChannelNotFound {
        platform: Platform::YouTube,
        external_id: external_id.to_string(),
    }
}

/// Entries without a video id (deleted or private uploads) are dropped.
fn to_raw_item(item: PlaylistItem) -> Option<RawItem> {
    let snippet = item.snippet;
    let video_id = snippet.resource_id.and_then(|r| r.video_id)?;
    Some(RawItem {
        external_id: video_id,
        title: snippet.title,
        body: snippet.description,
        published_at: snippet.published_at,
    })
}
