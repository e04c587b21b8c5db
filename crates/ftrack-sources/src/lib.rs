//! Platform source clients: fetch a bounded page of recent items for a
//! channel and normalize them to [`RawItem`].

pub mod error;
mod http;
pub mod twitter;
pub mod youtube;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use ftrack_core::{AppConfig, Channel, Platform, RawItem};

pub use error::{SourceError, SourceErrorKind};
pub use twitter::TwitterClient;
pub use youtube::YouTubeClient;

/// Fetches recent items for one platform.
///
/// Every call resolves the channel's public identifier again, so a renamed
/// or deleted channel surfaces as [`SourceError::ChannelNotFound`]. A
/// successful empty result is not an error.
#[async_trait]
pub trait SourceClient: Send + Sync {
    fn platform(&self) -> Platform;

    async fn fetch_recent_items(&self, channel: &Channel) -> Result<Vec<RawItem>, SourceError>;
}

/// How many items to request per fetch. Primary channels are polled for a
/// short page, secondary channels for a longer one that the keyword filter
/// then narrows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageSizes {
    pub primary: u32,
    pub secondary: u32,
}

impl Default for PageSizes {
    fn default() -> Self {
        Self {
            primary: 10,
            secondary: 50,
        }
    }
}

impl PageSizes {
    #[must_use]
    pub fn for_channel(&self, channel: &Channel) -> u32 {
        if channel.is_primary {
            self.primary
        } else {
            self.secondary
        }
    }
}

/// Transport settings shared by every client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub timeout_secs: u64,
    pub user_agent: String,
    pub page_sizes: PageSizes,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            user_agent: "ftrack/0.1 (forecast-collector)".to_string(),
            page_sizes: PageSizes::default(),
        }
    }
}

impl ClientConfig {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            timeout_secs: config.request_timeout_secs,
            user_agent: config.user_agent.clone(),
            page_sizes: PageSizes {
                primary: config.primary_page_size,
                secondary: config.secondary_page_size,
            },
        }
    }
}

/// Source clients keyed by the platform they serve.
#[derive(Clone, Default)]
pub struct SourceRegistry {
    clients: HashMap<Platform, Arc<dyn SourceClient>>,
}

impl SourceRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a client, replacing any earlier client for the same platform.
    #[must_use]
    pub fn with_client(mut self, client: Arc<dyn SourceClient>) -> Self {
        self.clients.insert(client.platform(), client);
        self
    }

    #[must_use]
    pub fn get(&self, platform: Platform) -> Option<Arc<dyn SourceClient>> {
        self.clients.get(&platform).cloned()
    }

    /// Build both platform clients from application config. Missing
    /// credentials do not fail here; the client reports them per fetch.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Http`] if an HTTP client cannot be constructed.
    pub fn from_app_config(config: &AppConfig) -> Result<Self, SourceError> {
        let client_config = ClientConfig::from_app_config(config);
        let youtube = YouTubeClient::new(config.youtube_api_key.as_deref(), &client_config)?;
        let twitter = TwitterClient::new(config.twitter_bearer_token.as_deref(), &client_config)?;
        Ok(Self::new()
            .with_client(Arc::new(youtube))
            .with_client(Arc::new(twitter)))
    }
}

impl std::fmt::Debug for SourceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut platforms: Vec<&str> = self.clients.keys().map(|p| p.as_str()).collect();
        platforms.sort_unstable();
        f.debug_struct("SourceRegistry")
            .field("platforms", &platforms)
            .finish()
    }
}
