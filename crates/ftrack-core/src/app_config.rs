use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub channels_path: PathBuf,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub youtube_api_key: Option<String>,
    pub twitter_bearer_token: Option<String>,
    pub extractor_url: Option<String>,
    pub request_timeout_secs: u64,
    pub user_agent: String,
    pub primary_page_size: u32,
    pub secondary_page_size: u32,
    pub item_delay_ms: u64,
    pub channel_delay_ms: u64,
    pub batch_size: usize,
    pub stale_job_secs: u64,
    pub collect_cron: String,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("channels_path", &self.channels_path)
            .field("database_url", &"[redacted]")
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field(
                "youtube_api_key",
                &self.youtube_api_key.as_ref().map(|_| "[redacted]"),
            )
            .field(
                "twitter_bearer_token",
                &self.twitter_bearer_token.as_ref().map(|_| "[redacted]"),
            )
            .field("extractor_url", &self.extractor_url)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("user_agent", &self.user_agent)
            .field("primary_page_size", &self.primary_page_size)
            .field("secondary_page_size", &self.secondary_page_size)
            .field("item_delay_ms", &self.item_delay_ms)
            .field("channel_delay_ms", &self.channel_delay_ms)
            .field("batch_size", &self.batch_size)
            .field("stale_job_secs", &self.stale_job_secs)
            .field("collect_cron", &self.collect_cron)
            .finish()
    }
}
