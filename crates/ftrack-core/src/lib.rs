//! Shared domain types and configuration for the forecaster channel
//! collection system.

pub mod app_config;
pub mod channel_url;
pub mod channels_file;
pub mod config;
pub mod jobs;
pub mod keywords;
pub mod types;

pub use app_config::{AppConfig, Environment};
pub use channel_url::{parse_channel_url, ParsedChannelUrl};
pub use config::{load_app_config, load_app_config_from_env};
pub use jobs::{CollectionJob, ConfigSnapshot, JobCounts, JobStatus, JobType};
pub use types::{Channel, CollectionSettings, DedupKey, Platform, RawItem};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read channels file {path}: {source}")]
    ChannelsFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse channels file: {0}")]
    ChannelsFileParse(#[from] serde_yaml::Error),

    #[error("channels file validation failed: {0}")]
    Validation(String),
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("unknown platform: {0}")]
    UnknownPlatform(String),

    #[error("unknown job status: {0}")]
    UnknownJobStatus(String),

    #[error("unknown job type: {0}")]
    UnknownJobType(String),

    #[error("unsupported channel URL \"{url}\": {reason}")]
    UnsupportedChannelUrl { url: String, reason: String },
}
