//! The `channels.yaml` seed file: forecasters and the channels tracked for
//! each of them.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::channel_url::parse_channel_url;
use crate::keywords::{keyword_key, normalize_keyword};
use crate::types::Platform;
use crate::ConfigError;

const DEFAULT_CHECK_INTERVAL_SECS: i64 = 3600;

fn default_interval() -> i64 {
    DEFAULT_CHECK_INTERVAL_SECS
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    pub url: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub primary: bool,
    #[serde(default = "default_interval")]
    pub check_interval_secs: i64,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecasterConfig {
    pub name: String,
    #[serde(default)]
    pub verified: bool,
    #[serde(default)]
    pub channels: Vec<ChannelConfig>,
}

impl ForecasterConfig {
    /// URL-safe slug derived from the forecaster name.
    #[must_use]
    pub fn slug(&self) -> String {
        slugify(&self.name)
    }
}

/// Lowercase, ASCII alphanumerics joined by single dashes.
#[must_use]
pub fn slugify(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
}

#[derive(Debug, Deserialize)]
pub struct ChannelsFile {
    pub forecasters: Vec<ForecasterConfig>,
}

/// Load and validate the channels seed file.
///
/// # Errors
///
/// Returns [`ConfigError`] if the file cannot be read, parsed, or fails
/// validation.
pub fn load_channels_file(path: &Path) -> Result<ChannelsFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ChannelsFileIo {
        path: path.display().to_string(),
        source: e,
    })?;
    parse_channels_file(&content)
}

/// Parse and validate channels YAML already in memory.
///
/// # Errors
///
/// Returns [`ConfigError`] on parse or validation failure.
pub fn parse_channels_file(content: &str) -> Result<ChannelsFile, ConfigError> {
    let file: ChannelsFile = serde_yaml::from_str(content)?;
    validate(&file)?;
    Ok(file)
}

fn validate(file: &ChannelsFile) -> Result<(), ConfigError> {
    let mut seen_slugs = HashSet::new();

    for forecaster in &file.forecasters {
        if forecaster.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "forecaster name must be non-empty".to_string(),
            ));
        }

        let slug = forecaster.slug();
        if slug.is_empty() || !seen_slugs.insert(slug.clone()) {
            return Err(ConfigError::Validation(format!(
                "duplicate or empty forecaster slug '{slug}' (from '{}')",
                forecaster.name
            )));
        }

        let mut primary_platforms: HashSet<Platform> = HashSet::new();
        let mut seen_channels = HashSet::new();

        for channel in &forecaster.channels {
            let parsed = parse_channel_url(&channel.url)
                .map_err(|e| ConfigError::Validation(format!("{}: {e}", forecaster.name)))?;

            if !seen_channels.insert((parsed.platform, parsed.external_id.to_lowercase())) {
                return Err(ConfigError::Validation(format!(
                    "{}: channel {} listed twice",
                    forecaster.name, channel.url
                )));
            }

            if channel.primary && !primary_platforms.insert(parsed.platform) {
                return Err(ConfigError::Validation(format!(
                    "{}: more than one primary {} channel",
                    forecaster.name, parsed.platform
                )));
            }

            if channel.check_interval_secs <= 0 {
                return Err(ConfigError::Validation(format!(
                    "{}: channel {} has non-positive check_interval_secs {}",
                    forecaster.name, channel.url, channel.check_interval_secs
                )));
            }

            let mut seen_keywords = HashSet::new();
            for keyword in &channel.keywords {
                if normalize_keyword(keyword).is_none() {
                    return Err(ConfigError::Validation(format!(
                        "{}: channel {} has a blank keyword",
                        forecaster.name, channel.url
                    )));
                }
                if !seen_keywords.insert(keyword_key(keyword)) {
                    return Err(ConfigError::Validation(format!(
                        "{}: channel {} repeats keyword '{}'",
                        forecaster.name,
                        channel.url,
                        keyword.trim()
                    )));
                }
            }
        }
    }

    Ok(())
}
