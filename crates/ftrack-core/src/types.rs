use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::CoreError;

/// External platform a channel lives on.
///
/// `YouTube` is the video platform, `Twitter` the microblog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    YouTube,
    Twitter,
}

impl Platform {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Platform::YouTube => "youtube",
            Platform::Twitter => "twitter",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "youtube" | "video" => Ok(Platform::YouTube),
            "twitter" | "x" | "microblog" => Ok(Platform::Twitter),
            other => Err(CoreError::UnknownPlatform(other.to_string())),
        }
    }
}

/// Per-channel collection cadence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionSettings {
    pub check_interval_secs: i64,
    pub last_checked_at: Option<DateTime<Utc>>,
    pub enabled: bool,
}

impl CollectionSettings {
    /// Whether the channel's interval has elapsed at `now`.
    ///
    /// A channel that has never been checked is always due. Disabled
    /// settings are never due.
    #[must_use]
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        if !self.enabled {
            return false;
        }
        match self.last_checked_at {
            None => true,
            Some(last) => (now - last).num_seconds() >= self.check_interval_secs,
        }
    }

    /// Seconds past the due point at `now`; `None` when never checked.
    #[must_use]
    pub fn overdue_secs(&self, now: DateTime<Utc>) -> Option<i64> {
        self.last_checked_at
            .map(|last| (now - last).num_seconds() - self.check_interval_secs)
    }
}

/// One tracked source channel owned by a forecaster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub id: i64,
    pub forecaster_id: i64,
    pub forecaster_name: String,
    pub platform: Platform,
    pub external_id: String,
    pub display_name: String,
    pub url: Option<String>,
    pub is_primary: bool,
    pub is_active: bool,
    pub settings: CollectionSettings,
}

/// An item fetched from a platform, normalized across platforms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawItem {
    pub external_id: String,
    pub title: String,
    pub body: String,
    pub published_at: Option<DateTime<Utc>>,
}

impl RawItem {
    /// Title and body joined by a blank line, skipping whichever is empty.
    /// A title the body already starts with is not repeated.
    #[must_use]
    pub fn combined_text(&self) -> String {
        let title = self.title.trim();
        match (title.is_empty(), self.body.trim().is_empty()) {
            (false, false) if self.body.trim_start().starts_with(title) => self.body.clone(),
            (false, false) => format!("{}\n\n{}", self.title, self.body),
            (false, true) => self.title.clone(),
            (true, _) => self.body.clone(),
        }
    }
}

/// Exact-match key identifying an item that has already been collected.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey {
    pub platform: Platform,
    pub external_id: String,
    pub forecaster_id: i64,
}

impl DedupKey {
    #[must_use]
    pub fn for_item(channel: &Channel, item: &RawItem) -> Self {
        Self {
            platform: channel.platform,
            external_id: item.external_id.clone(),
            forecaster_id: channel.forecaster_id,
        }
    }
}
