//! Parse public channel URLs into a platform and external identifier.
//!
//! YouTube identifiers keep the form the API needs to resolve them:
//! `UC…` channel ids as-is, handles with their leading `@`, and legacy
//! `/user/` names bare. Custom `/c/` names have no API lookup and are
//! rejected. Twitter/X identifiers are the handle without `@`.

use std::sync::LazyLock;

use regex::Regex;

use crate::types::Platform;
use crate::CoreError;

static YOUTUBE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^https?://(?:www\.|m\.)?youtube\.com/(?:channel/(UC[\w-]{22})|@([\w.-]{3,30})|c/([\w.-]+)|user/([\w.-]+))/?(?:[/?#].*)?$",
    )
    .expect("valid regex")
});

static TWITTER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^https?://(?:www\.|mobile\.)?(?:twitter|x)\.com/(\w{1,15})/?(?:[/?#].*)?$")
        .expect("valid regex")
});

/// Top-level Twitter/X paths that are not user profiles.
const TWITTER_RESERVED: &[&str] = &[
    "home",
    "explore",
    "search",
    "i",
    "settings",
    "notifications",
    "messages",
    "intent",
    "share",
    "hashtag",
    "login",
    "signup",
    "tos",
    "privacy",
];

/// A channel URL resolved to its platform identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedChannelUrl {
    pub platform: Platform,
    pub external_id: String,
    pub canonical_url: String,
}

/// Parse a YouTube or Twitter/X channel URL.
///
/// A missing scheme is tolerated (`youtube.com/@name`).
///
/// # Errors
///
/// Returns [`CoreError::UnsupportedChannelUrl`] when the URL does not match a
/// known channel shape.
pub fn parse_channel_url(raw: &str) -> Result<ParsedChannelUrl, CoreError> {
    let trimmed = raw.trim();
    let url = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };

    if let Some(caps) = YOUTUBE_RE.captures(&url) {
        let (external_id, canonical_url) = if let Some(id) = caps.get(1) {
            let id = id.as_str().to_string();
            let canonical = format!("https://www.youtube.com/channel/{id}");
            (id, canonical)
        } else if let Some(handle) = caps.get(2) {
            let handle = format!("@{}", handle.as_str());
            let canonical = format!("https://www.youtube.com/{handle}");
            (handle, canonical)
        } else if caps.get(3).is_some() {
            return Err(unsupported(
                raw,
                "custom /c/ URLs cannot be resolved; use the /channel/UC... or /@handle URL",
            ));
        } else if let Some(name) = caps.get(4) {
            let name = name.as_str().to_string();
            let canonical = format!("https://www.youtube.com/user/{name}");
            (name, canonical)
        } else {
            return Err(unsupported(raw, "unrecognized YouTube channel path"));
        };

        return Ok(ParsedChannelUrl {
            platform: Platform::YouTube,
            external_id,
            canonical_url,
        });
    }

    if let Some(caps) = TWITTER_RE.captures(&url) {
        let handle = caps.get(1).map_or("", |m| m.as_str());
        if TWITTER_RESERVED.contains(&handle.to_ascii_lowercase().as_str()) {
            return Err(unsupported(raw, "path is not a user profile"));
        }
        return Ok(ParsedChannelUrl {
            platform: Platform::Twitter,
            external_id: handle.to_string(),
            canonical_url: format!("https://x.com/{handle}"),
        });
    }

    Err(unsupported(raw, "not a YouTube or Twitter/X channel URL"))
}

fn unsupported(url: &str, reason: &str) -> CoreError {
    CoreError::UnsupportedChannelUrl {
        url: url.to_string(),
        reason: reason.to_string(),
    }
}
