use ftrack_core::Platform;
use thiserror::Error;

/// Errors returned by the platform source clients.
#[derive(Debug, Error)]
pub enum SourceError {
    /// No API credential is configured for the platform.
    #[error("{platform} credentials are not configured")]
    MissingCredentials { platform: Platform },

    /// The channel's public identifier does not resolve to anything.
    #[error("{platform} channel '{external_id}' was not found")]
    ChannelNotFound {
        platform: Platform,
        external_id: String,
    },

    /// The platform rejected the credential (HTTP 401 or 403).
    #[error("{platform} rejected the request credentials (HTTP {status})")]
    Unauthorized { platform: Platform, status: u16 },

    /// The platform throttled the request (HTTP 429).
    #[error("{platform} rate limit exceeded{}", retry_hint(*retry_after_secs))]
    RateLimited {
        platform: Platform,
        retry_after_secs: Option<u64>,
    },

    /// A listing endpoint returned 404.
    #[error("{platform} returned not found for {context}")]
    NotFound { platform: Platform, context: String },

    /// Any other non-2xx response.
    #[error("{platform} returned HTTP {status} for {context}")]
    UnexpectedStatus {
        platform: Platform,
        status: u16,
        context: String,
    },

    /// Network or TLS failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The response body could not be deserialized into the expected type.
    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid base URL '{0}'")]
    InvalidBaseUrl(String),
}

/// Coarse failure classes used to decide how a failed job is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceErrorKind {
    /// Fixing requires operator action (credentials, base URL).
    Configuration,
    /// The channel identifier no longer resolves.
    ChannelNotFound,
    /// Network, throttling, or upstream availability. The next scheduled
    /// interval is the retry.
    Transient,
    /// The platform answered with something we could not interpret.
    Protocol,
}

impl SourceError {
    #[must_use]
    pub fn kind(&self) -> SourceErrorKind {
        match self {
            Self::MissingCredentials { .. } | Self::Unauthorized { .. } | Self::InvalidBaseUrl(_) => {
                SourceErrorKind::Configuration
            }
            Self::ChannelNotFound { .. } | Self::NotFound { .. } => {
                SourceErrorKind::ChannelNotFound
            }
            Self::RateLimited { .. } | Self::Http(_) => SourceErrorKind::Transient,
            Self::UnexpectedStatus { status, .. } if *status >= 500 => SourceErrorKind::Transient,
            Self::UnexpectedStatus { .. } | Self::Deserialize { .. } => SourceErrorKind::Protocol,
        }
    }
}

fn retry_hint(retry_after_secs: Option<u64>) -> String {
    retry_after_secs.map_or_else(String::new, |secs| format!(" (retry after {secs}s)"))
}
