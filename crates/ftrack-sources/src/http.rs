//! Request plumbing shared by the platform clients.

use std::time::Duration;

use ftrack_core::Platform;
use reqwest::{header::RETRY_AFTER, Client, Response, StatusCode, Url};
use serde::de::DeserializeOwned;

use crate::error::SourceError;

const CONNECT_TIMEOUT_SECS: u64 = 10;

pub(crate) fn build_client(timeout_secs: u64, user_agent: &str) -> Result<Client, SourceError> {
    let client = Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .user_agent(user_agent)
        .build()?;
    Ok(client)
}

/// Ensure the base URL ends with exactly one slash so relative joins append
/// to its path instead of replacing the last segment.
pub(crate) fn parse_base_url(base_url: &str) -> Result<Url, SourceError> {
    let normalised = format!("{}/", base_url.trim_end_matches('/'));
    Url::parse(&normalised).map_err(|e| SourceError::InvalidBaseUrl(format!("{base_url}: {e}")))
}

pub(crate) fn join(base: &Url, path: &str) -> Result<Url, SourceError> {
    base.join(path)
        .map_err(|e| SourceError::InvalidBaseUrl(format!("{base}{path}: {e}")))
}

/// Map the response status onto [`SourceError`] and decode a 2xx body.
pub(crate) async fn read_json<T: DeserializeOwned>(
    response: Response,
    platform: Platform,
    context: &str,
) -> Result<T, SourceError> {
    let status = response.status();
    if !status.is_success() {
        return Err(classify_status(platform, status, &response, context));
    }

    let body = response.text().await?;
    serde_json::from_str(&body).map_err(|e| SourceError::Deserialize {
        context: format!("{platform} {context}"),
        source: e,
    })
}

fn classify_status(
    platform: Platform,
    status: StatusCode,
    response: &Response,
    context: &str,
) -> SourceError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => SourceError::Unauthorized {
            platform,
            status: status.as_u16(),
        },
        StatusCode::TOO_MANY_REQUESTS => SourceError::RateLimited {
            platform,
            retry_after_secs: response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok()),
        },
        StatusCode::NOT_FOUND => SourceError::NotFound {
            platform,
            context: context.to_string(),
        },
        other => SourceError::UnexpectedStatus {
            platform,
            status: other.as_u16(),
            context: context.to_string(),
        },
    }
}
