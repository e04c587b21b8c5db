//! Client for the prediction extraction service.
//!
//! Collection only hands item text over; persisting and scoring predictions
//! is the extraction service's job.

use std::time::Duration;

use async_trait::async_trait;
use ftrack_core::Platform;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("extraction request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("extraction service URL is invalid: {0}")]
    InvalidUrl(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Bullish,
    Bearish,
    Neutral,
}

/// One market call found in an item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub asset: String,
    pub direction: Direction,
    #[serde(default)]
    pub target_price: Option<f64>,
    #[serde(default)]
    pub timeframe: Option<String>,
}

#[async_trait]
pub trait PredictionExtractor: Send + Sync {
    async fn extract_predictions(
        &self,
        text: &str,
        platform: Platform,
        forecaster_id: i64,
    ) -> Result<Vec<Prediction>, ExtractError>;
}

#[derive(Serialize)]
struct ExtractRequest<'a> {
    text: &'a str,
    platform: Platform,
    forecaster_id: i64,
}

#[derive(Deserialize)]
struct ExtractResponse {
    #[serde(default)]
    predictions: Vec<Prediction>,
}

/// Extractor that POSTs item text to `{base}/extract`.
#[derive(Debug, Clone)]
pub struct HttpExtractor {
    client: Client,
    endpoint: String,
}

impl HttpExtractor {
    /// # Errors
    ///
    /// Returns [`ExtractError::InvalidUrl`] if `base_url` is not an http(s)
    /// URL, or [`ExtractError::Http`] if the client cannot be built.
    pub fn new(base_url: &str, timeout_secs: u64, user_agent: &str) -> Result<Self, ExtractError> {
        let trimmed = base_url.trim().trim_end_matches('/');
        if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
            return Err(ExtractError::InvalidUrl(base_url.to_string()));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(user_agent)
            .build()?;

        Ok(Self {
            client,
            endpoint: format!("{trimmed}/extract"),
        })
    }
}

#[async_trait]
impl PredictionExtractor for HttpExtractor {
    async fn extract_predictions(
        &self,
        text: &str,
        platform: Platform,
        forecaster_id: i64,
    ) -> Result<Vec<Prediction>, ExtractError> {
        let body = ExtractRequest {
            text,
            platform,
            forecaster_id,
        };
        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await?
            .error_for_status()?;
        let parsed: ExtractResponse = response.json().await?;
        Ok(parsed.predictions)
    }
}
