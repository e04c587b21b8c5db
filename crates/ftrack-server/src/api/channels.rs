//! Channel registration and on-demand collection.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use ftrack_collector::JobSummary;
use ftrack_core::{keywords::normalize_keyword, parse_channel_url, Platform};
use ftrack_db::{DbError, NewChannel};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::middleware::RequestId;

use super::{map_collect_error, map_db_error, ApiError, ApiResponse, AppState, ResponseMeta};

const DEFAULT_CHECK_INTERVAL_SECS: i64 = 3600;

#[derive(Debug, Deserialize)]
pub(super) struct RegisterChannelRequest {
    pub forecaster_slug: String,
    pub url: String,
    pub display_name: Option<String>,
    #[serde(default)]
    pub primary: bool,
    pub check_interval_secs: Option<i64>,
    #[serde(default)]
    pub keywords: Vec<String>,
}

#[derive(Debug, Serialize)]
pub(super) struct RegisteredChannel {
    channel_id: i64,
    public_id: Uuid,
    forecaster_slug: String,
    platform: Platform,
    external_id: String,
    display_name: String,
    url: Option<String>,
    is_primary: bool,
    check_interval_secs: i64,
    keywords: Vec<String>,
    /// Whether an immediate background collection was queued.
    collection_started: bool,
}

/// Request fields after validation, before any database access.
#[derive(Debug)]
struct ValidatedRegistration {
    platform: Platform,
    external_id: String,
    canonical_url: String,
    check_interval_secs: i64,
    keywords: Vec<String>,
}

fn validate(req_id: &str, body: &RegisterChannelRequest) -> Result<ValidatedRegistration, ApiError> {
    if body.forecaster_slug.trim().is_empty() {
        return Err(ApiError::new(
            req_id,
            "validation_error",
            "forecaster_slug must not be blank",
        ));
    }

    let parsed = parse_channel_url(&body.url)
        .map_err(|e| ApiError::new(req_id, "validation_error", e.to_string()))?;

    let check_interval_secs = body
        .check_interval_secs
        .unwrap_or(DEFAULT_CHECK_INTERVAL_SECS);
    if check_interval_secs <= 0 {
        return Err(ApiError::new(
            req_id,
            "validation_error",
            format!("check_interval_secs must be positive, got {check_interval_secs}"),
        ));
    }

    let keywords = body
        .keywords
        .iter()
        .map(|k| normalize_keyword(k))
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| ApiError::new(req_id, "validation_error", "keywords must not be blank"))?;

    Ok(ValidatedRegistration {
        platform: parsed.platform,
        external_id: parsed.external_id,
        canonical_url: parsed.canonical_url,
        check_interval_secs,
        keywords,
    })
}

pub(super) async fn register_channel(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<RegisterChannelRequest>,
) -> Result<(StatusCode, Json<ApiResponse<RegisteredChannel>>), ApiError> {
    let valid = validate(&req_id.0, &body)?;

    let forecaster = ftrack_db::get_forecaster_by_slug(&state.pool, body.forecaster_slug.trim())
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?
        .ok_or_else(|| ApiError::new(req_id.0.clone(), "not_found", "forecaster not found"))?;

    let display_name = body
        .display_name
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(&valid.external_id);

    // Non-primary channels always match on the forecaster's own name.
    let default_keyword = (!body.primary).then_some(forecaster.name.as_str());

    let (channel, keywords) = ftrack_db::register_channel(
        &state.pool,
        &NewChannel {
            forecaster_id: forecaster.id,
            platform: valid.platform,
            external_id: &valid.external_id,
            display_name,
            url: Some(&valid.canonical_url),
            is_primary: body.primary,
            check_interval_secs: valid.check_interval_secs,
            collection_enabled: true,
        },
        default_keyword,
        &valid.keywords,
    )
    .await
    .map_err(|e| match e {
        DbError::PrimaryChannelExists { .. } | DbError::ChannelExists { .. } => {
            ApiError::new(req_id.0.clone(), "conflict", e.to_string())
        }
        other => map_db_error(req_id.0.clone(), &other),
    })?;
    let keywords: Vec<String> = keywords.into_iter().map(|row| row.keyword).collect();

    let collection_started = forecaster.is_verified;
    if collection_started {
        state.collector.spawn_collect_now(channel.id);
    }

    tracing::info!(
        channel_id = channel.id,
        forecaster = %forecaster.slug,
        platform = %valid.platform,
        collection_started,
        "channel registered"
    );

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse {
            data: RegisteredChannel {
                channel_id: channel.id,
                public_id: channel.public_id,
                forecaster_slug: forecaster.slug,
                platform: valid.platform,
                external_id: channel.external_id,
                display_name: channel.display_name,
                url: channel.url,
                is_primary: channel.is_primary,
                check_interval_secs: channel.check_interval_secs,
                keywords,
                collection_started,
            },
            meta: ResponseMeta::new(req_id.0),
        }),
    ))
}

/// Collects one channel synchronously and returns the job summary.
pub(super) async fn collect_channel(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(channel_id): Path<i64>,
) -> Result<Json<ApiResponse<JobSummary>>, ApiError> {
    let summary = state
        .collector
        .collect_now(channel_id)
        .await
        .map_err(|e| map_collect_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: summary,
        meta: ResponseMeta::new(req_id.0),
    }))
}
