use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use ftrack_core::ConfigSnapshot;
use ftrack_db::CollectionJobRow;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::middleware::RequestId;

use super::{map_db_error, normalize_limit, ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Deserialize)]
pub(super) struct CollectionJobsQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub(super) struct CollectionJobItem {
    collection_job_id: Uuid,
    channel_id: i64,
    job_type: String,
    status: String,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    items_found: i32,
    items_processed: i32,
    items_filtered: i32,
    items_failed: i32,
    error_message: Option<String>,
    config_snapshot: Option<ConfigSnapshot>,
    created_at: DateTime<Utc>,
}

impl From<CollectionJobRow> for CollectionJobItem {
    fn from(row: CollectionJobRow) -> Self {
        Self {
            collection_job_id: row.public_id,
            channel_id: row.channel_id,
            job_type: row.job_type,
            status: row.status,
            started_at: row.started_at,
            completed_at: row.completed_at,
            items_found: row.items_found,
            items_processed: row.items_processed,
            items_filtered: row.items_filtered,
            items_failed: row.items_failed,
            error_message: row.error_message,
            config_snapshot: row.config_snapshot.map(|sqlx::types::Json(s)| s),
            created_at: row.created_at,
        }
    }
}

pub(super) async fn list_collection_jobs(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<CollectionJobsQuery>,
) -> Result<Json<ApiResponse<Vec<CollectionJobItem>>>, ApiError> {
    let rows = ftrack_db::list_jobs(&state.pool, normalize_limit(query.limit))
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: rows.into_iter().map(CollectionJobItem::from).collect(),
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn list_channel_jobs(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(channel_id): Path<i64>,
    Query(query): Query<CollectionJobsQuery>,
) -> Result<Json<ApiResponse<Vec<CollectionJobItem>>>, ApiError> {
    let channel = ftrack_db::get_channel(&state.pool, channel_id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    if channel.is_none() {
        return Err(ApiError::new(req_id.0, "not_found", "channel not found"));
    }

    let rows = ftrack_db::list_channel_jobs(&state.pool, channel_id, normalize_limit(query.limit))
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: rows.into_iter().map(CollectionJobItem::from).collect(),
        meta: ResponseMeta::new(req_id.0),
    }))
}
