//! Database operations for `collection_jobs`.
//!
//! Transitions are guarded in the `WHERE` clause so a job can only move
//! forward through `pending -> running -> completed | failed`. The partial
//! unique index `collection_jobs_one_outstanding_per_channel` enforces at
//! most one pending or running job per channel.

use chrono::{DateTime, Utc};
use ftrack_core::{CollectionJob, ConfigSnapshot, JobCounts, JobStatus, JobType};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{unique_violation, DbError};

const OUTSTANDING_JOB_INDEX: &str = "collection_jobs_one_outstanding_per_channel";

const JOB_COLUMNS: &str = "id, public_id, channel_id, job_type, status, started_at, completed_at, \
     items_found, items_processed, items_filtered, items_failed, error_message, \
     config_snapshot, created_at";

/// A row from the `collection_jobs` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CollectionJobRow {
    pub id: i64,
    pub public_id: Uuid,
    pub channel_id: i64,
    pub job_type: String,
    pub status: String,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub items_found: i32,
    pub items_processed: i32,
    pub items_filtered: i32,
    pub items_failed: i32,
    pub error_message: Option<String>,
    pub config_snapshot: Option<Json<ConfigSnapshot>>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<CollectionJobRow> for CollectionJob {
    type Error = DbError;

    fn try_from(row: CollectionJobRow) -> Result<Self, Self::Error> {
        Ok(CollectionJob {
            id: row.id,
            channel_id: row.channel_id,
            job_type: row.job_type.parse::<JobType>()?,
            status: row.status.parse::<JobStatus>()?,
            started_at: row.started_at,
            completed_at: row.completed_at,
            counts: JobCounts {
                found: row.items_found,
                processed: row.items_processed,
                filtered: row.items_filtered,
                failed: row.items_failed,
            },
            error_message: row.error_message,
            config_snapshot: row.config_snapshot.map(|Json(snapshot)| snapshot),
            created_at: row.created_at,
        })
    }
}

/// Creates a new job in `pending` status for `channel_id`.
///
/// # Errors
///
/// Returns [`DbError::JobInFlight`] if the channel already has a pending or
/// running job, or [`DbError::Sqlx`] if the insert fails.
pub async fn create_pending_job(
    pool: &PgPool,
    channel_id: i64,
    job_type: JobType,
) -> Result<CollectionJobRow, DbError> {
    let public_id = Uuid::new_v4();

    let result = sqlx::query_as::<_, CollectionJobRow>(&format!(
        "INSERT INTO collection_jobs (public_id, channel_id, job_type, status) \
         VALUES ($1, $2, $3, 'pending') \
         RETURNING {JOB_COLUMNS}"
    ))
    .bind(public_id)
    .bind(channel_id)
    .bind(job_type.as_str())
    .fetch_one(pool)
    .await;

    match result {
        Ok(row) => Ok(row),
        Err(err) if unique_violation(&err) == Some(OUTSTANDING_JOB_INDEX) => {
            Err(DbError::JobInFlight { channel_id })
        }
        Err(err) => Err(err.into()),
    }
}

/// Marks a job `running`, sets `started_at = NOW()` and stores the
/// configuration snapshot taken at start.
///
/// # Errors
///
/// Returns [`DbError::InvalidJobTransition`] if the job is not `pending`.
pub async fn start_job(pool: &PgPool, id: i64, snapshot: &ConfigSnapshot) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE collection_jobs \
         SET status = 'running', started_at = NOW(), config_snapshot = $2 \
         WHERE id = $1 AND status = 'pending'",
    )
    .bind(id)
    .bind(Json(snapshot))
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidJobTransition {
            id,
            expected_status: "pending",
        });
    }

    Ok(())
}

/// Marks a running job `completed` with its final counters.
///
/// # Errors
///
/// Returns [`DbError::InvalidJobTransition`] if the job is not `running`.
pub async fn complete_job(pool: &PgPool, id: i64, counts: &JobCounts) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE collection_jobs \
         SET status = 'completed', completed_at = NOW(), \
             items_found = $2, items_processed = $3, items_filtered = $4, items_failed = $5 \
         WHERE id = $1 AND status = 'running'",
    )
    .bind(id)
    .bind(counts.found)
    .bind(counts.processed)
    .bind(counts.filtered)
    .bind(counts.failed)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidJobTransition {
            id,
            expected_status: "running",
        });
    }

    Ok(())
}

/// Marks a pending or running job `failed`, keeping whatever counters were
/// accumulated before the failure.
///
/// # Errors
///
/// Returns [`DbError::InvalidJobTransition`] if the job is already terminal.
pub async fn fail_job(
    pool: &PgPool,
    id: i64,
    counts: &JobCounts,
    error_message: &str,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE collection_jobs \
         SET status = 'failed', completed_at = NOW(), error_message = $2, \
             items_found = $3, items_processed = $4, items_filtered = $5, items_failed = $6 \
         WHERE id = $1 AND status IN ('pending', 'running')",
    )
    .bind(id)
    .bind(error_message)
    .bind(counts.found)
    .bind(counts.processed)
    .bind(counts.filtered)
    .bind(counts.failed)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidJobTransition {
            id,
            expected_status: "pending or running",
        });
    }

    Ok(())
}

/// Fails every outstanding job created before `cutoff`. Returns how many
/// jobs were reaped.
///
/// Jobs left behind by a crashed process would otherwise hold the
/// one-outstanding-job slot for their channel forever.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn fail_stale_jobs(pool: &PgPool, cutoff: DateTime<Utc>) -> Result<u64, DbError> {
    let result = sqlx::query(
        "UPDATE collection_jobs \
         SET status = 'failed', completed_at = NOW(), \
             error_message = 'abandoned: job exceeded the stale-job timeout' \
         WHERE status IN ('pending', 'running') AND created_at < $1",
    )
    .bind(cutoff)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// Fetches a single job by id.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no job has that id.
pub async fn get_job(pool: &PgPool, id: i64) -> Result<CollectionJobRow, DbError> {
    sqlx::query_as::<_, CollectionJobRow>(&format!(
        "SELECT {JOB_COLUMNS} FROM collection_jobs WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)
}

/// Lists the most recent jobs across all channels, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_jobs(pool: &PgPool, limit: i64) -> Result<Vec<CollectionJobRow>, DbError> {
    let rows = sqlx::query_as::<_, CollectionJobRow>(&format!(
        "SELECT {JOB_COLUMNS} FROM collection_jobs ORDER BY created_at DESC, id DESC LIMIT $1"
    ))
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Lists the most recent jobs for one channel, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_channel_jobs(
    pool: &PgPool,
    channel_id: i64,
    limit: i64,
) -> Result<Vec<CollectionJobRow>, DbError> {
    let rows = sqlx::query_as::<_, CollectionJobRow>(&format!(
        "SELECT {JOB_COLUMNS} FROM collection_jobs \
         WHERE channel_id = $1 \
         ORDER BY created_at DESC, id DESC LIMIT $2"
    ))
    .bind(channel_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
