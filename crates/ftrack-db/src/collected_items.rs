//! Dedup ledger: which items have already been sent to extraction.

use ftrack_core::DedupKey;
use sqlx::PgPool;

use crate::DbError;

/// Whether an item with this key has already been collected.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn is_item_collected(pool: &PgPool, key: &DedupKey) -> Result<bool, DbError> {
    let exists = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS ( \
             SELECT 1 FROM collected_items \
             WHERE platform = $1 AND external_id = $2 AND forecaster_id = $3 \
         )",
    )
    .bind(key.platform.as_str())
    .bind(&key.external_id)
    .bind(key.forecaster_id)
    .fetch_one(pool)
    .await?;

    Ok(exists)
}

/// Records an item as collected. Returns `false` if it was already present.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn record_collected_item(
    pool: &PgPool,
    key: &DedupKey,
    channel_id: i64,
    job_id: i64,
) -> Result<bool, DbError> {
    let result = sqlx::query(
        "INSERT INTO collected_items (platform, external_id, forecaster_id, channel_id, job_id) \
         VALUES ($1, $2, $3, $4, $5) \
         ON CONFLICT (platform, external_id, forecaster_id) DO NOTHING",
    )
    .bind(key.platform.as_str())
    .bind(&key.external_id)
    .bind(key.forecaster_id)
    .bind(channel_id)
    .bind(job_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}
