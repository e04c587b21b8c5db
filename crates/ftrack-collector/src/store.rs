//! Persistence seam for the collector: channel registry reads, the job
//! audit log, and the dedup ledger.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ftrack_core::{Channel, ConfigSnapshot, DedupKey, JobCounts, JobType};
use ftrack_db::DbError;
use sqlx::PgPool;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("channel {channel_id} already has a pending or running collection job")]
    JobInFlight { channel_id: i64 },
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid job transition: {0}")]
    InvalidTransition(String),
    #[error("storage backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl From<DbError> for StoreError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::JobInFlight { channel_id } => StoreError::JobInFlight { channel_id },
            DbError::NotFound => StoreError::NotFound("record".to_string()),
            DbError::InvalidJobTransition { .. } => StoreError::InvalidTransition(err.to_string()),
            other => StoreError::Backend(Box::new(other)),
        }
    }
}

#[async_trait]
pub trait CollectionStore: Send + Sync {
    /// Active, enabled channels of verified forecasters. Due filtering is
    /// left to the caller.
    async fn list_collectable_channels(&self) -> Result<Vec<Channel>, StoreError>;

    async fn get_channel(&self, channel_id: i64) -> Result<Option<Channel>, StoreError>;

    async fn active_keywords(&self, channel_id: i64) -> Result<Vec<String>, StoreError>;

    /// Atomically create a pending job, failing with
    /// [`StoreError::JobInFlight`] when one is already outstanding.
    async fn create_pending_job(
        &self,
        channel_id: i64,
        job_type: JobType,
    ) -> Result<i64, StoreError>;

    async fn start_job(&self, job_id: i64, snapshot: &ConfigSnapshot) -> Result<(), StoreError>;

    async fn complete_job(&self, job_id: i64, counts: &JobCounts) -> Result<(), StoreError>;

    async fn fail_job(
        &self,
        job_id: i64,
        counts: &JobCounts,
        error_message: &str,
    ) -> Result<(), StoreError>;

    /// Fail outstanding jobs created before `cutoff`; returns how many.
    async fn fail_stale_jobs(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError>;

    async fn is_collected(&self, key: &DedupKey) -> Result<bool, StoreError>;

    async fn record_collected(
        &self,
        key: &DedupKey,
        channel_id: i64,
        job_id: i64,
    ) -> Result<(), StoreError>;

    async fn touch_last_checked(
        &self,
        channel_id: i64,
        checked_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;
}

/// [`CollectionStore`] backed by Postgres through `ftrack-db`.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CollectionStore for PgStore {
    async fn list_collectable_channels(&self) -> Result<Vec<Channel>, StoreError> {
        let rows = ftrack_db::list_collectable_channels(&self.pool).await?;
        let mut channels = Vec::with_capacity(rows.len());
        for row in rows {
            let id = row.id;
            match Channel::try_from(row) {
                Ok(channel) => channels.push(channel),
                Err(e) => tracing::warn!(channel_id = id, error = %e, "skipping undecodable channel"),
            }
        }
        Ok(channels)
    }

    async fn get_channel(&self, channel_id: i64) -> Result<Option<Channel>, StoreError> {
        let row = ftrack_db::get_channel(&self.pool, channel_id).await?;
        Ok(row.map(Channel::try_from).transpose()?)
    }

    async fn active_keywords(&self, channel_id: i64) -> Result<Vec<String>, StoreError> {
        let rows = ftrack_db::list_active_keywords(&self.pool, channel_id).await?;
        Ok(rows.into_iter().map(|r| r.keyword).collect())
    }

    async fn create_pending_job(
        &self,
        channel_id: i64,
        job_type: JobType,
    ) -> Result<i64, StoreError> {
        let row = ftrack_db::create_pending_job(&self.pool, channel_id, job_type).await?;
        Ok(row.id)
    }

    async fn start_job(&self, job_id: i64, snapshot: &ConfigSnapshot) -> Result<(), StoreError> {
        ftrack_db::start_job(&self.pool, job_id, snapshot).await?;
        Ok(())
    }

    async fn complete_job(&self, job_id: i64, counts: &JobCounts) -> Result<(), StoreError> {
        ftrack_db::complete_job(&self.pool, job_id, counts).await?;
        Ok(())
    }

    async fn fail_job(
        &self,
        job_id: i64,
        counts: &JobCounts,
        error_message: &str,
    ) -> Result<(), StoreError> {
        ftrack_db::fail_job(&self.pool, job_id, counts, error_message).await?;
        Ok(())
    }

    async fn fail_stale_jobs(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        Ok(ftrack_db::fail_stale_jobs(&self.pool, cutoff).await?)
    }

    async fn is_collected(&self, key: &DedupKey) -> Result<bool, StoreError> {
        Ok(ftrack_db::is_item_collected(&self.pool, key).await?)
    }

    async fn record_collected(
        &self,
        key: &DedupKey,
        channel_id: i64,
        job_id: i64,
    ) -> Result<(), StoreError> {
        ftrack_db::record_collected_item(&self.pool, key, channel_id, job_id).await?;
        Ok(())
    }

    async fn touch_last_checked(
        &self,
        channel_id: i64,
        checked_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        ftrack_db::touch_channel_last_checked(&self.pool, channel_id, checked_at).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn db_errors_map_to_store_errors() {
        assert!(matches!(
            StoreError::from(DbError::JobInFlight { channel_id: 4 }),
            StoreError::JobInFlight { channel_id: 4 }
        ));
        assert!(matches!(
            StoreError::from(DbError::InvalidJobTransition {
                id: 1,
                expected_status: "running"
            }),
            StoreError::InvalidTransition(_)
        ));
        assert!(matches!(
            StoreError::from(DbError::Decode("bad".to_string())),
            StoreError::Backend(_)
        ));
    }
}
