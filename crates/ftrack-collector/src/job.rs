//! One collection job moving through `pending -> running -> completed | failed`.

use ftrack_core::{ConfigSnapshot, JobCounts, JobType};

use crate::store::{CollectionStore, StoreError};

/// A job that has been created in the store and not yet finished.
///
/// Counters accumulate in memory and are written when the job finishes, so a
/// failed job keeps whatever it had counted up to that point.
pub struct JobRun<'a> {
    store: &'a dyn CollectionStore,
    id: i64,
    channel_id: i64,
    counts: JobCounts,
}

impl<'a> JobRun<'a> {
    /// Create the job in `pending`. This is the per-channel guard: it fails
    /// with [`StoreError::JobInFlight`] while another job is outstanding.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the job cannot be created.
    pub async fn create(
        store: &'a dyn CollectionStore,
        channel_id: i64,
        job_type: JobType,
    ) -> Result<Self, StoreError> {
        let id = store.create_pending_job(channel_id, job_type).await?;
        Ok(Self {
            store,
            id,
            channel_id,
            counts: JobCounts::default(),
        })
    }

    /// Move to `running`, recording the configuration the job runs with.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the transition is rejected.
    pub async fn start(&self, snapshot: &ConfigSnapshot) -> Result<(), StoreError> {
        self.store.start_job(self.id, snapshot).await
    }

    #[must_use]
    pub fn id(&self) -> i64 {
        self.id
    }

    #[must_use]
    pub fn counts(&self) -> JobCounts {
        self.counts
    }

    pub fn record_found(&mut self, n: usize) {
        self.counts.found = self
            .counts
            .found
            .saturating_add(i32::try_from(n).unwrap_or(i32::MAX));
    }

    pub fn record_processed(&mut self) {
        self.counts.processed = self.counts.processed.saturating_add(1);
    }

    pub fn record_filtered(&mut self) {
        self.counts.filtered = self.counts.filtered.saturating_add(1);
    }

    pub fn record_failed(&mut self) {
        self.counts.failed = self.counts.failed.saturating_add(1);
    }

    /// Finish as `completed` with the accumulated counts. If that write fails
    /// the job is marked failed instead so it does not hold the channel.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the transition is rejected.
    pub async fn complete(self) -> Result<JobCounts, StoreError> {
        match self.store.complete_job(self.id, &self.counts).await {
            Ok(()) => Ok(self.counts),
            Err(err) => {
                self.fail(&format!("could not complete job: {err}")).await;
                Err(err)
            }
        }
    }

    /// Finish as `failed`. A failure to record the failure is logged rather
    /// than returned, so the caller can surface the original error.
    pub async fn fail(self, message: &str) -> JobCounts {
        if let Err(err) = self.store.fail_job(self.id, &self.counts, message).await {
            tracing::error!(
                job_id = self.id,
                channel_id = self.channel_id,
                error = %err,
                "failed to mark collection job as failed"
            );
        }
        self.counts
    }
}
