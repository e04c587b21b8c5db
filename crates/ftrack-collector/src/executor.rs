//! Per-channel collection: guard, fetch, dedup, keyword filter, extraction.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use ftrack_core::keywords::matches as matches_keywords;
use ftrack_core::{Channel, ConfigSnapshot, DedupKey, JobCounts, JobType, RawItem};
use ftrack_sources::{PageSizes, SourceRegistry};
use serde::Serialize;

use crate::clock::Clock;
use crate::dedup::is_duplicate;
use crate::error::CollectError;
use crate::extract::PredictionExtractor;
use crate::job::JobRun;
use crate::store::{CollectionStore, StoreError};

/// Result of a completed collection job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobSummary {
    pub job_id: i64,
    pub channel_id: i64,
    pub job_type: JobType,
    pub counts: JobCounts,
    pub attempted_at: DateTime<Utc>,
}

pub struct Executor {
    pub(crate) store: Arc<dyn CollectionStore>,
    sources: SourceRegistry,
    extractor: Arc<dyn PredictionExtractor>,
    pub(crate) clock: Arc<dyn Clock>,
    page_sizes: PageSizes,
    item_delay: Duration,
}

enum ItemOutcome {
    Filtered,
    Processed,
    Failed,
}

impl Executor {
    #[must_use]
    pub fn new(
        store: Arc<dyn CollectionStore>,
        sources: SourceRegistry,
        extractor: Arc<dyn PredictionExtractor>,
        clock: Arc<dyn Clock>,
        page_sizes: PageSizes,
        item_delay: Duration,
    ) -> Self {
        Self {
            store,
            sources,
            extractor,
            clock,
            page_sizes,
            item_delay,
        }
    }

    /// Run one collection job for `channel`.
    ///
    /// The channel's `last_checked_at` is set to the attempt start time for
    /// every outcome except a guard rejection, which writes nothing.
    ///
    /// # Errors
    ///
    /// Returns [`CollectError`] when the guard rejects the attempt or the job
    /// fails. Per-item extraction errors do not fail the job.
    pub async fn collect_channel(&self, channel: &Channel) -> Result<JobSummary, CollectError> {
        let attempted_at = self.clock.now();
        let result = self.run_job(channel, attempted_at).await;

        if !matches!(result, Err(CollectError::JobInFlight { .. })) {
            if let Err(err) = self
                .store
                .touch_last_checked(channel.id, attempted_at)
                .await
            {
                tracing::error!(
                    channel_id = channel.id,
                    error = %err,
                    "failed to record last_checked_at"
                );
            }
        }

        result
    }

    async fn run_job(
        &self,
        channel: &Channel,
        attempted_at: DateTime<Utc>,
    ) -> Result<JobSummary, CollectError> {
        let store = self.store.as_ref();
        let store_err = |job_id: Option<i64>, counts: JobCounts| {
            move |source: StoreError| CollectError::Store {
                job_id,
                counts,
                source,
            }
        };

        let keywords = store
            .active_keywords(channel.id)
            .await
            .map_err(store_err(None, JobCounts::default()))?;

        let job_type = JobType::for_attempt(
            channel.settings.last_checked_at.is_none(),
            channel.is_primary,
            keywords.len(),
        );

        let mut run = match JobRun::create(store, channel.id, job_type).await {
            Ok(run) => run,
            Err(StoreError::JobInFlight { channel_id }) => {
                tracing::info!(channel_id, "collection already in flight, skipping");
                return Err(CollectError::JobInFlight { channel_id });
            }
            Err(err) => return Err(store_err(None, JobCounts::default())(err)),
        };

        let snapshot = ConfigSnapshot {
            is_primary: channel.is_primary,
            keywords: keywords.clone(),
            page_size: Some(self.page_sizes.for_channel(channel)),
        };
        if let Err(err) = run.start(&snapshot).await {
            let job_id = run.id();
            let counts = run.fail(&format!("could not start job: {err}")).await;
            return Err(store_err(Some(job_id), counts)(err));
        }

        tracing::info!(
            job_id = run.id(),
            channel_id = channel.id,
            platform = %channel.platform,
            job_type = %job_type,
            "collection job started"
        );

        let Some(source) = self.sources.get(channel.platform) else {
            let job_id = run.id();
            run.fail(&format!("no source client configured for {}", channel.platform))
                .await;
            return Err(CollectError::UnsupportedPlatform {
                job_id,
                platform: channel.platform,
            });
        };

        let items = match source.fetch_recent_items(channel).await {
            Ok(items) => items,
            Err(err) => {
                tracing::warn!(
                    job_id = run.id(),
                    channel_id = channel.id,
                    kind = ?err.kind(),
                    error = %err,
                    "fetch failed"
                );
                let job_id = run.id();
                let counts = run.fail(&err.to_string()).await;
                return Err(CollectError::Fetch {
                    job_id,
                    counts,
                    source: err,
                });
            }
        };

        run.record_found(items.len());

        for item in &items {
            match self.process_item(&run, channel, &keywords, item).await {
                Ok(ItemOutcome::Filtered) => run.record_filtered(),
                Ok(ItemOutcome::Processed) => run.record_processed(),
                Ok(ItemOutcome::Failed) => run.record_failed(),
                Err(err) => {
                    let job_id = run.id();
                    let counts = run.fail(&format!("storage error: {err}")).await;
                    return Err(store_err(Some(job_id), counts)(err));
                }
            }
        }

        let job_id = run.id();
        let fallback_counts = run.counts();
        let counts = run
            .complete()
            .await
            .map_err(store_err(Some(job_id), fallback_counts))?;

        tracing::info!(
            job_id,
            channel_id = channel.id,
            found = counts.found,
            processed = counts.processed,
            filtered = counts.filtered,
            failed = counts.failed,
            "collection job completed"
        );

        Ok(JobSummary {
            job_id,
            channel_id: channel.id,
            job_type,
            counts,
            attempted_at,
        })
    }

    async fn process_item(
        &self,
        run: &JobRun<'_>,
        channel: &Channel,
        keywords: &[String],
        item: &RawItem,
    ) -> Result<ItemOutcome, StoreError> {
        if is_duplicate(self.store.as_ref(), channel, item).await? {
            return Ok(ItemOutcome::Filtered);
        }

        if !channel.is_primary && !matches_keywords(item, keywords) {
            tracing::debug!(
                channel_id = channel.id,
                item = %item.external_id,
                "item does not match channel keywords"
            );
            return Ok(ItemOutcome::Filtered);
        }

        let extracted = self
            .extractor
            .extract_predictions(
                &item.combined_text(),
                channel.platform,
                channel.forecaster_id,
            )
            .await;

        let outcome = match extracted {
            Ok(predictions) => {
                self.store
                    .record_collected(&DedupKey::for_item(channel, item), channel.id, run.id())
                    .await?;
                tracing::debug!(
                    job_id = run.id(),
                    item = %item.external_id,
                    predictions = predictions.len(),
                    "item extracted"
                );
                ItemOutcome::Processed
            }
            Err(err) => {
                tracing::warn!(
                    job_id = run.id(),
                    item = %item.external_id,
                    error = %err,
                    "extraction failed, item will be retried next run"
                );
                ItemOutcome::Failed
            }
        };

        if !self.item_delay.is_zero() {
            tokio::time::sleep(self.item_delay).await;
        }

        Ok(outcome)
    }
}
