//! Collector facade: scheduled batches and on-demand collection.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use ftrack_core::AppConfig;
use ftrack_sources::{PageSizes, SourceRegistry};
use serde::Serialize;
use sqlx::PgPool;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::clock::{Clock, SystemClock};
use crate::error::{CollectError, SetupError};
use crate::executor::{Executor, JobSummary};
use crate::extract::{HttpExtractor, PredictionExtractor};
use crate::scheduler::find_due_channels;
use crate::store::{CollectionStore, PgStore};

/// Batch-level knobs.
#[derive(Debug, Clone, Copy)]
pub struct CollectorSettings {
    pub batch_size: usize,
    pub page_sizes: PageSizes,
    pub item_delay: Duration,
    pub channel_delay: Duration,
    pub stale_job_after: Duration,
}

impl Default for CollectorSettings {
    fn default() -> Self {
        Self {
            batch_size: 50,
            page_sizes: PageSizes::default(),
            item_delay: Duration::from_millis(1000),
            channel_delay: Duration::from_millis(2000),
            stale_job_after: Duration::from_secs(3600),
        }
    }
}

impl CollectorSettings {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            batch_size: config.batch_size,
            page_sizes: PageSizes {
                primary: config.primary_page_size,
                secondary: config.secondary_page_size,
            },
            item_delay: Duration::from_millis(config.item_delay_ms),
            channel_delay: Duration::from_millis(config.channel_delay_ms),
            stale_job_after: Duration::from_secs(config.stale_job_secs),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum BatchStatus {
    /// Every selected channel was attempted.
    Finished,
    /// Cancellation was requested; remaining channels were left for later.
    Cancelled,
    /// Another batch holds the lock; nothing was done.
    AlreadyRunning,
    /// The registry could not be read.
    Aborted { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum ChannelOutcome {
    Completed(JobSummary),
    /// The per-channel guard rejected the attempt.
    Skipped,
    Failed { job_id: Option<i64>, error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelReport {
    pub channel_id: i64,
    pub outcome: ChannelOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub status: BatchStatus,
    pub started_at: DateTime<Utc>,
    pub due: usize,
    pub reaped_jobs: u64,
    pub channels: Vec<ChannelReport>,
}

impl BatchReport {
    fn new(status: BatchStatus, started_at: DateTime<Utc>) -> Self {
        Self {
            status,
            started_at,
            due: 0,
            reaped_jobs: 0,
            channels: Vec::new(),
        }
    }

    #[must_use]
    pub fn completed(&self) -> usize {
        self.count(|o| matches!(o, ChannelOutcome::Completed(_)))
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, ChannelOutcome::Failed { .. }))
    }

    #[must_use]
    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, ChannelOutcome::Skipped))
    }

    fn count(&self, pred: impl Fn(&ChannelOutcome) -> bool) -> usize {
        self.channels.iter().filter(|c| pred(&c.outcome)).count()
    }
}

/// Runs collection jobs. Cheap to share behind an `Arc`.
pub struct Collector {
    executor: Executor,
    settings: CollectorSettings,
    batch_lock: Mutex<()>,
}

impl Collector {
    #[must_use]
    pub fn new(
        store: Arc<dyn CollectionStore>,
        sources: SourceRegistry,
        extractor: Arc<dyn PredictionExtractor>,
        clock: Arc<dyn Clock>,
        settings: CollectorSettings,
    ) -> Self {
        Self {
            executor: Executor::new(
                store,
                sources,
                extractor,
                clock,
                settings.page_sizes,
                settings.item_delay,
            ),
            settings,
            batch_lock: Mutex::new(()),
        }
    }

    /// Wire the Postgres store, both platform clients, and the HTTP
    /// extractor from application config.
    ///
    /// # Errors
    ///
    /// Returns [`SetupError`] if `FTRACK_EXTRACTOR_URL` is missing or a client
    /// cannot be built.
    pub fn from_app_config(pool: PgPool, config: &AppConfig) -> Result<Self, SetupError> {
        let extractor_url = config
            .extractor_url
            .as_deref()
            .ok_or(SetupError::MissingExtractorUrl)?;
        let extractor = HttpExtractor::new(
            extractor_url,
            config.request_timeout_secs,
            &config.user_agent,
        )?;
        let sources = SourceRegistry::from_app_config(config)?;

        Ok(Self::new(
            Arc::new(PgStore::new(pool)),
            sources,
            Arc::new(extractor),
            Arc::new(SystemClock),
            CollectorSettings::from_app_config(config),
        ))
    }

    /// Collect every due channel, one at a time.
    ///
    /// Never fails: per-channel errors are logged and reported. Returns
    /// [`BatchStatus::AlreadyRunning`] immediately if another batch is in
    /// progress. Cancellation is honored between channels; a channel already
    /// being collected finishes first.
    pub async fn run_scheduled_batch(&self, cancel: &CancellationToken) -> BatchReport {
        let started_at = self.executor.clock.now();

        let Ok(_guard) = self.batch_lock.try_lock() else {
            tracing::info!("collection batch already running, skipping");
            return BatchReport::new(BatchStatus::AlreadyRunning, started_at);
        };

        let mut report = BatchReport::new(BatchStatus::Finished, started_at);
        let store = self.executor.store.as_ref();

        if let Some(cutoff) = chrono::Duration::from_std(self.settings.stale_job_after)
            .ok()
            .and_then(|age| started_at.checked_sub_signed(age))
        {
            match store.fail_stale_jobs(cutoff).await {
                Ok(0) => {}
                Ok(n) => {
                    tracing::warn!(reaped = n, "failed stale collection jobs");
                    report.reaped_jobs = n;
                }
                Err(err) => tracing::error!(error = %err, "could not reap stale jobs"),
            }
        }

        let due = match find_due_channels(store, started_at, self.settings.batch_size).await {
            Ok(due) => due,
            Err(err) => {
                tracing::error!(error = %err, "could not load due channels");
                report.status = BatchStatus::Aborted {
                    error: err.to_string(),
                };
                return report;
            }
        };
        report.due = due.len();
        tracing::info!(due = due.len(), "collection batch started");

        for (index, channel) in due.iter().enumerate() {
            if cancel.is_cancelled() {
                report.status = BatchStatus::Cancelled;
                break;
            }

            if index > 0 && !self.settings.channel_delay.is_zero() {
                tokio::select! {
                    () = cancel.cancelled() => {
                        report.status = BatchStatus::Cancelled;
                        break;
                    }
                    () = tokio::time::sleep(self.settings.channel_delay) => {}
                }
            }

            let outcome = match self.executor.collect_channel(channel).await {
                Ok(summary) => ChannelOutcome::Completed(summary),
                Err(CollectError::JobInFlight { .. }) => ChannelOutcome::Skipped,
                Err(err) => {
                    tracing::error!(
                        channel_id = channel.id,
                        job_id = ?err.job_id(),
                        error = %err,
                        "channel collection failed"
                    );
                    ChannelOutcome::Failed {
                        job_id: err.job_id(),
                        error: err.to_string(),
                    }
                }
            };
            report.channels.push(ChannelReport {
                channel_id: channel.id,
                outcome,
            });
        }

        tracing::info!(
            status = ?report.status,
            completed = report.completed(),
            failed = report.failed(),
            skipped = report.skipped(),
            "collection batch finished"
        );
        report
    }

    /// Wait until no scheduled batch is running. Used on shutdown after the
    /// batch token has been cancelled.
    pub async fn wait_idle(&self) {
        drop(self.batch_lock.lock().await);
    }

    /// Collect one channel immediately, bypassing the due check.
    ///
    /// # Errors
    ///
    /// Returns [`CollectError::ChannelNotFound`] for unknown or inactive
    /// channels, and otherwise whatever the collection job failed with.
    pub async fn collect_now(&self, channel_id: i64) -> Result<JobSummary, CollectError> {
        let channel = self
            .executor
            .store
            .get_channel(channel_id)
            .await
            .map_err(|source| CollectError::Store {
                job_id: None,
                counts: ftrack_core::JobCounts::default(),
                source,
            })?
            .filter(|c| c.is_active)
            .ok_or(CollectError::ChannelNotFound(channel_id))?;

        self.executor.collect_channel(&channel).await
    }

    /// Run [`Collector::collect_now`] in the background, logging the outcome.
    pub fn spawn_collect_now(self: &Arc<Self>, channel_id: i64) -> JoinHandle<()> {
        let collector = Arc::clone(self);
        tokio::spawn(async move {
            match collector.collect_now(channel_id).await {
                Ok(summary) => tracing::info!(
                    channel_id,
                    job_id = summary.job_id,
                    processed = summary.counts.processed,
                    "background collection finished"
                ),
                Err(CollectError::JobInFlight { .. }) => {
                    tracing::info!(channel_id, "background collection skipped, job in flight");
                }
                Err(err) => tracing::error!(
                    channel_id,
                    error = %err,
                    "background collection failed"
                ),
            }
        })
    }
}

#[cfg(test)]
#[path = "collector_test.rs"]
mod tests;
