//! Background job scheduler.
//!
//! Registers the periodic collection batch on a [`JobScheduler`]. Batches
//! that would overlap a running one return immediately inside the collector.

use std::sync::Arc;

use ftrack_collector::{BatchStatus, Collector};
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};
use tokio_util::sync::CancellationToken;

/// Builds and starts the background job scheduler.
///
/// The returned handle must be kept alive for the lifetime of the process.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if `cron` is not a valid schedule or the
/// scheduler cannot be started.
pub async fn build_scheduler(
    collector: Arc<Collector>,
    cron: &str,
    cancel: CancellationToken,
) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;
    scheduler.add(collection_job(collector, cron, cancel)?).await?;
    scheduler.start().await?;
    tracing::info!(cron, "scheduler: collection batch registered");
    Ok(scheduler)
}

fn collection_job(
    collector: Arc<Collector>,
    cron: &str,
    cancel: CancellationToken,
) -> Result<Job, JobSchedulerError> {
    Job::new_async(cron, move |_uuid, _lock| {
        let collector = Arc::clone(&collector);
        let cancel = cancel.clone();

        Box::pin(async move {
            if cancel.is_cancelled() {
                return;
            }
            let report = collector.run_scheduled_batch(&cancel).await;
            match report.status {
                BatchStatus::AlreadyRunning => {
                    tracing::info!("scheduler: previous collection batch still running");
                }
                BatchStatus::Aborted { ref error } => {
                    tracing::error!(error = %error, "scheduler: collection batch aborted");
                }
                BatchStatus::Finished | BatchStatus::Cancelled => tracing::info!(
                    due = report.due,
                    completed = report.completed(),
                    failed = report.failed(),
                    skipped = report.skipped(),
                    "scheduler: collection batch done"
                ),
            }
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::offline_collector;

    #[tokio::test]
    async fn invalid_cron_expression_is_rejected() {
        let result = collection_job(offline_collector(), "every now and then", CancellationToken::new());
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn default_schedule_parses() {
        let result = collection_job(offline_collector(), "0 */15 * * * *", CancellationToken::new());
        assert!(result.is_ok());
    }
}
