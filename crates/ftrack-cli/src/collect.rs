//! `collect` sub-commands: run the due batch or one channel on demand.

use clap::Subcommand;
use ftrack_collector::{BatchReport, BatchStatus, ChannelOutcome, Collector, JobSummary};
use tokio_util::sync::CancellationToken;

/// Sub-commands available under `collect`.
#[derive(Debug, Subcommand)]
pub enum CollectCommands {
    /// Collect every due channel once; Ctrl-C stops before the next channel
    Due {
        /// Print the batch report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Collect one channel now, ignoring its schedule
    Channel {
        channel_id: i64,
        /// Print the job summary as JSON
        #[arg(long)]
        json: bool,
    },
}

pub(crate) async fn run(
    pool: sqlx::PgPool,
    config: &ftrack_core::AppConfig,
    command: CollectCommands,
) -> anyhow::Result<()> {
    let collector = Collector::from_app_config(pool, config)?;
    match command {
        CollectCommands::Due { json } => run_collect_due(&collector, json).await,
        CollectCommands::Channel { channel_id, json } => {
            let summary = collector.collect_now(channel_id).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!("{}", summary_line(&summary));
            }
            Ok(())
        }
    }
}

async fn run_collect_due(collector: &Collector, json: bool) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    let listener = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received; stopping after the current channel");
            on_ctrl_c.cancel();
        }
    });

    let report = collector.run_scheduled_batch(&cancel).await;
    listener.abort();

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for line in report_lines(&report) {
            println!("{line}");
        }
    }

    if let BatchStatus::Aborted { error } = &report.status {
        anyhow::bail!("collection batch aborted: {error}");
    }
    Ok(())
}

pub(crate) fn summary_line(summary: &JobSummary) -> String {
    format!(
        "job {} ({}) on channel {}: found {}, processed {}, filtered {}, failed {}",
        summary.job_id,
        summary.job_type,
        summary.channel_id,
        summary.counts.found,
        summary.counts.processed,
        summary.counts.filtered,
        summary.counts.failed
    )
}

pub(crate) fn report_lines(report: &BatchReport) -> Vec<String> {
    let mut lines = Vec::with_capacity(report.channels.len() + 2);
    if report.status == BatchStatus::AlreadyRunning {
        lines.push("another collection batch is already running; nothing done".to_string());
        return lines;
    }
    if report.reaped_jobs > 0 {
        lines.push(format!("failed {} abandoned job(s)", report.reaped_jobs));
    }
    for entry in &report.channels {
        lines.push(match &entry.outcome {
            ChannelOutcome::Completed(summary) => summary_line(summary),
            ChannelOutcome::Skipped => {
                format!("channel {}: skipped, a job is already in flight", entry.channel_id)
            }
            ChannelOutcome::Failed { job_id, error } => match job_id {
                Some(id) => format!("channel {}: job {id} failed: {error}", entry.channel_id),
                None => format!("channel {}: failed: {error}", entry.channel_id),
            },
        });
    }
    let status = match report.status {
        BatchStatus::Cancelled => "cancelled",
        BatchStatus::Aborted { .. } => "aborted",
        BatchStatus::Finished | BatchStatus::AlreadyRunning => "finished",
    };
    lines.push(format!(
        "batch {status}: {} due, {} completed, {} failed, {} skipped",
        report.due,
        report.completed(),
        report.failed(),
        report.skipped()
    ));
    lines
}
