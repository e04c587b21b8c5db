use ftrack_core::{JobCounts, Platform};
use ftrack_sources::SourceError;
use thiserror::Error;

use crate::extract::ExtractError;
use crate::store::StoreError;

/// Why a single channel collection did not complete.
#[derive(Debug, Error)]
pub enum CollectError {
    /// Another pending or running job owns the channel. Nothing was written.
    #[error("channel {channel_id} already has a collection job in flight")]
    JobInFlight { channel_id: i64 },

    #[error("channel {0} does not exist or is inactive")]
    ChannelNotFound(i64),

    #[error("no source client is configured for {platform} (job {job_id})")]
    UnsupportedPlatform { job_id: i64, platform: Platform },

    /// The source client failed; the job was marked failed.
    #[error("fetch failed for job {job_id}: {source}")]
    Fetch {
        job_id: i64,
        counts: JobCounts,
        #[source]
        source: SourceError,
    },

    /// Registry or job-log access failed.
    #[error("storage error{}: {source}", job_hint(*job_id))]
    Store {
        job_id: Option<i64>,
        counts: JobCounts,
        #[source]
        source: StoreError,
    },
}

impl CollectError {
    /// The job that recorded this failure, if one was created.
    #[must_use]
    pub fn job_id(&self) -> Option<i64> {
        match self {
            Self::UnsupportedPlatform { job_id, .. } | Self::Fetch { job_id, .. } => Some(*job_id),
            Self::Store { job_id, .. } => *job_id,
            Self::JobInFlight { .. } | Self::ChannelNotFound(_) => None,
        }
    }
}

fn job_hint(job_id: Option<i64>) -> String {
    job_id.map_or_else(String::new, |id| format!(" in job {id}"))
}

/// Failure to assemble a [`crate::Collector`] from configuration.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("FTRACK_EXTRACTOR_URL is not set")]
    MissingExtractorUrl,
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Extract(#[from] ExtractError),
}
