//! Collection job lifecycle types.
//!
//! A job moves `pending -> running -> {completed, failed}` and is never
//! touched again once terminal. At most one outstanding (pending or running)
//! job may exist per channel.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    /// First collection of a channel that has never been checked.
    FullScan,
    /// Keyword-gated collection of a non-primary channel.
    KeywordScan,
    Incremental,
}

impl JobType {
    /// Pick the job type for a collection attempt.
    #[must_use]
    pub fn for_attempt(never_checked: bool, is_primary: bool, keyword_count: usize) -> Self {
        if never_checked {
            JobType::FullScan
        } else if !is_primary && keyword_count > 0 {
            JobType::KeywordScan
        } else {
            JobType::Incremental
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            JobType::FullScan => "full_scan",
            JobType::KeywordScan => "keyword_scan",
            JobType::Incremental => "incremental",
        }
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "full_scan" => Ok(JobType::FullScan),
            "keyword_scan" => Ok(JobType::KeywordScan),
            "incremental" => Ok(JobType::Incremental),
            other => Err(CoreError::UnknownJobType(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    /// Pending or running; blocks a new job for the same channel.
    #[must_use]
    pub fn is_outstanding(self) -> bool {
        matches!(self, JobStatus::Pending | JobStatus::Running)
    }

    /// Legal edges of the job state machine.
    ///
    /// `pending -> failed` is allowed so a job abandoned before it started
    /// (or reaped as stale) can be closed out.
    #[must_use]
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Running | JobStatus::Failed)
                | (JobStatus::Running, JobStatus::Completed | JobStatus::Failed)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "running" => Ok(JobStatus::Running),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            other => Err(CoreError::UnknownJobStatus(other.to_string())),
        }
    }
}

/// Channel configuration captured when a job starts running, so later audits
/// do not depend on mutable channel state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigSnapshot {
    pub is_primary: bool,
    pub keywords: Vec<String>,
    pub page_size: Option<u32>,
}

/// Running tallies for one job.
///
/// `found` is every fetched item; `processed` counts items handed to the
/// extraction service successfully; `filtered` counts duplicates and keyword
/// misses; `failed` counts items whose extraction errored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobCounts {
    pub found: i32,
    pub processed: i32,
    pub filtered: i32,
    pub failed: i32,
}

/// A persisted collection job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionJob {
    pub id: i64,
    pub channel_id: i64,
    pub job_type: JobType,
    pub status: JobStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub counts: JobCounts,
    pub error_message: Option<String>,
    pub config_snapshot: Option<ConfigSnapshot>,
    pub created_at: DateTime<Utc>,
}
