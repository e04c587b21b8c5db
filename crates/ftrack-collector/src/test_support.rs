//! In-memory collaborators for engine tests.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use ftrack_core::{
    Channel, CollectionSettings, ConfigSnapshot, DedupKey, JobCounts, JobStatus, JobType,
    Platform, RawItem,
};
use ftrack_sources::{SourceClient, SourceError};

use crate::clock::Clock;
use crate::extract::{Direction, ExtractError, Prediction, PredictionExtractor};
use crate::store::{CollectionStore, StoreError};

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
}

pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Arc<Self> {
        Arc::new(Self {
            now: Mutex::new(now),
        })
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

pub fn channel(id: i64, platform: Platform, is_primary: bool) -> Channel {
    Channel {
        id,
        forecaster_id: 100 + id,
        forecaster_name: format!("Forecaster {id}"),
        platform,
        external_id: format!("ext-{id}"),
        display_name: format!("Channel {id}"),
        url: None,
        is_primary,
        is_active: true,
        settings: CollectionSettings {
            check_interval_secs: 3600,
            last_checked_at: None,
            enabled: true,
        },
    }
}

pub fn item(id: &str, title: &str) -> RawItem {
    RawItem {
        external_id: id.to_string(),
        title: title.to_string(),
        body: String::new(),
        published_at: None,
    }
}

#[derive(Debug, Clone)]
pub struct StoredJob {
    pub id: i64,
    pub channel_id: i64,
    pub job_type: JobType,
    pub status: JobStatus,
    pub counts: JobCounts,
    pub error_message: Option<String>,
    pub snapshot: Option<ConfigSnapshot>,
    pub created_at: DateTime<Utc>,
}

#[derive(Default)]
struct State {
    channels: BTreeMap<i64, Channel>,
    keywords: HashMap<i64, Vec<String>>,
    jobs: Vec<StoredJob>,
    collected: HashSet<DedupKey>,
}

pub struct MemoryStore {
    clock: Arc<FixedClock>,
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new(clock: Arc<FixedClock>) -> Arc<Self> {
        Arc::new(Self {
            clock,
            state: Mutex::new(State::default()),
        })
    }

    pub fn add_channel(&self, channel: Channel) {
        self.state
            .lock()
            .unwrap()
            .channels
            .insert(channel.id, channel);
    }

    pub fn set_keywords(&self, channel_id: i64, keywords: &[&str]) {
        self.state.lock().unwrap().keywords.insert(
            channel_id,
            keywords.iter().map(|k| (*k).to_string()).collect(),
        );
    }

    /// Insert a job directly, bypassing the guard.
    pub fn insert_job(&self, channel_id: i64, status: JobStatus, created_at: DateTime<Utc>) -> i64 {
        let mut state = self.state.lock().unwrap();
        let id = i64::try_from(state.jobs.len()).unwrap() + 1;
        state.jobs.push(StoredJob {
            id,
            channel_id,
            job_type: JobType::Incremental,
            status,
            counts: JobCounts::default(),
            error_message: None,
            snapshot: None,
            created_at,
        });
        id
    }

    pub fn jobs(&self) -> Vec<StoredJob> {
        self.state.lock().unwrap().jobs.clone()
    }

    pub fn jobs_for(&self, channel_id: i64) -> Vec<StoredJob> {
        self.jobs()
            .into_iter()
            .filter(|j| j.channel_id == channel_id)
            .collect()
    }

    pub fn channel(&self, channel_id: i64) -> Channel {
        self.state.lock().unwrap().channels[&channel_id].clone()
    }

    pub fn collected_count(&self) -> usize {
        self.state.lock().unwrap().collected.len()
    }

    fn transition(
        &self,
        job_id: i64,
        next: JobStatus,
        apply: impl FnOnce(&mut StoredJob),
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        let job = state
            .jobs
            .iter_mut()
            .find(|j| j.id == job_id)
            .ok_or_else(|| StoreError::NotFound(format!("job {job_id}")))?;
        if !job.status.can_transition_to(next) {
            return Err(StoreError::InvalidTransition(format!(
                "job {job_id}: {} -> {}",
                job.status.as_str(),
                next.as_str()
            )));
        }
        job.status = next;
        apply(job);
        Ok(())
    }
}

#[async_trait]
impl CollectionStore for MemoryStore {
    async fn list_collectable_channels(&self) -> Result<Vec<Channel>, StoreError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .channels
            .values()
            .filter(|c| c.is_active && c.settings.enabled)
            .cloned()
            .collect())
    }

    async fn get_channel(&self, channel_id: i64) -> Result<Option<Channel>, StoreError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .channels
            .get(&channel_id)
            .cloned())
    }

    async fn active_keywords(&self, channel_id: i64) -> Result<Vec<String>, StoreError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .keywords
            .get(&channel_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn create_pending_job(
        &self,
        channel_id: i64,
        job_type: JobType,
    ) -> Result<i64, StoreError> {
        let created_at = self.clock.now();
        let mut state = self.state.lock().unwrap();
        if state
            .jobs
            .iter()
            .any(|j| j.channel_id == channel_id && j.status.is_outstanding())
        {
            return Err(StoreError::JobInFlight { channel_id });
        }
        let id = i64::try_from(state.jobs.len()).unwrap() + 1;
        state.jobs.push(StoredJob {
            id,
            channel_id,
            job_type,
            status: JobStatus::Pending,
            counts: JobCounts::default(),
            error_message: None,
            snapshot: None,
            created_at,
        });
        Ok(id)
    }

    async fn start_job(&self, job_id: i64, snapshot: &ConfigSnapshot) -> Result<(), StoreError> {
        let snapshot = snapshot.clone();
        self.transition(job_id, JobStatus::Running, |job| {
            job.snapshot = Some(snapshot);
        })
    }

    async fn complete_job(&self, job_id: i64, counts: &JobCounts) -> Result<(), StoreError> {
        let counts = *counts;
        self.transition(job_id, JobStatus::Completed, |job| job.counts = counts)
    }

    async fn fail_job(
        &self,
        job_id: i64,
        counts: &JobCounts,
        error_message: &str,
    ) -> Result<(), StoreError> {
        let counts = *counts;
        let message = error_message.to_string();
        self.transition(job_id, JobStatus::Failed, |job| {
            job.counts = counts;
            job.error_message = Some(message);
        })
    }

    async fn fail_stale_jobs(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut state = self.state.lock().unwrap();
        let mut reaped = 0;
        for job in state
            .jobs
            .iter_mut()
            .filter(|j| j.status.is_outstanding() && j.created_at < cutoff)
        {
            job.status = JobStatus::Failed;
            job.error_message = Some("abandoned".to_string());
            reaped += 1;
        }
        Ok(reaped)
    }

    async fn is_collected(&self, key: &DedupKey) -> Result<bool, StoreError> {
        Ok(self.state.lock().unwrap().collected.contains(key))
    }

    async fn record_collected(
        &self,
        key: &DedupKey,
        _channel_id: i64,
        _job_id: i64,
    ) -> Result<(), StoreError> {
        self.state.lock().unwrap().collected.insert(key.clone());
        Ok(())
    }

    async fn touch_last_checked(
        &self,
        channel_id: i64,
        checked_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        let channel = state
            .channels
            .get_mut(&channel_id)
            .ok_or_else(|| StoreError::NotFound(format!("channel {channel_id}")))?;
        channel.settings.last_checked_at = Some(checked_at);
        Ok(())
    }
}

/// Canned response for one channel.
#[derive(Clone)]
pub enum Scripted {
    Items(Vec<RawItem>),
    ChannelNotFound,
    MissingCredentials,
    ServerError,
}

pub struct FakeSource {
    platform: Platform,
    responses: Mutex<HashMap<String, Scripted>>,
    calls: Mutex<Vec<String>>,
}

impl FakeSource {
    pub fn new(platform: Platform) -> Arc<Self> {
        Arc::new(Self {
            platform,
            responses: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn script(&self, external_id: &str, response: Scripted) {
        self.responses
            .lock()
            .unwrap()
            .insert(external_id.to_string(), response);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SourceClient for FakeSource {
    fn platform(&self) -> Platform {
        self.platform
    }

    async fn fetch_recent_items(&self, channel: &Channel) -> Result<Vec<RawItem>, SourceError> {
        self.calls.lock().unwrap().push(channel.external_id.clone());
        let response = self
            .responses
            .lock()
            .unwrap()
            .get(&channel.external_id)
            .cloned()
            .unwrap_or(Scripted::Items(Vec::new()));

        match response {
            Scripted::Items(items) => Ok(items),
            Scripted::ChannelNotFound => Err(SourceError::ChannelNotFound {
                platform: self.platform,
                external_id: channel.external_id.clone(),
            }),
            Scripted::MissingCredentials => Err(SourceError::MissingCredentials {
                platform: self.platform,
            }),
            Scripted::ServerError => Err(SourceError::UnexpectedStatus {
                platform: self.platform,
                status: 503,
                context: "fake".to_string(),
            }),
        }
    }
}

/// Records every text it is asked to extract; fails for texts containing
/// `FAIL`.
#[derive(Default)]
pub struct RecordingExtractor {
    texts: Mutex<Vec<String>>,
}

impl RecordingExtractor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn texts(&self) -> Vec<String> {
        self.texts.lock().unwrap().clone()
    }
}

#[async_trait]
impl PredictionExtractor for RecordingExtractor {
    async fn extract_predictions(
        &self,
        text: &str,
        _platform: Platform,
        _forecaster_id: i64,
    ) -> Result<Vec<Prediction>, ExtractError> {
        self.texts.lock().unwrap().push(text.to_string());
        if text.contains("FAIL") {
            return Err(ExtractError::InvalidUrl("scripted failure".to_string()));
        }
        Ok(vec![Prediction {
            asset: "BTC".to_string(),
            direction: Direction::Bullish,
            target_price: None,
            timeframe: None,
        }])
    }
}
