use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Duration;
use ftrack_core::{DedupKey, JobStatus, JobType, Platform, RawItem};
use ftrack_sources::SourceRegistry;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::*;
use crate::test_support::{
    channel, item, t0, FakeSource, FixedClock, MemoryStore, RecordingExtractor, Scripted,
};

struct Harness {
    clock: Arc<FixedClock>,
    store: Arc<MemoryStore>,
    youtube: Arc<FakeSource>,
    twitter: Arc<FakeSource>,
    extractor: Arc<RecordingExtractor>,
    collector: Arc<Collector>,
}

fn harness() -> Harness {
    harness_with_delays(StdDuration::ZERO, StdDuration::ZERO)
}

fn harness_with_delays(item_delay: StdDuration, channel_delay: StdDuration) -> Harness {
    let clock = FixedClock::new(t0());
    let store = MemoryStore::new(Arc::clone(&clock));
    let youtube = FakeSource::new(Platform::YouTube);
    let twitter = FakeSource::new(Platform::Twitter);
    let extractor = RecordingExtractor::new();

    let sources = SourceRegistry::new()
        .with_client(youtube.clone())
        .with_client(twitter.clone());
    let settings = CollectorSettings {
        batch_size: 10,
        item_delay,
        channel_delay,
        ..CollectorSettings::default()
    };

    let collector = Arc::new(Collector::new(
        store.clone(),
        sources,
        extractor.clone(),
        clock.clone(),
        settings,
    ));

    Harness {
        clock,
        store,
        youtube,
        twitter,
        extractor,
        collector,
    }
}

#[tokio::test]
async fn new_primary_channel_collects_every_item() {
    let h = harness();
    h.store.add_channel(channel(1, Platform::YouTube, true));
    h.youtube.script(
        "ext-1",
        Scripted::Items(vec![item("v1", "BTC to 150k"), item("v2", "ETH flips")]),
    );

    let report = h.collector.run_scheduled_batch(&CancellationToken::new()).await;

    assert_eq!(report.status, BatchStatus::Finished);
    assert_eq!(report.due, 1);
    assert_eq!(report.completed(), 1);

    let jobs = h.store.jobs_for(1);
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].job_type, JobType::FullScan);
    assert_eq!(jobs[0].status, JobStatus::Completed);
    assert_eq!(jobs[0].counts.found, 2);
    assert_eq!(jobs[0].counts.processed, 2);
    assert_eq!(jobs[0].counts.filtered, 0);
    assert_eq!(h.store.channel(1).settings.last_checked_at, Some(t0()));
}

#[tokio::test]
async fn collected_items_are_never_processed_twice() {
    let h = harness();
    h.store.add_channel(channel(1, Platform::YouTube, true));
    h.youtube.script(
        "ext-1",
        Scripted::Items(vec![item("v1", "one"), item("v2", "two")]),
    );

    h.collector.collect_now(1).await.expect("first run");
    h.clock.advance(Duration::hours(2));
    let second = h.collector.collect_now(1).await.expect("second run");

    assert_eq!(second.job_type, JobType::Incremental);
    assert_eq!(second.counts.found, 2);
    assert_eq!(second.counts.processed, 0);
    assert_eq!(second.counts.filtered, 2);
    assert_eq!(h.extractor.texts().len(), 2);
    assert_eq!(h.store.collected_count(), 2);
}

#[tokio::test]
async fn primary_channel_ignores_keywords() {
    let h = harness();
    h.store.add_channel(channel(1, Platform::Twitter, true));
    h.store.set_keywords(1, &["bitcoin"]);
    h.twitter
        .script("ext-1", Scripted::Items(vec![item("t1", "gold is going up")]));

    let summary = h.collector.collect_now(1).await.unwrap();

    assert_eq!(summary.counts.processed, 1);
    assert_eq!(summary.counts.filtered, 0);
}

#[tokio::test]
async fn secondary_channel_only_processes_keyword_matches() {
    let h = harness();
    h.store.add_channel(channel(1, Platform::Twitter, false));
    h.store.set_keywords(1, &["bitcoin"]);
    h.twitter.script(
        "ext-1",
        Scripted::Items(vec![
            item("t1", "Bitcoin breakout incoming"),
            item("t2", "gold rally"),
        ]),
    );

    let summary = h.collector.collect_now(1).await.unwrap();

    assert_eq!(summary.counts.found, 2);
    assert_eq!(summary.counts.processed, 1);
    assert_eq!(summary.counts.filtered, 1);
    assert_eq!(h.extractor.texts(), vec!["Bitcoin breakout incoming".to_string()]);

    let snapshot = h.store.jobs_for(1)[0].snapshot.clone().expect("snapshot");
    assert!(!snapshot.is_primary);
    assert_eq!(snapshot.keywords, vec!["bitcoin".to_string()]);
    assert_eq!(snapshot.page_size, Some(50));
}

#[tokio::test]
async fn secondary_channel_without_keywords_passes_everything() {
    let h = harness();
    h.store.add_channel(channel(1, Platform::Twitter, false));
    h.twitter.script(
        "ext-1",
        Scripted::Items(vec![item("t1", "anything"), item("t2", "at all")]),
    );

    let summary = h.collector.collect_now(1).await.unwrap();

    assert_eq!(summary.counts.processed, 2);
    assert_eq!(summary.counts.filtered, 0);
}

#[tokio::test]
async fn outstanding_job_blocks_a_second_one() {
    let h = harness();
    h.store.add_channel(channel(1, Platform::YouTube, true));
    h.store.insert_job(1, JobStatus::Running, t0());

    let result = h.collector.collect_now(1).await;

    assert!(matches!(result, Err(CollectError::JobInFlight { channel_id: 1 })));
    assert_eq!(h.store.jobs_for(1).len(), 1);
    assert!(h.youtube.calls().is_empty());
    assert!(h.store.channel(1).settings.last_checked_at.is_none());
}

#[tokio::test]
async fn item_whose_body_repeats_its_title_is_extracted_once() {
    let h = harness();
    h.store.add_channel(channel(1, Platform::Twitter, true));
    h.twitter.script(
        "ext-1",
        Scripted::Items(vec![RawItem {
            external_id: "t1".to_string(),
            title: "BTC to 100k by March".to_string(),
            body: "BTC to 100k by March".to_string(),
            published_at: None,
        }]),
    );

    h.collector.collect_now(1).await.unwrap();

    let texts = h.extractor.texts();
    assert_eq!(texts.len(), 1);
    assert_eq!(texts[0].matches("BTC to 100k by March").count(), 1);
}

#[tokio::test]
async fn failed_fetch_still_advances_schedule() {
    let h = harness();
    h.store.add_channel(channel(1, Platform::YouTube, true));
    h.youtube.script("ext-1", Scripted::ChannelNotFound);

    let err = h.collector.collect_now(1).await.unwrap_err();
    assert!(matches!(err, CollectError::Fetch { .. }));

    let job = &h.store.jobs_for(1)[0];
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job
        .error_message
        .as_deref()
        .is_some_and(|m| m.contains("not found")));

    let stored = h.store.channel(1);
    assert_eq!(stored.settings.last_checked_at, Some(t0()));
    assert!(stored.is_active);

    let report = h.collector.run_scheduled_batch(&CancellationToken::new()).await;
    assert_eq!(report.due, 0);
    assert_eq!(h.youtube.calls().len(), 1);
}

#[tokio::test]
async fn missing_credentials_fail_the_job_with_a_clear_message() {
    let h = harness();
    h.store.add_channel(channel(1, Platform::Twitter, true));
    h.twitter.script("ext-1", Scripted::MissingCredentials);

    let err = h.collector.collect_now(1).await.unwrap_err();

    assert_eq!(err.job_id(), Some(1));
    let job = &h.store.jobs_for(1)[0];
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(
        job.error_message.as_deref(),
        Some("twitter credentials are not configured")
    );
}

#[tokio::test]
async fn batch_continues_after_a_channel_fails() {
    let h = harness();
    for id in 1..=3 {
        h.store.add_channel(channel(id, Platform::YouTube, true));
        h.youtube
            .script(&format!("ext-{id}"), Scripted::Items(vec![item(&format!("v{id}"), "x")]));
    }
    h.youtube.script("ext-2", Scripted::ServerError);

    let report = h.collector.run_scheduled_batch(&CancellationToken::new()).await;

    assert_eq!(report.status, BatchStatus::Finished);
    assert_eq!(report.completed(), 2);
    assert_eq!(report.failed(), 1);
    assert!(matches!(
        report.channels[1].outcome,
        ChannelOutcome::Failed { job_id: Some(_), .. }
    ));
    assert_eq!(h.store.jobs_for(3)[0].status, JobStatus::Completed);
    assert_eq!(h.youtube.calls(), vec!["ext-1", "ext-2", "ext-3"]);
}

#[tokio::test]
async fn extraction_errors_are_counted_not_fatal() {
    let h = harness();
    h.store.add_channel(channel(1, Platform::YouTube, true));
    h.youtube.script(
        "ext-1",
        Scripted::Items(vec![item("v1", "FAIL on this one"), item("v2", "fine")]),
    );

    let summary = h.collector.collect_now(1).await.unwrap();
    assert_eq!(summary.counts.processed, 1);
    assert_eq!(summary.counts.failed, 1);
    assert_eq!(h.store.jobs_for(1)[0].status, JobStatus::Completed);
    assert_eq!(h.store.collected_count(), 1);

    h.clock.advance(Duration::hours(2));
    let retry = h.collector.collect_now(1).await.unwrap();
    assert_eq!(retry.counts.filtered, 1);
    assert_eq!(retry.counts.failed, 1);
    assert_eq!(h.extractor.texts().len(), 3);
}

#[tokio::test]
async fn overlapping_batch_returns_immediately() {
    let h = harness();
    h.store.add_channel(channel(1, Platform::YouTube, true));

    let _held = h.collector.batch_lock.try_lock().unwrap();
    let report = h.collector.run_scheduled_batch(&CancellationToken::new()).await;

    assert_eq!(report.status, BatchStatus::AlreadyRunning);
    assert!(report.channels.is_empty());
    assert!(h.store.jobs().is_empty());
}

#[tokio::test]
async fn wait_idle_blocks_until_the_batch_lock_is_released() {
    let h = harness();
    let held = h.collector.batch_lock.try_lock().unwrap();

    let waiter = tokio::spawn({
        let collector = Arc::clone(&h.collector);
        async move { collector.wait_idle().await }
    });
    tokio::task::yield_now().await;
    assert!(!waiter.is_finished());

    drop(held);
    tokio::time::timeout(StdDuration::from_secs(1), waiter)
        .await
        .expect("wait_idle returns once the lock is free")
        .unwrap();
}

#[tokio::test]
async fn cancelled_batch_stops_before_the_next_channel() {
    let h = harness();
    h.store.add_channel(channel(1, Platform::YouTube, true));
    h.store.add_channel(channel(2, Platform::YouTube, true));

    let token = CancellationToken::new();
    token.cancel();
    let report = h.collector.run_scheduled_batch(&token).await;

    assert_eq!(report.status, BatchStatus::Cancelled);
    assert_eq!(report.due, 2);
    assert!(report.channels.is_empty());
    assert!(h.youtube.calls().is_empty());
}

#[tokio::test]
async fn stale_jobs_are_reaped_before_collecting() {
    let h = harness();
    h.store.add_channel(channel(1, Platform::YouTube, true));
    let stale = h.store.insert_job(1, JobStatus::Running, t0() - Duration::hours(3));

    let report = h.collector.run_scheduled_batch(&CancellationToken::new()).await;

    assert_eq!(report.reaped_jobs, 1);
    assert_eq!(report.completed(), 1);
    let jobs = h.store.jobs_for(1);
    assert_eq!(jobs.len(), 2);
    assert_eq!(
        jobs.iter().find(|j| j.id == stale).map(|j| j.status),
        Some(JobStatus::Failed)
    );
}

#[tokio::test]
async fn channels_inside_their_interval_are_left_alone() {
    let h = harness();
    let mut recent = channel(1, Platform::YouTube, true);
    recent.settings.last_checked_at = Some(t0() - Duration::minutes(10));
    h.store.add_channel(recent);

    let report = h.collector.run_scheduled_batch(&CancellationToken::new()).await;

    assert_eq!(report.due, 0);
    assert!(h.store.jobs().is_empty());
}

#[tokio::test]
async fn previously_checked_channels_get_keyword_or_incremental_jobs() {
    let h = harness();
    let mut secondary = channel(1, Platform::Twitter, false);
    secondary.settings.last_checked_at = Some(t0() - Duration::hours(2));
    let mut primary = channel(2, Platform::Twitter, true);
    primary.settings.last_checked_at = Some(t0() - Duration::hours(2));
    h.store.add_channel(secondary);
    h.store.add_channel(primary);
    h.store.set_keywords(1, &["bitcoin"]);

    let first = h.collector.collect_now(1).await.unwrap();
    let second = h.collector.collect_now(2).await.unwrap();

    assert_eq!(first.job_type, JobType::KeywordScan);
    assert_eq!(second.job_type, JobType::Incremental);
}

#[tokio::test]
async fn unknown_or_inactive_channel_is_not_found() {
    let h = harness();
    let mut inactive = channel(2, Platform::YouTube, true);
    inactive.is_active = false;
    h.store.add_channel(inactive);

    assert!(matches!(
        h.collector.collect_now(1).await,
        Err(CollectError::ChannelNotFound(1))
    ));
    assert!(matches!(
        h.collector.collect_now(2).await,
        Err(CollectError::ChannelNotFound(2))
    ));
}

#[tokio::test]
async fn background_collection_runs_to_completion() {
    let h = harness();
    h.store.add_channel(channel(1, Platform::YouTube, true));
    h.youtube
        .script("ext-1", Scripted::Items(vec![item("v1", "hello")]));

    h.collector.spawn_collect_now(1).await.unwrap();

    let jobs = h.store.jobs_for(1);
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].status, JobStatus::Completed);
}

#[tokio::test(start_paused = true)]
async fn item_delay_is_paid_per_extraction_call_only() {
    let h = harness_with_delays(StdDuration::from_secs(1), StdDuration::ZERO);
    let ch = channel(1, Platform::Twitter, false);
    h.store.add_channel(ch.clone());
    h.store.set_keywords(1, &["bitcoin"]);
    let seen = item("t0", "bitcoin seen before");
    h.store
        .record_collected(&DedupKey::for_item(&ch, &seen), 1, 0)
        .await
        .unwrap();
    h.twitter.script(
        "ext-1",
        Scripted::Items(vec![
            seen,
            item("t1", "bitcoin to 150k"),
            item("t2", "gold rally"),
            item("t3", "bitcoin FAIL"),
        ]),
    );

    let started = Instant::now();
    let summary = h.collector.collect_now(1).await.unwrap();
    let elapsed = started.elapsed();

    assert_eq!(summary.counts.filtered, 2);
    assert_eq!(summary.counts.processed, 1);
    assert_eq!(summary.counts.failed, 1);
    assert_eq!(h.extractor.texts().len(), 2);
    assert!(elapsed >= StdDuration::from_secs(2), "{elapsed:?}");
    assert!(elapsed < StdDuration::from_secs(3), "{elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn channel_delay_is_paid_between_channels() {
    let h = harness_with_delays(StdDuration::ZERO, StdDuration::from_secs(5));
    for id in 1..=3 {
        h.store.add_channel(channel(id, Platform::YouTube, true));
    }

    let started = Instant::now();
    let report = h.collector.run_scheduled_batch(&CancellationToken::new()).await;
    let elapsed = started.elapsed();

    assert_eq!(report.status, BatchStatus::Finished);
    assert_eq!(report.completed(), 3);
    assert!(elapsed >= StdDuration::from_secs(10), "{elapsed:?}");
    assert!(elapsed < StdDuration::from_secs(15), "{elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn cancel_during_channel_delay_ends_the_batch() {
    let h = harness_with_delays(StdDuration::ZERO, StdDuration::from_secs(60));
    h.store.add_channel(channel(1, Platform::YouTube, true));
    h.store.add_channel(channel(2, Platform::YouTube, true));

    let token = CancellationToken::new();
    tokio::spawn({
        let token = token.clone();
        async move {
            tokio::time::sleep(StdDuration::from_secs(1)).await;
            token.cancel();
        }
    });

    let started = Instant::now();
    let report = h.collector.run_scheduled_batch(&token).await;

    assert_eq!(report.status, BatchStatus::Cancelled);
    assert_eq!(report.channels.len(), 1);
    assert_eq!(h.youtube.calls(), vec!["ext-1"]);
    assert!(h.store.jobs_for(2).is_empty());
    assert!(started.elapsed() < StdDuration::from_secs(60));
}
