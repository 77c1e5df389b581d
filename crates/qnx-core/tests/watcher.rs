//! Watcher behaviour against scripted transports, on a paused clock.

mod common;

use std::sync::Arc;
use std::time::Duration;

use qnx_core::{
    ErrorCategory, JobHandle, JobKind, JobWatcher, NexusError, RetryPolicy, StatusKind,
    WaitOptions,
};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use common::{AfterScript, ScriptedChannel, ScriptedSource, status};

use StatusKind::*;

fn handle() -> JobHandle {
    JobHandle::new("job-42", JobKind::Execute)
}

fn options() -> WaitOptions {
    WaitOptions::default()
        .with_timeout(Duration::from_secs(60))
        .with_poll_interval(Duration::from_secs(1))
}

#[tokio::test(start_paused = true)]
async fn test_channel_events_reach_terminal_without_polling() {
    let source = ScriptedSource::idle();
    let channel = ScriptedChannel::statuses([Queued, Running, Completed], AfterScript::Hang);
    let watcher = JobWatcher::new(source.clone()).with_channel(channel.clone());

    let result = watcher.wait_for(&handle(), &options()).await.unwrap();

    assert_eq!(result.kind, Completed);
    assert_eq!(source.polls(), 0);
    assert_eq!(channel.subscribes(), 1);
    assert!(channel.was_closed());
}

#[tokio::test(start_paused = true)]
async fn test_channel_drop_falls_back_to_polling() {
    let source = ScriptedSource::statuses([Running, Running, Errored]);
    let channel = ScriptedChannel::statuses([Running], AfterScript::Close);
    let watcher = JobWatcher::new(source.clone()).with_channel(channel.clone());

    let started = Instant::now();
    let result = watcher.wait_for(&handle(), &options()).await.unwrap();

    assert_eq!(result.kind, Errored);
    assert_eq!(source.polls(), 3);
    assert!(channel.was_closed());
    // First poll is immediate, then one interval between each poll.
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(2) && elapsed < Duration::from_secs(3));
}

#[tokio::test(start_paused = true)]
async fn test_unavailable_channel_matches_polling_only() {
    let script = [Queued, Running, Running, Completed];

    let polling_source = ScriptedSource::statuses(script);
    let polling_only = JobWatcher::new(polling_source.clone());
    let expected = polling_only.wait_for(&handle(), &options()).await.unwrap();

    let source = ScriptedSource::statuses(script);
    let channel = ScriptedChannel::failing(NexusError::Transient("connection refused".into()));
    let watcher = JobWatcher::new(source.clone()).with_channel(channel.clone());
    let result = watcher.wait_for(&handle(), &options()).await.unwrap();

    assert_eq!(result, expected);
    assert_eq!(source.polls(), polling_source.polls());
    assert_eq!(channel.subscribes(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_zero_timeout_returns_immediately() {
    let source = ScriptedSource::statuses([Completed]);
    let channel = ScriptedChannel::statuses([Completed], AfterScript::Close);
    let watcher = JobWatcher::new(source.clone()).with_channel(channel.clone());
    let handle = handle().with_last_status(Queued);

    let err = watcher
        .wait_for(&handle, &options().with_timeout(Duration::ZERO))
        .await
        .unwrap_err();

    assert_eq!(err.category(), ErrorCategory::Timeout);
    assert_eq!(err.last_status().map(|s| s.kind), Some(Queued));
    assert_eq!(source.polls(), 0);
    assert_eq!(channel.subscribes(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_deadline_carries_last_observed_status() {
    let source = ScriptedSource::idle();
    let watcher = JobWatcher::new(source.clone());
    let opts = options().with_timeout(Duration::from_secs(5));

    let started = Instant::now();
    let err = watcher.wait_for(&handle(), &opts).await.unwrap_err();

    match err {
        NexusError::Timeout {
            job_id,
            last_status,
        } => {
            assert_eq!(job_id.as_str(), "job-42");
            assert_eq!(last_status.kind, Running);
        }
        other => panic!("expected timeout, got {other:?}"),
    }
    assert_eq!(source.polls(), 5);
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(5) && elapsed < Duration::from_secs(6));
}

#[tokio::test(start_paused = true)]
async fn test_channel_timeout_while_listening() {
    let source = ScriptedSource::idle();
    let channel = ScriptedChannel::statuses([Queued], AfterScript::Hang);
    let watcher = JobWatcher::new(source.clone()).with_channel(channel.clone());

    let err = watcher
        .wait_for(&handle(), &options().with_timeout(Duration::from_secs(10)))
        .await
        .unwrap_err();

    assert_eq!(err.last_status().map(|s| s.kind), Some(Queued));
    assert_eq!(source.polls(), 0);
    assert!(channel.was_closed());
}

#[tokio::test(start_paused = true)]
async fn test_most_recent_observation_wins() {
    let source = ScriptedSource::new((0..10).map(|_| Ok(status(Queued))));
    let channel = ScriptedChannel::statuses([Running], AfterScript::Close);
    let watcher = JobWatcher::new(source.clone()).with_channel(channel);

    let err = watcher
        .wait_for(&handle(), &options().with_timeout(Duration::from_secs(3)))
        .await
        .unwrap_err();

    // The poller saw QUEUED after the channel saw RUNNING (e.g. a retry).
    assert_eq!(err.last_status().map(|s| s.kind), Some(Queued));
}

#[tokio::test(start_paused = true)]
async fn test_custom_target_status() {
    let source = ScriptedSource::idle();
    let channel = ScriptedChannel::statuses([Submitted, Queued, Running], AfterScript::Hang);
    let watcher = JobWatcher::new(source.clone()).with_channel(channel);

    let result = watcher
        .wait_for(&handle(), &options().with_targets([Running]))
        .await
        .unwrap();

    assert_eq!(result.kind, Running);
    assert_eq!(source.polls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_terminal_status_ends_wait_for_other_target() {
    let source = ScriptedSource::statuses([Queued, Cancelled]);
    let watcher = JobWatcher::new(source.clone());

    let result = watcher
        .wait_for(&handle(), &options().with_targets([Running]))
        .await
        .unwrap();

    assert_eq!(result.kind, Cancelled);
    assert_eq!(source.polls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_auth_failure_on_subscribe_is_fatal() {
    let source = ScriptedSource::statuses([Completed]);
    let channel = ScriptedChannel::failing(NexusError::Unauthorized {
        status: 401,
        message: "token expired".into(),
    });
    let watcher = JobWatcher::new(source.clone()).with_channel(channel);

    let err = watcher.wait_for(&handle(), &options()).await.unwrap_err();

    assert!(err.is_auth());
    assert_eq!(source.polls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_malformed_channel_frame_is_fatal() {
    let source = ScriptedSource::statuses([Completed]);
    let channel = ScriptedChannel::new(
        [
            Ok(status(Queued)),
            Err(NexusError::MalformedPayload("missing field `status`".into())),
        ],
        AfterScript::Hang,
    );
    let watcher = JobWatcher::new(source.clone()).with_channel(channel.clone());

    let err = watcher.wait_for(&handle(), &options()).await.unwrap_err();

    assert!(matches!(err, NexusError::MalformedPayload(_)));
    assert_eq!(source.polls(), 0);
    assert!(channel.was_closed());
}

#[tokio::test(start_paused = true)]
async fn test_not_found_poll_is_fatal() {
    let source = ScriptedSource::new([Err(NexusError::NotFound("job-42".into()))]);
    let watcher = JobWatcher::new(source.clone());

    let err = watcher.wait_for(&handle(), &options()).await.unwrap_err();

    assert!(matches!(err, NexusError::NotFound(_)));
    assert_eq!(source.polls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_transient_poll_failures_are_retried() {
    let source = ScriptedSource::new([
        Err(NexusError::Transient("503".into())),
        Err(NexusError::Transient("connection reset".into())),
        Ok(status(Completed)),
    ]);
    let watcher = JobWatcher::new(source.clone());

    let result = watcher.wait_for(&handle(), &options()).await.unwrap();

    assert_eq!(result.kind, Completed);
    assert_eq!(source.polls(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_transient_poll_failures_exhaust_retries() {
    let source = ScriptedSource::new((0..10).map(|_| Err(NexusError::Transient("503".into()))));
    let watcher = JobWatcher::new(source.clone())
        .with_retry_policy(RetryPolicy::new(2, Duration::from_millis(100)));

    let err = watcher.wait_for(&handle(), &options()).await.unwrap_err();

    assert!(matches!(err, NexusError::RetriesExhausted { attempts: 3, .. }));
    assert_eq!(err.category(), ErrorCategory::TransientExhausted);
    assert_eq!(source.polls(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_successful_poll_resets_retry_budget() {
    let source = ScriptedSource::new([
        Err(NexusError::Transient("503".into())),
        Ok(status(Running)),
        Err(NexusError::Transient("503".into())),
        Ok(status(Completed)),
    ]);
    let watcher = JobWatcher::new(source.clone())
        .with_retry_policy(RetryPolicy::new(1, Duration::from_millis(100)));

    let result = watcher.wait_for(&handle(), &options()).await.unwrap();

    assert_eq!(result.kind, Completed);
    assert_eq!(source.polls(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_returns_none() {
    let source = ScriptedSource::idle();
    let channel = ScriptedChannel::statuses([Queued], AfterScript::Hang);
    let watcher = JobWatcher::new(source.clone()).with_channel(channel.clone());
    let token = CancellationToken::new();

    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(2)).await;
        canceller.cancel();
    });

    let result = watcher
        .wait_for_or_cancel(&handle(), &options(), &token)
        .await
        .unwrap();

    assert!(result.is_none());
    assert_eq!(source.polls(), 0);
    assert!(channel.was_closed());
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_waits_share_nothing() {
    let first = ScriptedSource::statuses([Running, Completed]);
    let second = ScriptedSource::statuses([Queued, Queued, Errored]);
    let watcher_a = JobWatcher::new(first.clone());
    let watcher_b = JobWatcher::new(second.clone());
    let opts = options();

    let a = handle();
    let b = JobHandle::new("job-43", JobKind::Compile);
    let (ra, rb) = tokio::join!(watcher_a.wait_for(&a, &opts), watcher_b.wait_for(&b, &opts));

    assert_eq!(ra.unwrap().kind, Completed);
    assert_eq!(rb.unwrap().kind, Errored);
    assert_eq!(first.polls(), 2);
    assert_eq!(second.polls(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_handle_is_not_modified() {
    let source = ScriptedSource::statuses([Completed]);
    let watcher = JobWatcher::new(source);
    let handle = handle();
    let before = handle.clone();

    watcher.wait_for(&handle, &options()).await.unwrap();

    assert_eq!(handle, before);
    assert_eq!(handle.last_status(), Submitted);
}

#[test]
fn test_watcher_is_cheap_to_share() {
    fn assert_send_sync<T: Send + Sync + Clone>() {}
    assert_send_sync::<JobWatcher>();
    let _ = Arc::new(JobWatcher::new(ScriptedSource::idle()));
}
