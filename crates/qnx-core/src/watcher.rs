//! Job-completion watcher.
//!
//! A wait listens on the status channel first and falls back to HTTP
//! polling once the channel is lost:
//!
//! ```text
//!   CONNECTING ──→ LISTENING ──→ MATCHED
//!       │              │
//!       └──────────────┴──→ CHANNEL_LOST ──→ POLLING ──→ MATCHED
//!                                             │   ↑
//!                                             │   └── RETRY_BACKOFF
//!                                             └──→ TIMED_OUT
//! ```
//!
//! The deadline is checked at every suspension point, so any phase can end
//! in `TIMED_OUT`. The most recently observed status wins, whichever source
//! it came from.

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, sleep_until, timeout_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::error::{NexusError, NexusResult};
use crate::job::{JobHandle, JobId, JobStatus, StatusKind};
use crate::retry::RetryPolicy;
use crate::transport::{StatusChannel, StatusSource, StatusSubscription};

/// Default deadline for a wait.
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(300);
/// Default interval between polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Options for a single wait.
#[derive(Debug, Clone, PartialEq)]
pub struct WaitOptions {
    /// Hard deadline; `None` waits indefinitely.
    pub timeout: Option<Duration>,
    /// Statuses to stop at, in addition to every terminal status.
    /// `None` waits for a terminal status.
    pub target_statuses: Option<BTreeSet<StatusKind>>,
    /// Sleep between successful polls that did not match.
    pub poll_interval: Duration,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            timeout: Some(DEFAULT_WAIT_TIMEOUT),
            target_statuses: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl WaitOptions {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn without_timeout(mut self) -> Self {
        self.timeout = None;
        self
    }

    pub fn with_targets(mut self, targets: impl IntoIterator<Item = StatusKind>) -> Self {
        self.target_statuses = Some(targets.into_iter().collect());
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Whether `kind` ends the wait.
    ///
    /// Terminal kinds always match: a terminal job cannot reach any other
    /// target.
    pub fn matches(&self, kind: StatusKind) -> bool {
        kind.is_terminal()
            || self
                .target_statuses
                .as_ref()
                .is_some_and(|targets| targets.contains(&kind))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WatchPhase {
    Connecting,
    Listening,
    ChannelLost,
    Polling,
    RetryBackoff,
    Matched,
    TimedOut,
}

/// Per-wait state. Nothing here outlives the wait or is shared.
struct WatchSession {
    job_id: JobId,
    started: Instant,
    deadline: Option<Instant>,
    last_status: JobStatus,
    phase: WatchPhase,
    polls: u32,
    retries: u32,
    consecutive_failures: u32,
    subscription: Option<Box<dyn StatusSubscription>>,
}

impl WatchSession {
    fn start(handle: &JobHandle, options: &WaitOptions) -> Self {
        let started = Instant::now();
        Self {
            job_id: handle.id().clone(),
            started,
            deadline: options.timeout.map(|t| started + t),
            last_status: JobStatus::new(handle.last_status()),
            phase: WatchPhase::Connecting,
            polls: 0,
            retries: 0,
            consecutive_failures: 0,
            subscription: None,
        }
    }

    fn expired(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    fn observe(&mut self, status: JobStatus) {
        debug!(
            job_id = %self.job_id,
            status = %status.kind,
            phase = ?self.phase,
            "Observed job status"
        );
        self.last_status = status;
    }

    fn matched(&mut self) -> JobStatus {
        self.phase = WatchPhase::Matched;
        info!(
            job_id = %self.job_id,
            status = %self.last_status.kind,
            polls = self.polls,
            retries = self.retries,
            elapsed_ms = self.started.elapsed().as_millis() as u64,
            "Wait finished"
        );
        self.last_status.clone()
    }

    fn timed_out(&mut self) -> NexusError {
        self.phase = WatchPhase::TimedOut;
        warn!(
            job_id = %self.job_id,
            last_status = %self.last_status.kind,
            polls = self.polls,
            "Timed out waiting for job"
        );
        NexusError::Timeout {
            job_id: self.job_id.clone(),
            last_status: Box::new(self.last_status.clone()),
        }
    }

    /// The earlier of `at` and the deadline.
    fn clamp(&self, at: Instant) -> Instant {
        self.deadline.map_or(at, |d| at.min(d))
    }

    async fn close_channel(&mut self) {
        if let Some(mut subscription) = self.subscription.take() {
            subscription.close().await;
        }
    }
}

/// Run `fut` until the optional deadline. `None` if the deadline hit first.
async fn until_deadline<F: Future>(deadline: Option<Instant>, fut: F) -> Option<F::Output> {
    match deadline {
        Some(d) => timeout_at(d, fut).await.ok(),
        None => Some(fut.await),
    }
}

/// Drives remote jobs to a terminal or requested status.
///
/// A watcher holds no per-wait state; one instance can serve any number of
/// concurrent waits.
#[derive(Clone)]
pub struct JobWatcher {
    source: Arc<dyn StatusSource>,
    channel: Option<Arc<dyn StatusChannel>>,
    retry: RetryPolicy,
}

impl std::fmt::Debug for JobWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobWatcher")
            .field("channel", &self.channel.is_some())
            .field("retry", &self.retry)
            .finish()
    }
}

impl JobWatcher {
    /// Create a polling-only watcher.
    pub fn new(source: Arc<dyn StatusSource>) -> Self {
        Self {
            source,
            channel: None,
            retry: RetryPolicy::default(),
        }
    }

    /// Listen on `channel` before falling back to polling.
    pub fn with_channel(mut self, channel: Arc<dyn StatusChannel>) -> Self {
        self.channel = Some(channel);
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Wait until the job reaches a matching status.
    ///
    /// Returns the matched status, or [`NexusError::Timeout`] carrying the
    /// last observed status once the deadline passes. Dropping the future
    /// abandons the wait; the remote job is unaffected.
    #[instrument(skip(self, handle, options), fields(job_id = %handle.id()))]
    pub async fn wait_for(
        &self,
        handle: &JobHandle,
        options: &WaitOptions,
    ) -> NexusResult<JobStatus> {
        let mut session = WatchSession::start(handle, options);
        let result = self.drive(&mut session, options).await;
        session.close_channel().await;
        result
    }

    /// Like [`JobWatcher::wait_for`], but returns `Ok(None)` when `cancel`
    /// fires first. The status channel is closed either way.
    #[instrument(skip(self, handle, options, cancel), fields(job_id = %handle.id()))]
    pub async fn wait_for_or_cancel(
        &self,
        handle: &JobHandle,
        options: &WaitOptions,
        cancel: &CancellationToken,
    ) -> NexusResult<Option<JobStatus>> {
        let mut session = WatchSession::start(handle, options);
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!(job_id = %handle.id(), "Wait cancelled");
                Ok(None)
            }
            result = self.drive(&mut session, options) => result.map(Some),
        };
        session.close_channel().await;
        result
    }

    async fn drive(
        &self,
        session: &mut WatchSession,
        options: &WaitOptions,
    ) -> NexusResult<JobStatus> {
        if session.expired() {
            return Err(session.timed_out());
        }

        if let Some(channel) = &self.channel {
            session.phase = WatchPhase::Connecting;
            match until_deadline(session.deadline, channel.subscribe(&session.job_id)).await {
                None => return Err(session.timed_out()),
                Some(Ok(subscription)) => {
                    session.subscription = Some(subscription);
                    session.phase = WatchPhase::Listening;
                    if let Some(status) = self.listen(session, options).await? {
                        return Ok(status);
                    }
                }
                Some(Err(e)) if e.is_auth() => return Err(e),
                Some(Err(e)) => {
                    warn!(
                        job_id = %session.job_id,
                        error = %e,
                        "Status channel unavailable, falling back to polling"
                    );
                    session.phase = WatchPhase::ChannelLost;
                }
            }
        }

        self.poll(session, options).await
    }

    /// Consume channel events. `Ok(None)` means the channel was lost.
    async fn listen(
        &self,
        session: &mut WatchSession,
        options: &WaitOptions,
    ) -> NexusResult<Option<JobStatus>> {
        loop {
            let Some(subscription) = session.subscription.as_mut() else {
                return Ok(None);
            };
            let event = until_deadline(session.deadline, subscription.next_status()).await;

            match event {
                None => return Err(session.timed_out()),
                Some(Some(Ok(status))) => {
                    let kind = status.kind;
                    session.observe(status);
                    if options.matches(kind) {
                        session.close_channel().await;
                        return Ok(Some(session.matched()));
                    }
                }
                Some(Some(Err(e))) if e.is_auth() => return Err(e),
                Some(Some(Err(e @ NexusError::MalformedPayload(_)))) => return Err(e),
                Some(Some(Err(e))) => {
                    warn!(job_id = %session.job_id, error = %e, "Status channel failed");
                    break;
                }
                Some(None) => {
                    debug!(job_id = %session.job_id, "Status channel closed before a match");
                    break;
                }
            }
        }

        session.phase = WatchPhase::ChannelLost;
        session.close_channel().await;
        Ok(None)
    }

    async fn poll(&self, session: &mut WatchSession, options: &WaitOptions) -> NexusResult<JobStatus> {
        session.phase = WatchPhase::Polling;

        loop {
            if session.expired() {
                return Err(session.timed_out());
            }

            session.polls += 1;
            let fetched =
                until_deadline(session.deadline, self.source.fetch_status(&session.job_id)).await;

            let wake = match fetched {
                None => return Err(session.timed_out()),
                Some(Ok(status)) => {
                    session.consecutive_failures = 0;
                    session.phase = WatchPhase::Polling;
                    let kind = status.kind;
                    session.observe(status);
                    if options.matches(kind) {
                        return Ok(session.matched());
                    }
                    Instant::now() + options.poll_interval
                }
                Some(Err(e)) => {
                    let error = e.to_string();
                    let backoff = self.retry.next_backoff(session.consecutive_failures, e)?;
                    session.consecutive_failures += 1;
                    session.retries += 1;
                    warn!(
                        job_id = %session.job_id,
                        attempt = session.consecutive_failures,
                        error = %error,
                        "Status poll failed, retrying after {:?}",
                        backoff
                    );
                    session.phase = WatchPhase::RetryBackoff;
                    Instant::now() + backoff
                }
            };

            sleep_until(session.clamp(wake)).await;
        }
    }
}
