//! Scripted in-memory transports for the watcher and iterator tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use async_trait::async_trait;

use qnx_core::{
    JobId, JobRef, JobStatus, NexusError, NexusResult, Page, PageCursor, PageSource, Query,
    StatusChannel, StatusKind, StatusSource, StatusSubscription, Summary,
};

pub fn status(kind: StatusKind) -> JobStatus {
    JobStatus::new(kind).with_message(kind.as_str().to_lowercase())
}

/// Status source that replays a script, then repeats `RUNNING`.
#[derive(Default)]
pub struct ScriptedSource {
    script: Mutex<VecDeque<NexusResult<JobStatus>>>,
    polls: AtomicU32,
}

impl ScriptedSource {
    pub fn new(script: impl IntoIterator<Item = NexusResult<JobStatus>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into_iter().collect()),
            polls: AtomicU32::new(0),
        })
    }

    pub fn statuses(kinds: impl IntoIterator<Item = StatusKind>) -> Arc<Self> {
        Self::new(kinds.into_iter().map(|k| Ok(status(k))))
    }

    /// A source with no script: every poll reports `RUNNING`.
    pub fn idle() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn polls(&self) -> u32 {
        self.polls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StatusSource for ScriptedSource {
    async fn fetch_status(&self, _job_id: &JobId) -> NexusResult<JobStatus> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(status(StatusKind::Running)))
    }
}

/// What a subscription does after its scripted events run out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AfterScript {
    /// Report the channel as closed.
    Close,
    /// Never deliver anything else.
    Hang,
}

pub struct ScriptedChannel {
    subscribe_error: Mutex<Option<NexusError>>,
    events: Mutex<Option<VecDeque<NexusResult<JobStatus>>>>,
    after: AfterScript,
    subscribes: AtomicU32,
    closed: Arc<AtomicBool>,
}

impl ScriptedChannel {
    pub fn new(
        events: impl IntoIterator<Item = NexusResult<JobStatus>>,
        after: AfterScript,
    ) -> Arc<Self> {
        Arc::new(Self {
            subscribe_error: Mutex::new(None),
            events: Mutex::new(Some(events.into_iter().collect())),
            after,
            subscribes: AtomicU32::new(0),
            closed: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn statuses(kinds: impl IntoIterator<Item = StatusKind>, after: AfterScript) -> Arc<Self> {
        Self::new(kinds.into_iter().map(|k| Ok(status(k))), after)
    }

    /// A channel whose subscribe call fails with `error`.
    pub fn failing(error: NexusError) -> Arc<Self> {
        Arc::new(Self {
            subscribe_error: Mutex::new(Some(error)),
            events: Mutex::new(None),
            after: AfterScript::Close,
            subscribes: AtomicU32::new(0),
            closed: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn subscribes(&self) -> u32 {
        self.subscribes.load(Ordering::SeqCst)
    }

    pub fn was_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StatusChannel for ScriptedChannel {
    async fn subscribe(&self, _job_id: &JobId) -> NexusResult<Box<dyn StatusSubscription>> {
        self.subscribes.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.subscribe_error.lock().unwrap().take() {
            return Err(err);
        }
        let events = self.events.lock().unwrap().take().unwrap_or_default();
        Ok(Box::new(ScriptedSubscription {
            events,
            after: self.after,
            closed: Arc::clone(&self.closed),
        }))
    }
}

struct ScriptedSubscription {
    events: VecDeque<NexusResult<JobStatus>>,
    after: AfterScript,
    closed: Arc<AtomicBool>,
}

#[async_trait]
impl StatusSubscription for ScriptedSubscription {
    async fn next_status(&mut self) -> Option<NexusResult<JobStatus>> {
        if let Some(event) = self.events.pop_front() {
            return Some(event);
        }
        match self.after {
            AfterScript::Close => None,
            AfterScript::Hang => std::future::pending().await,
        }
    }

    async fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// In-memory listing over a fixed vector.
pub struct VecListing<T> {
    items: Vec<T>,
    transient_failures: AtomicU32,
    fatal_on_page: Option<u32>,
    page_fetches: AtomicU32,
    count_calls: AtomicU32,
}

impl<T: Clone + Send + Sync> VecListing<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self {
            items,
            transient_failures: AtomicU32::new(0),
            fatal_on_page: None,
            page_fetches: AtomicU32::new(0),
            count_calls: AtomicU32::new(0),
        }
    }

    /// Fail the next `n` page fetches with a transient error.
    pub fn with_transient_failures(self, n: u32) -> Self {
        self.transient_failures.store(n, Ordering::SeqCst);
        self
    }

    /// Fail every fetch of page `number` with a fatal error.
    pub fn with_fatal_page(mut self, number: u32) -> Self {
        self.fatal_on_page = Some(number);
        self
    }

    pub fn page_fetches(&self) -> u32 {
        self.page_fetches.load(Ordering::SeqCst)
    }

    pub fn count_calls(&self) -> u32 {
        self.count_calls.load(Ordering::SeqCst)
    }
}

fn page_of<T: Clone>(items: &[T], cursor: &PageCursor) -> Page<T> {
    let size = cursor.size as usize;
    let start = cursor.number as usize * size;
    let end = (start + size).min(items.len());
    if start >= items.len() {
        return Page::empty();
    }
    let next = (end < items.len()).then(|| cursor.next());
    Page::new(items[start..end].to_vec(), next)
}

#[async_trait]
impl PageSource for VecListing<u32> {
    type Item = u32;

    async fn fetch_page(&self, _query: &Query, cursor: &PageCursor) -> NexusResult<Page<u32>> {
        self.page_fetches.fetch_add(1, Ordering::SeqCst);
        if self
            .transient_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(NexusError::Transient("503 Service Unavailable".into()));
        }
        if self.fatal_on_page == Some(cursor.number) {
            return Err(NexusError::Api {
                status: 400,
                message: "bad filter".into(),
            });
        }
        Ok(page_of(&self.items, cursor))
    }

    async fn count(&self, _query: &Query) -> NexusResult<u64> {
        self.count_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.items.len() as u64)
    }

    async fn summarize(&self, query: &Query) -> NexusResult<Summary> {
        Ok(Summary::new(query.resource.clone(), self.items.len() as u64))
    }
}

#[async_trait]
impl PageSource for VecListing<JobRef> {
    type Item = JobRef;

    async fn fetch_page(&self, _query: &Query, cursor: &PageCursor) -> NexusResult<Page<JobRef>> {
        self.page_fetches.fetch_add(1, Ordering::SeqCst);
        Ok(page_of(&self.items, cursor))
    }

    async fn count(&self, _query: &Query) -> NexusResult<u64> {
        self.count_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.items.len() as u64)
    }

    async fn summarize(&self, query: &Query) -> NexusResult<Summary> {
        let mut summary = Summary::zeroed_jobs(query.resource.clone());
        summary.total_count = self.items.len() as u64;
        for job in &self.items {
            *summary.status_counts.entry(job.status).or_default() += 1;
        }
        Ok(summary)
    }
}
