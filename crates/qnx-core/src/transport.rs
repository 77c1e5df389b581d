//! Traits the watcher and the query layer consume.
//!
//! Implementations live in the transport crate; tests use in-memory mocks.

use async_trait::async_trait;

use crate::error::NexusResult;
use crate::job::{JobId, JobStatus};
use crate::query::{Page, PageCursor, Query, Summary};

/// Point-in-time status lookups (HTTP polling).
#[async_trait]
pub trait StatusSource: Send + Sync {
    /// Fetch the current status of a job.
    ///
    /// Transient failures are reported as [`crate::NexusError::Transient`];
    /// retrying is the caller's job.
    async fn fetch_status(&self, job_id: &JobId) -> NexusResult<JobStatus>;
}

/// Push-based status updates (websocket).
#[async_trait]
pub trait StatusChannel: Send + Sync {
    /// Open a subscription scoped to one job.
    async fn subscribe(&self, job_id: &JobId) -> NexusResult<Box<dyn StatusSubscription>>;
}

/// An open status subscription.
#[async_trait]
pub trait StatusSubscription: Send {
    /// Next status event in server order.
    ///
    /// `None` means the channel closed. `Some(Err(_))` reports a frame or
    /// protocol error; the subscription should be considered lost.
    async fn next_status(&mut self) -> Option<NexusResult<JobStatus>>;

    /// Close the subscription. Safe to call more than once.
    async fn close(&mut self);
}

/// A paginated remote listing.
#[async_trait]
pub trait PageSource: Send + Sync {
    type Item: Send;

    /// Fetch the page at `cursor`.
    async fn fetch_page(&self, query: &Query, cursor: &PageCursor)
    -> NexusResult<Page<Self::Item>>;

    /// Total number of items matching `query`.
    async fn count(&self, query: &Query) -> NexusResult<u64>;

    /// Server-computed aggregate over the whole of `query`.
    async fn summarize(&self, query: &Query) -> NexusResult<Summary>;
}
