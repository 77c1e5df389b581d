//! Core of the Nexus client: job watching and lazy queries.
//!
//! This crate is transport-agnostic. It defines what it needs from the
//! network as traits ([`StatusSource`], [`StatusChannel`], [`PageSource`])
//! and builds two things on top:
//!
//! - [`JobWatcher`] drives a remote job to a terminal (or requested) status.
//!   It listens on a push channel first and falls back to HTTP polling, with
//!   bounded retry on transient failures and a hard deadline.
//! - [`ResultIter`] lazily walks a paginated listing one page at a time,
//!   with `count`, `list`, `summarize` and a tabular view.
//!
//! # Example: Waiting for a Job
//!
//! ```ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//! use qnx_core::{JobHandle, JobKind, JobWatcher, StatusKind, WaitOptions};
//!
//! let watcher = JobWatcher::new(Arc::new(http_source)).with_channel(Arc::new(ws_channel));
//! let handle = JobHandle::new("0c1f...", JobKind::Execute);
//!
//! let options = WaitOptions::default().with_timeout(Duration::from_secs(60));
//! let status = watcher.wait_for(&handle, &options).await?;
//! assert!(status.is_terminal());
//! ```
//!
//! # Example: Listing
//!
//! ```ignore
//! let mut jobs = ResultIter::new(Arc::new(job_listing), query);
//! println!("{} jobs", jobs.count().await?);
//! while let Some(job) = jobs.next_item().await? {
//!     println!("{job}");
//! }
//! ```

pub mod error;
pub mod iter;
pub mod job;
pub mod query;
pub mod resource;
pub mod retry;
pub mod scope;
pub mod table;
pub mod transport;
pub mod watcher;

pub use error::{ErrorCategory, NexusError, NexusResult};
pub use iter::ResultIter;
pub use job::{JobHandle, JobId, JobKind, JobStatus, StatusKind};
pub use query::{
    DEFAULT_PAGE_SIZE, Page, PageCursor, Properties, PropertyValue, Query, ScopeFilter, SortKey,
    Summary,
};
pub use resource::{JobRef, ProjectRef, Timestamps};
pub use retry::RetryPolicy;
pub use scope::{Scope, ScopeGuard, ScopeStack};
pub use table::{Table, Tabular};
pub use transport::{PageSource, StatusChannel, StatusSource, StatusSubscription};
pub use watcher::{DEFAULT_POLL_INTERVAL, DEFAULT_WAIT_TIMEOUT, JobWatcher, WaitOptions};
