//! Paginated listings over the Nexus REST API.

use std::marker::PhantomData;

use async_trait::async_trait;
use qnx_core::{
    JobRef, NexusResult, Page, PageCursor, PageSource, ProjectRef, Query, StatusKind, Summary,
};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::api::NexusClient;
use crate::error::ClientResult;
use crate::models::{CountResponse, Document, JobResource, ProjectResource};

/// Statuses the jobs endpoint can filter on.
const FILTERABLE_STATUSES: [StatusKind; 6] = [
    StatusKind::Completed,
    StatusKind::Queued,
    StatusKind::Submitted,
    StatusKind::Running,
    StatusKind::Cancelled,
    StatusKind::Errored,
];

/// A resource that can be listed.
pub trait ListingResource: Send + Sync + Sized + 'static {
    /// Wire representation of one item.
    type Wire: DeserializeOwned + Send;

    /// Convert one wire item.
    fn from_wire(wire: Self::Wire) -> ClientResult<Self>;

    /// Whether summaries break the total down by status.
    fn counts_by_status() -> bool {
        false
    }
}

impl ListingResource for JobRef {
    type Wire = JobResource;

    fn from_wire(wire: JobResource) -> ClientResult<Self> {
        JobRef::try_from(wire)
    }

    fn counts_by_status() -> bool {
        true
    }
}

impl ListingResource for ProjectRef {
    type Wire = ProjectResource;

    fn from_wire(wire: ProjectResource) -> ClientResult<Self> {
        ProjectRef::try_from(wire)
    }
}

/// [`PageSource`] backed by a collection endpoint.
pub struct Listing<R> {
    client: NexusClient,
    _resource: PhantomData<fn() -> R>,
}

impl<R> Listing<R> {
    pub fn new(client: NexusClient) -> Self {
        Self {
            client,
            _resource: PhantomData,
        }
    }
}

impl<R> std::fmt::Debug for Listing<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listing")
            .field("base_url", &self.client.base_url())
            .finish()
    }
}

impl<R: ListingResource> Listing<R> {
    async fn count_matching(&self, query: &Query) -> ClientResult<u64> {
        let response: CountResponse = self
            .client
            .get_json(&format!("{}/meta/count", query.path), &query.to_params())
            .await?;
        Ok(response.count)
    }
}

#[async_trait]
impl<R: ListingResource> PageSource for Listing<R> {
    type Item = R;

    async fn fetch_page(&self, query: &Query, cursor: &PageCursor) -> NexusResult<Page<R>> {
        let mut params = query.to_params();
        params.extend(cursor.to_params());

        debug!(resource = %query.resource, page = cursor.number, "Fetching page");
        let doc: Document<Vec<R::Wire>> = self.client.get_json(&query.path, &params).await?;

        let next = (!doc.is_last_page()).then(|| cursor.next());
        let items = doc
            .data
            .into_iter()
            .map(R::from_wire)
            .collect::<ClientResult<Vec<_>>>()?;
        Ok(Page::new(items, next))
    }

    async fn count(&self, query: &Query) -> NexusResult<u64> {
        Ok(self.count_matching(query).await?)
    }

    async fn summarize(&self, query: &Query) -> NexusResult<Summary> {
        let total = self.count_matching(query).await?;
        if !R::counts_by_status() {
            return Ok(Summary::new(query.resource.clone(), total));
        }

        // Kinds the endpoint cannot filter on stay at zero.
        let mut summary = Summary::zeroed_jobs(query.resource.clone());
        summary.total_count = total;
        for status in FILTERABLE_STATUSES {
            // Outside an explicit status filter nothing can match.
            if query.job_status.is_empty() || query.job_status.contains(&status) {
                let count = self.count_matching(&query.with_only_status(status)).await?;
                summary.status_counts.insert(status, count);
            }
        }
        Ok(summary)
    }
}
