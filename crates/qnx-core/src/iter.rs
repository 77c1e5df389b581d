//! Lazy, restartable iteration over paginated listings.

use std::collections::VecDeque;
use std::sync::Arc;

use futures::Stream;
use futures::stream;
use tracing::debug;

use crate::error::{NexusError, NexusResult};
use crate::query::{PageCursor, Query, Summary};
use crate::retry::RetryPolicy;
use crate::table::{Table, Tabular};
use crate::transport::PageSource;

/// Iterator over a remote listing.
///
/// Pages are fetched on demand, one at a time, when the buffer runs dry.
/// Only the current page is held. Once the listing is exhausted
/// [`ResultIter::next_item`] keeps returning `None` until
/// [`ResultIter::restart`] is called; [`ResultIter::list`] and
/// [`ResultIter::table`] restart on their own.
///
/// A failed fetch leaves the cursor where it was, so the next call retries
/// the same page.
pub struct ResultIter<S: PageSource> {
    source: Arc<S>,
    query: Query,
    cursor: PageCursor,
    buffer: VecDeque<S::Item>,
    exhausted: bool,
    retry: RetryPolicy,
}

impl<S: PageSource> std::fmt::Debug for ResultIter<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultIter")
            .field("resource", &self.query.resource)
            .field("cursor", &self.cursor)
            .field("buffered", &self.buffer.len())
            .field("exhausted", &self.exhausted)
            .finish()
    }
}

impl<S: PageSource> ResultIter<S> {
    pub fn new(source: Arc<S>, query: Query) -> Self {
        let cursor = query.first_page();
        Self {
            source,
            query,
            cursor,
            buffer: VecDeque::new(),
            exhausted: false,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    /// Cursor of the next page to fetch.
    pub fn cursor(&self) -> PageCursor {
        self.cursor
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted && self.buffer.is_empty()
    }

    /// Next item, or `None` at the end of the listing.
    pub async fn next_item(&mut self) -> NexusResult<Option<S::Item>> {
        loop {
            if let Some(item) = self.buffer.pop_front() {
                return Ok(Some(item));
            }
            if self.exhausted {
                return Ok(None);
            }
            self.fetch_next_page().await?;
        }
    }

    async fn fetch_next_page(&mut self) -> NexusResult<()> {
        let source = &self.source;
        let query = &self.query;
        let cursor = &self.cursor;
        let page = self
            .retry
            .run("fetch_page", || source.fetch_page(query, cursor))
            .await?;

        debug!(
            resource = %self.query.resource,
            page = self.cursor.number,
            items = page.items.len(),
            last = page.next.is_none(),
            "Fetched page"
        );

        if page.items.is_empty() {
            self.exhausted = true;
        } else {
            match page.next {
                Some(next) => self.cursor = next,
                None => self.exhausted = true,
            }
        }
        self.buffer.extend(page.items);
        Ok(())
    }

    /// Number of items matching the query. Does not move the cursor.
    pub async fn count(&self) -> NexusResult<u64> {
        let source = &self.source;
        let query = &self.query;
        self.retry.run("count", || source.count(query)).await
    }

    /// Drain every remaining item from the current position.
    ///
    /// On an exhausted iterator the query is re-issued from the first page,
    /// so repeated calls return the whole listing again.
    pub async fn list(&mut self) -> NexusResult<Vec<S::Item>> {
        if self.is_exhausted() {
            self.restart();
        }
        let mut items = Vec::new();
        while let Some(item) = self.next_item().await? {
            items.push(item);
        }
        Ok(items)
    }

    /// Server-computed aggregate over the whole query, independent of the
    /// cursor.
    pub async fn summarize(&self) -> NexusResult<Summary> {
        let source = &self.source;
        let query = &self.query;
        self.retry.run("summarize", || source.summarize(query)).await
    }

    /// The remaining items as a table, with the same restart rule as
    /// [`ResultIter::list`]. An empty listing still has columns.
    pub async fn table(&mut self) -> NexusResult<Table>
    where
        S::Item: Tabular,
    {
        let items = self.list().await?;
        Ok(Table::from_items(&items))
    }

    /// The single item matching the query.
    ///
    /// Fails with [`NexusError::ZeroMatches`] or [`NexusError::NoUniqueMatch`]
    /// otherwise. Reads from a fresh cursor; this iterator's position is
    /// untouched.
    pub async fn try_unique_match(&self) -> NexusResult<S::Item> {
        match self.count().await? {
            0 => return Err(NexusError::ZeroMatches),
            1 => {}
            n => return Err(NexusError::NoUniqueMatch(n)),
        }

        let source = &self.source;
        let query = &self.query;
        let first = query.first_page();
        let first = &first;
        let page = self
            .retry
            .run("fetch_page", || source.fetch_page(query, first))
            .await?;
        page.items.into_iter().next().ok_or(NexusError::ZeroMatches)
    }

    /// Rewind to the first page, discarding any buffered items.
    pub fn restart(&mut self) {
        self.cursor = self.query.first_page();
        self.buffer.clear();
        self.exhausted = false;
    }

    /// Adapt into a [`Stream`]. The stream ends after the first error.
    pub fn into_stream(self) -> impl Stream<Item = NexusResult<S::Item>> {
        stream::unfold(Some(self), |state| async move {
            let mut iter = state?;
            match iter.next_item().await {
                Ok(Some(item)) => Some((Ok(item), Some(iter))),
                Ok(None) => None,
                Err(e) => Some((Err(e), None)),
            }
        })
    }
}
