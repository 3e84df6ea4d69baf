//! Page-number driven retrieval of collections.
//!
//! Both services paginate with `page` (1-based) plus a page size and signal the
//! end of a collection with a short page. A failure on any page aborts the whole
//! listing: a partial list would make the identity map believe items are
//! missing and produce duplicates.

use std::future::Future;

use futures::stream::{self, Stream, TryStreamExt};
use tracing::debug;

use crate::error::{Result, SyncError};

/// Page size used for every source listing.
pub const SOURCE_PAGE_SIZE: u32 = 100;

/// Page size used for every destination listing.
pub const DESTINATION_PAGE_SIZE: u32 = 50;

/// Lazy paginated listing over a page-fetching function.
///
/// The paginator holds no cursor of its own, so every call to
/// [`Paginator::stream`] restarts from page 1.
pub struct Paginator<F> {
    page_size: u32,
    fetch_page: F,
}

impl<F, Fut, T> Paginator<F>
where
    F: Fn(u32) -> Fut,
    Fut: Future<Output = Result<Vec<T>>>,
{
    /// Create a paginator requesting `page_size` items per page.
    pub fn new(page_size: u32, fetch_page: F) -> Self {
        Self {
            page_size,
            fetch_page,
        }
    }

    /// Stream every item of the collection, fetching pages on demand.
    pub fn stream(&self) -> impl Stream<Item = Result<T>> + '_ {
        stream::try_unfold((1u32, false), move |(page, done)| async move {
            if done {
                return Ok::<_, SyncError>(None);
            }

            let items = (self.fetch_page)(page)
                .await
                .map_err(|e| SyncError::fetch(page, e))?;
            let last = items.len() < self.page_size as usize;
            debug!(page, count = items.len(), last, "Fetched page");

            Ok(Some((
                stream::iter(items.into_iter().map(Ok::<T, SyncError>)),
                (page + 1, last),
            )))
        })
        .try_flatten()
    }

    /// Drain the whole collection into memory.
    pub async fn collect_all(&self) -> Result<Vec<T>> {
        self.stream().try_collect().await
    }
}

/// Fetch every page of a collection.
pub async fn fetch_all<T, F, Fut>(page_size: u32, fetch_page: F) -> Result<Vec<T>>
where
    F: Fn(u32) -> Fut,
    Fut: Future<Output = Result<Vec<T>>>,
{
    Paginator::new(page_size, fetch_page).collect_all().await
}
