//! Page slicer: count, then fetch one window.
//!
//! The count and the windowed fetch are two separate executions of the same
//! query; a writer between them can make `total_count` and `items` disagree.
//! The async variant races each step against a [`CancellationToken`] and
//! returns [`PageError::Cancelled`] instead of a partial page.

use std::future::Future;

use tokio_util::sync::CancellationToken;

use crate::errors::PageError;
use crate::page::{Page, PageRequest};
use crate::query::{AsyncQueryable, Queryable};

/// Slice `query` into the page described by `request`.
///
/// # Errors
/// - `PageError::InvalidArgument` if `origin > index` or `size == 0` (before
///   touching the source)
/// - `PageError::Query` if the source fails
pub fn paginate<Q: Queryable>(query: &Q, request: PageRequest) -> Result<Page<Q::Item>, PageError> {
    let offset = request.offset()?;

    let total_count = query.count()?;
    let items = query.clone().skip(offset).take(request.size).materialize()?;

    tracing::debug!(
        index = request.index,
        size = request.size,
        origin = request.origin,
        total_count,
        fetched = items.len(),
        "page fetched"
    );
    Ok(Page::new(request, total_count, items))
}

/// Async [`paginate`] with cancellation.
///
/// # Errors
/// As [`paginate`], plus `PageError::Cancelled` if `cancel` fires first.
pub async fn paginate_async<Q: AsyncQueryable>(
    query: &Q,
    request: PageRequest,
    cancel: &CancellationToken,
) -> Result<Page<Q::Item>, PageError> {
    let offset = request.offset()?;

    let total_count = cancellable(cancel, query.count_async()).await??;
    let window = query.clone().skip(offset).take(request.size);
    let items = cancellable(cancel, window.materialize_async()).await??;

    tracing::debug!(
        index = request.index,
        size = request.size,
        origin = request.origin,
        total_count,
        fetched = items.len(),
        "page fetched"
    );
    Ok(Page::new(request, total_count, items))
}

/// Run `fut` unless `cancel` fires first.
///
/// # Errors
/// Returns `PageError::Cancelled` if the token is (or becomes) cancelled.
pub async fn cancellable<F: Future>(cancel: &CancellationToken, fut: F) -> Result<F::Output, PageError> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => {
            tracing::debug!("query cancelled");
            Err(PageError::Cancelled)
        }
        out = fut => Ok(out),
    }
}
