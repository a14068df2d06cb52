//! Page envelope and page request.

use serde::{Deserialize, Serialize};

use crate::errors::PageError;

/// Which page to fetch.
///
/// `origin` is the index the caller calls "first page" (commonly 0 or 1).
/// Missing keys fall back to `index = 1, size = 10, origin = 1`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PageRequest {
    pub index: u64,
    pub size: u64,
    pub origin: u64,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            index: 1,
            size: 10,
            origin: 1,
        }
    }
}

impl PageRequest {
    #[must_use]
    pub fn new(index: u64, size: u64, origin: u64) -> Self {
        Self {
            index,
            size,
            origin,
        }
    }

    /// Page `index` of `size` items with the usual 1-based origin.
    #[must_use]
    pub fn one_based(index: u64, size: u64) -> Self {
        Self::new(index, size, 1)
    }

    /// Number of items to skip before this page.
    ///
    /// # Errors
    /// Returns `PageError::InvalidArgument` if `origin > index`, `size == 0`, or
    /// the offset does not fit in `u64`.
    pub fn offset(&self) -> Result<u64, PageError> {
        if self.origin > self.index {
            return Err(PageError::InvalidArgument(format!(
                "origin {} > index {}, origin must not exceed index",
                self.origin, self.index
            )));
        }
        if self.size == 0 {
            return Err(PageError::InvalidArgument(
                "page size must be greater than zero".to_owned(),
            ));
        }
        (self.index - self.origin)
            .checked_mul(self.size)
            .ok_or_else(|| PageError::InvalidArgument("page offset overflows".to_owned()))
    }
}

/// One page of results plus the totals needed to navigate.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub origin: u64,
    pub index: u64,
    pub size: u64,
    pub total_count: u64,
    pub total_pages: u64,
    pub items: Vec<T>,
    pub has_previous: bool,
    pub has_next: bool,
}

impl<T> Page<T> {
    /// Build the envelope for `request` given the full match count and the
    /// items of the requested window. `request` must have passed
    /// [`PageRequest::offset`].
    #[must_use]
    pub fn new(request: PageRequest, total_count: u64, items: Vec<T>) -> Self {
        let total_pages = total_count.div_ceil(request.size.max(1));
        let position = request.index.saturating_sub(request.origin);
        Self {
            origin: request.origin,
            index: request.index,
            size: request.size,
            total_count,
            total_pages,
            items,
            has_previous: position > 0,
            has_next: position.saturating_add(1) < total_pages,
        }
    }

    #[must_use]
    pub fn map_items<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            origin: self.origin,
            index: self.index,
            size: self.size,
            total_count: self.total_count,
            total_pages: self.total_pages,
            items: self.items.into_iter().map(f).collect(),
            has_previous: self.has_previous,
            has_next: self.has_next,
        }
    }
}
