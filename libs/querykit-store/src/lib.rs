#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Queryable collections and page slicing for `querykit` predicates.
//!
//! - [`Queryable`] / [`AsyncQueryable`]: the capability a data source offers
//!   (filter, order, skip, take, count, materialize)
//! - [`MemoryStore`]: the in-memory source, with keyed mutations
//! - [`paginate`] / [`paginate_async`]: count + windowed fetch into a [`Page`]
//! - [`Repository`] / [`AsyncRepository`]: lookup, list and page helpers
pub mod crud;
pub mod errors;
pub mod memory;
pub mod page;
pub mod pager;
pub mod query;

pub use crud::{AsyncRepository, Item, Repository};
pub use errors::{PageError, QueryError};
pub use memory::{Keyed, MemoryQuery, MemoryStore};
pub use page::{Page, PageRequest};
pub use pager::{cancellable, paginate, paginate_async};
pub use query::{AsyncQueryable, Queryable, QueryableExt};
