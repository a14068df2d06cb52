//! Queryable-collection capability.
//!
//! A query value describes a pipeline over some data source. Combinators
//! (`filter`, `order`, `skip`, `take`) return a new query; `count` and
//! `materialize` execute it. Queries are cheap to clone, so the page slicer can
//! run `count` and the windowed fetch from the same base query.

use async_trait::async_trait;
use querykit::{CompiledQuery, OrderBy, Predicate};

use crate::errors::QueryError;

pub trait Queryable: Clone {
    type Item;

    /// Keep only records the predicate is definitely true for.
    ///
    /// # Errors
    /// Returns `QueryError::Bind` if the predicate cannot be resolved for `Item`.
    fn filter(self, predicate: &Predicate) -> Result<Self, QueryError>;

    /// Sort by `order`; sorting is stable, so earlier orderings break ties.
    ///
    /// # Errors
    /// Returns `QueryError::Bind` if a sort key cannot be resolved for `Item`.
    fn order(self, order: &OrderBy) -> Result<Self, QueryError>;

    #[must_use]
    fn skip(self, n: u64) -> Self;

    #[must_use]
    fn take(self, n: u64) -> Self;

    /// # Errors
    /// Returns a `QueryError` if the source cannot be read.
    fn count(&self) -> Result<u64, QueryError>;

    /// # Errors
    /// Returns a `QueryError` if the source cannot be read.
    fn materialize(&self) -> Result<Vec<Self::Item>, QueryError>;
}

/// Suspending variants of the executing operations.
#[async_trait]
pub trait AsyncQueryable: Queryable<Item: Send> + Send + Sync {
    /// # Errors
    /// See [`Queryable::count`].
    async fn count_async(&self) -> Result<u64, QueryError>;

    /// # Errors
    /// See [`Queryable::materialize`].
    async fn materialize_async(&self) -> Result<Vec<Self::Item>, QueryError>;
}

pub trait QueryableExt: Queryable {
    /// Apply a compiled filter (if any) and ordering (if any).
    ///
    /// # Errors
    /// Returns `QueryError::Bind` if the source cannot resolve a field.
    fn apply(self, compiled: &CompiledQuery) -> Result<Self, QueryError> {
        let query = match &compiled.filter {
            Some(predicate) => self.filter(predicate)?,
            None => self,
        };
        if compiled.order.is_empty() {
            Ok(query)
        } else {
            query.order(&compiled.order)
        }
    }

    /// Apply an optional filter.
    ///
    /// # Errors
    /// See [`Queryable::filter`].
    fn filter_opt(self, predicate: Option<&Predicate>) -> Result<Self, QueryError> {
        match predicate {
            Some(p) => self.filter(p),
            None => Ok(self),
        }
    }

    #[must_use]
    fn take_opt(self, n: Option<u64>) -> Self {
        match n {
            Some(n) => self.take(n),
            None => self,
        }
    }
}

impl<Q: Queryable> QueryableExt for Q {}
