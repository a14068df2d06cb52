//! Read helpers shared by every queryable source.
//!
//! A source implements [`Repository::source`]; the list, lookup and page
//! helpers are provided on top of the [`Queryable`] capability. Dynamic
//! variants compile a [`DynamicQuery`] first, then narrow it with an optional
//! caller predicate.

use async_trait::async_trait;
use querykit::{Compiler, DynamicQuery, OrderBy, Predicate};
use tokio_util::sync::CancellationToken;

use crate::errors::{PageError, QueryError};
use crate::memory::{MemoryQuery, MemoryStore};
use crate::page::{Page, PageRequest};
use crate::pager::{cancellable, paginate, paginate_async};
use crate::query::{AsyncQueryable, Queryable, QueryableExt};

pub type Item<R> = <<R as Repository>::Query as Queryable>::Item;

pub trait Repository {
    type Query: Queryable;

    /// A query over every record of the source.
    fn source(&self) -> Self::Query;

    /// Compiler used by the dynamic helpers; unbounded unless overridden.
    fn compiler(&self) -> Compiler {
        Compiler::default()
    }

    /// First record matching `predicate`.
    ///
    /// # Errors
    /// Returns `QueryError::Bind` if the predicate does not fit the record type.
    fn get(&self, predicate: &Predicate) -> Result<Option<Item<Self>>, QueryError> {
        let rows = self.source().filter(predicate)?.take(1).materialize()?;
        Ok(rows.into_iter().next())
    }

    /// Filter, order, then keep at most `size` records.
    ///
    /// # Errors
    /// Returns `QueryError::Bind` if a field does not fit the record type.
    fn get_list(
        &self,
        predicate: Option<&Predicate>,
        order: Option<&OrderBy>,
        size: Option<u64>,
    ) -> Result<Vec<Item<Self>>, QueryError> {
        ordered(self.source(), predicate, order)?.take_opt(size).materialize()
    }

    /// Filter, order, then slice page `index` (1-based) of `size` records.
    ///
    /// # Errors
    /// See [`paginate`].
    fn get_paginated_list(
        &self,
        predicate: Option<&Predicate>,
        order: Option<&OrderBy>,
        index: u64,
        size: u64,
    ) -> Result<Page<Item<Self>>, PageError> {
        let request = PageRequest::one_based(index, size);
        request.offset()?;
        paginate(&ordered(self.source(), predicate, order)?, request)
    }

    /// Apply a dynamic request and an optional extra predicate, then keep at
    /// most `size` records.
    ///
    /// # Errors
    /// `PageError::Validation` for a malformed request, `PageError::Query` if a
    /// field does not fit the record type.
    fn get_dynamic_list(
        &self,
        dynamic: &DynamicQuery,
        predicate: Option<&Predicate>,
        size: Option<u64>,
    ) -> Result<Vec<Item<Self>>, PageError> {
        let query = self.dynamic(dynamic, predicate)?;
        Ok(query.take_opt(size).materialize()?)
    }

    /// Apply a dynamic request and an optional extra predicate, then slice page
    /// `index` (1-based) of `size` records.
    ///
    /// # Errors
    /// See [`Repository::get_dynamic_list`] and [`paginate`].
    fn get_paginated_dynamic_list(
        &self,
        dynamic: &DynamicQuery,
        predicate: Option<&Predicate>,
        index: u64,
        size: u64,
    ) -> Result<Page<Item<Self>>, PageError> {
        let request = PageRequest::one_based(index, size);
        request.offset()?;
        paginate(&self.dynamic(dynamic, predicate)?, request)
    }

    /// The source narrowed by a dynamic request and an optional extra predicate.
    ///
    /// # Errors
    /// See [`Repository::get_dynamic_list`].
    fn dynamic(
        &self,
        dynamic: &DynamicQuery,
        predicate: Option<&Predicate>,
    ) -> Result<Self::Query, PageError> {
        let compiled = self.compiler().compile_dynamic(dynamic)?;
        Ok(self.source().apply(&compiled)?.filter_opt(predicate)?)
    }
}

fn ordered<Q: Queryable>(
    query: Q,
    predicate: Option<&Predicate>,
    order: Option<&OrderBy>,
) -> Result<Q, QueryError> {
    let query = query.filter_opt(predicate)?;
    match order {
        Some(order) => query.order(order),
        None => Ok(query),
    }
}

/// Suspending variants of the [`Repository`] helpers.
///
/// Each helper races the source against `cancel` and returns
/// `PageError::Cancelled` instead of a partial result.
#[async_trait]
pub trait AsyncRepository: Repository<Query: AsyncQueryable> + Sync {
    /// # Errors
    /// See [`Repository::get`]; also `PageError::Cancelled`.
    async fn get_async(
        &self,
        predicate: &Predicate,
        cancel: &CancellationToken,
    ) -> Result<Option<Item<Self>>, PageError> {
        let query = self.source().filter(predicate)?.take(1);
        let rows = cancellable(cancel, query.materialize_async()).await??;
        Ok(rows.into_iter().next())
    }

    /// # Errors
    /// See [`Repository::get_list`]; also `PageError::Cancelled`.
    async fn get_list_async(
        &self,
        predicate: Option<&Predicate>,
        order: Option<&OrderBy>,
        size: Option<u64>,
        cancel: &CancellationToken,
    ) -> Result<Vec<Item<Self>>, PageError> {
        let query = ordered(self.source(), predicate, order)?.take_opt(size);
        Ok(cancellable(cancel, query.materialize_async()).await??)
    }

    /// # Errors
    /// See [`Repository::get_paginated_list`]; also `PageError::Cancelled`.
    async fn get_paginated_list_async(
        &self,
        predicate: Option<&Predicate>,
        order: Option<&OrderBy>,
        index: u64,
        size: u64,
        cancel: &CancellationToken,
    ) -> Result<Page<Item<Self>>, PageError> {
        let request = PageRequest::one_based(index, size);
        request.offset()?;
        let query = ordered(self.source(), predicate, order)?;
        paginate_async(&query, request, cancel).await
    }

    /// # Errors
    /// See [`Repository::get_dynamic_list`]; also `PageError::Cancelled`.
    async fn get_dynamic_list_async(
        &self,
        dynamic: &DynamicQuery,
        predicate: Option<&Predicate>,
        size: Option<u64>,
        cancel: &CancellationToken,
    ) -> Result<Vec<Item<Self>>, PageError> {
        let query = self.dynamic(dynamic, predicate)?.take_opt(size);
        Ok(cancellable(cancel, query.materialize_async()).await??)
    }

    /// # Errors
    /// See [`Repository::get_paginated_dynamic_list`]; also `PageError::Cancelled`.
    async fn get_paginated_dynamic_list_async(
        &self,
        dynamic: &DynamicQuery,
        predicate: Option<&Predicate>,
        index: u64,
        size: u64,
        cancel: &CancellationToken,
    ) -> Result<Page<Item<Self>>, PageError> {
        let request = PageRequest::one_based(index, size);
        request.offset()?;
        let query = self.dynamic(dynamic, predicate)?;
        paginate_async(&query, request, cancel).await
    }
}

impl<T: Clone + 'static> Repository for MemoryStore<T> {
    type Query = MemoryQuery<T>;

    fn source(&self) -> MemoryQuery<T> {
        self.query()
    }
}

impl<T: Clone + Send + Sync + 'static> AsyncRepository for MemoryStore<T> {}
