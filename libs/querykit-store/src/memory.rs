//! In-memory queryable collection.
//!
//! Rows live in an `Arc<RwLock<Vec<T>>>`. A [`MemoryQuery`] records a pipeline
//! of bound steps and runs it against the rows under one read lock, so each
//! `count` or `materialize` sees a consistent snapshot. Two executions of the
//! same query (the page slicer's count and fetch) are separate reads.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use querykit::{BoundOrder, BoundPredicate, FieldResolver, OrderBy, Predicate};

use crate::errors::QueryError;
use crate::query::{AsyncQueryable, Queryable};

/// Records that can be found again after they were handed out.
pub trait Keyed {
    type Key: PartialEq + fmt::Debug;

    fn key(&self) -> Self::Key;
}

pub struct MemoryStore<T> {
    rows: Arc<RwLock<Vec<T>>>,
    fields: Arc<dyn FieldResolver<T>>,
}

impl<T> Clone for MemoryStore<T> {
    fn clone(&self) -> Self {
        Self {
            rows: Arc::clone(&self.rows),
            fields: Arc::clone(&self.fields),
        }
    }
}

impl<T> fmt::Debug for MemoryStore<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryStore")
            .field("rows", &self.rows.read().len())
            .finish_non_exhaustive()
    }
}

impl<T: Clone + 'static> MemoryStore<T> {
    #[must_use]
    pub fn new(fields: impl FieldResolver<T> + 'static) -> Self {
        Self::with_rows(fields, Vec::new())
    }

    #[must_use]
    pub fn with_rows(fields: impl FieldResolver<T> + 'static, rows: impl IntoIterator<Item = T>) -> Self {
        Self {
            rows: Arc::new(RwLock::new(rows.into_iter().collect())),
            fields: Arc::new(fields),
        }
    }

    /// A query over every row.
    #[must_use]
    pub fn query(&self) -> MemoryQuery<T> {
        MemoryQuery {
            rows: Arc::clone(&self.rows),
            fields: Arc::clone(&self.fields),
            steps: Vec::new(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }

    #[must_use]
    pub fn snapshot(&self) -> Vec<T> {
        self.rows.read().clone()
    }
}

fn not_found(key: &impl fmt::Debug) -> QueryError {
    QueryError::NotFound(format!("{key:?}"))
}

impl<T: Keyed + Clone + 'static> MemoryStore<T> {
    pub fn add(&self, entity: T) -> T {
        self.rows.write().push(entity.clone());
        entity
    }

    pub fn add_range(&self, entities: impl IntoIterator<Item = T>) -> Vec<T> {
        let entities: Vec<T> = entities.into_iter().collect();
        self.rows.write().extend(entities.iter().cloned());
        entities
    }

    /// Replace the row with the same key.
    ///
    /// # Errors
    /// Returns `QueryError::NotFound` if no row has the entity's key.
    pub fn update(&self, entity: T) -> Result<T, QueryError> {
        let key = entity.key();
        let mut rows = self.rows.write();
        let row = rows
            .iter_mut()
            .find(|r| r.key() == key)
            .ok_or_else(|| not_found(&key))?;
        *row = entity.clone();
        Ok(entity)
    }

    /// Replace several rows; nothing changes unless every key exists.
    ///
    /// # Errors
    /// Returns `QueryError::NotFound` for the first unknown key.
    pub fn update_range(&self, entities: impl IntoIterator<Item = T>) -> Result<Vec<T>, QueryError> {
        let entities: Vec<T> = entities.into_iter().collect();
        let mut rows = self.rows.write();
        let positions = entities
            .iter()
            .map(|e| {
                let key = e.key();
                rows.iter()
                    .position(|r| r.key() == key)
                    .ok_or_else(|| not_found(&key))
            })
            .collect::<Result<Vec<_>, _>>()?;
        for (pos, entity) in positions.into_iter().zip(&entities) {
            if let Some(row) = rows.get_mut(pos) {
                *row = entity.clone();
            }
        }
        Ok(entities)
    }

    /// Remove the row with the entity's key and return it.
    ///
    /// # Errors
    /// Returns `QueryError::NotFound` if no row has the entity's key.
    pub fn delete(&self, entity: &T) -> Result<T, QueryError> {
        let key = entity.key();
        let mut rows = self.rows.write();
        let pos = rows
            .iter()
            .position(|r| r.key() == key)
            .ok_or_else(|| not_found(&key))?;
        Ok(rows.remove(pos))
    }

    /// Remove several rows; nothing changes unless every key exists.
    ///
    /// # Errors
    /// Returns `QueryError::NotFound` for the first unknown key.
    pub fn delete_range<'a>(&self, entities: impl IntoIterator<Item = &'a T>) -> Result<Vec<T>, QueryError>
    where
        T: 'a,
    {
        let keys: Vec<T::Key> = entities.into_iter().map(Keyed::key).collect();
        let mut rows = self.rows.write();
        if let Some(missing) = keys.iter().find(|k| !rows.iter().any(|r| r.key() == **k)) {
            return Err(not_found(missing));
        }
        Ok(rows.extract_if(.., |r| keys.contains(&r.key())).collect())
    }
}

impl<T: Keyed + Clone + Send + Sync + 'static> MemoryStore<T> {
    pub async fn add_async(&self, entity: T) -> T {
        tokio::task::yield_now().await;
        self.add(entity)
    }

    pub async fn add_range_async(&self, entities: Vec<T>) -> Vec<T> {
        tokio::task::yield_now().await;
        self.add_range(entities)
    }

    /// # Errors
    /// See [`MemoryStore::update`].
    pub async fn update_async(&self, entity: T) -> Result<T, QueryError> {
        tokio::task::yield_now().await;
        self.update(entity)
    }

    /// # Errors
    /// See [`MemoryStore::update_range`].
    pub async fn update_range_async(&self, entities: Vec<T>) -> Result<Vec<T>, QueryError> {
        tokio::task::yield_now().await;
        self.update_range(entities)
    }

    /// # Errors
    /// See [`MemoryStore::delete`].
    pub async fn delete_async(&self, entity: &T) -> Result<T, QueryError> {
        tokio::task::yield_now().await;
        self.delete(entity)
    }

    /// # Errors
    /// See [`MemoryStore::delete_range`].
    pub async fn delete_range_async(&self, entities: &[T]) -> Result<Vec<T>, QueryError> {
        tokio::task::yield_now().await;
        self.delete_range(entities)
    }
}

enum Step<T> {
    Filter(Arc<BoundPredicate<T>>),
    Order(Arc<BoundOrder<T>>),
    Skip(u64),
    Take(u64),
}

impl<T> Clone for Step<T> {
    fn clone(&self) -> Self {
        match self {
            Step::Filter(p) => Step::Filter(Arc::clone(p)),
            Step::Order(o) => Step::Order(Arc::clone(o)),
            Step::Skip(n) => Step::Skip(*n),
            Step::Take(n) => Step::Take(*n),
        }
    }
}

/// Lazily evaluated pipeline over a [`MemoryStore`].
pub struct MemoryQuery<T> {
    rows: Arc<RwLock<Vec<T>>>,
    fields: Arc<dyn FieldResolver<T>>,
    steps: Vec<Step<T>>,
}

impl<T> Clone for MemoryQuery<T> {
    fn clone(&self) -> Self {
        Self {
            rows: Arc::clone(&self.rows),
            fields: Arc::clone(&self.fields),
            steps: self.steps.clone(),
        }
    }
}

impl<T> fmt::Debug for MemoryQuery<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryQuery")
            .field("steps", &self.steps.len())
            .finish_non_exhaustive()
    }
}

fn clamp(n: u64) -> usize {
    usize::try_from(n).unwrap_or(usize::MAX)
}

impl<T> MemoryQuery<T> {
    fn push(mut self, step: Step<T>) -> Self {
        self.steps.push(step);
        self
    }

    fn select<R>(&self, finish: impl FnOnce(Vec<&T>) -> R) -> R {
        let guard = self.rows.read();
        let mut rows: Vec<&T> = guard.iter().collect();
        for step in &self.steps {
            match step {
                Step::Filter(p) => rows.retain(|r| p.matches(r)),
                Step::Order(o) => rows.sort_by(|a, b| o.compare(a, b)),
                Step::Skip(n) => {
                    let n = clamp(*n).min(rows.len());
                    rows.drain(..n);
                }
                Step::Take(n) => rows.truncate(clamp(*n)),
            }
        }
        finish(rows)
    }
}

impl<T: Clone> Queryable for MemoryQuery<T> {
    type Item = T;

    fn filter(self, predicate: &Predicate) -> Result<Self, QueryError> {
        let bound = predicate.bind(&*self.fields)?;
        Ok(self.push(Step::Filter(Arc::new(bound))))
    }

    fn order(self, order: &OrderBy) -> Result<Self, QueryError> {
        let bound = order.bind(&*self.fields)?;
        Ok(self.push(Step::Order(Arc::new(bound))))
    }

    fn skip(self, n: u64) -> Self {
        self.push(Step::Skip(n))
    }

    fn take(self, n: u64) -> Self {
        self.push(Step::Take(n))
    }

    fn count(&self) -> Result<u64, QueryError> {
        Ok(self.select(|rows| u64::try_from(rows.len()).unwrap_or(u64::MAX)))
    }

    fn materialize(&self) -> Result<Vec<T>, QueryError> {
        Ok(self.select(|rows| rows.into_iter().cloned().collect()))
    }
}

#[async_trait]
impl<T: Clone + Send + Sync> AsyncQueryable for MemoryQuery<T> {
    async fn count_async(&self) -> Result<u64, QueryError> {
        tokio::task::yield_now().await;
        self.count()
    }

    async fn materialize_async(&self) -> Result<Vec<T>, QueryError> {
        tokio::task::yield_now().await;
        self.materialize()
    }
}
