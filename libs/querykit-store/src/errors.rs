use querykit::{BindError, ValidationError};
use thiserror::Error;

/// Errors raised by a queryable collection.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// A predicate or ordering could not be resolved against the record type.
    #[error(transparent)]
    Bind(#[from] BindError),

    #[error("entity not found: {0}")]
    NotFound(String),
}

/// Errors raised by the page slicer and the dynamic list helpers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PageError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error("operation cancelled")]
    Cancelled,
}

impl From<BindError> for PageError {
    fn from(err: BindError) -> Self {
        PageError::Query(QueryError::Bind(err))
    }
}
