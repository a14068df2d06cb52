//! Error types for compiling and binding dynamic queries.
//!
//! - [`ValidationError`]: the request itself is malformed (raised by the compiler,
//!   before any data source is touched).
//! - [`BindError`]: a compiled predicate or ordering cannot be resolved against a
//!   record type (unknown field, foreign placeholder, type mismatch). Data sources
//!   surface these as their own errors.

use thiserror::Error;

use crate::expr::Param;
use crate::schema::FieldKind;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid field: field name must not be empty")]
    InvalidField,

    #[error("invalid operator: {0:?}")]
    InvalidOperator(String),

    #[error("invalid logic {logic:?} on field {field}: expected \"and\" or \"or\"")]
    InvalidLogic {
        field: String,
        logic: Option<String>,
    },

    #[error("operator {operator} on field {field} requires a value")]
    MissingValue { field: String, operator: String },

    #[error("operator {operator} on field {field} does not take a value")]
    UnexpectedValue { field: String, operator: String },

    #[error("invalid sort field: field name must not be empty")]
    InvalidSortField,

    #[error("invalid sort direction {0:?}: expected \"asc\" or \"desc\"")]
    InvalidSortDirection(String),

    #[error("filter nesting exceeds maximum depth of {0}")]
    TooDeep(usize),

    #[error("filter exceeds maximum of {0} conditions")]
    TooManyConditions(usize),

    #[error("too many sort fields (max: {0})")]
    TooManySortFields(usize),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BindError {
    #[error("unknown field: {0}")]
    UnknownField(String),

    #[error("placeholder {found} is not bound by this predicate (expected {expected})")]
    UnboundParameter { expected: Param, found: Param },

    #[error("no value bound for positional slot @{0}")]
    UnknownSlot(usize),

    #[error("type mismatch for field {field}: expected {expected}, got {got}")]
    TypeMismatch {
        field: String,
        expected: FieldKind,
        got: &'static str,
    },

    #[error("unsupported expression: {0}")]
    UnsupportedExpression(&'static str),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValueError {
    #[error("value must be a scalar, got {0}")]
    NonScalar(&'static str),

    #[error("invalid number: {0}")]
    InvalidNumber(String),
}
