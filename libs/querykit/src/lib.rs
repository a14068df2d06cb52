#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Dynamic filter and sort compilation.
//!
//! A caller sends a [`DynamicQuery`]: a tree of [`Condition`] nodes plus a list of
//! [`Sort`] entries. The [`Compiler`] validates it and produces a
//! [`CompiledQuery`]: a [`Predicate`] with positional value slots and a validated
//! [`OrderBy`]. Predicates bind against a record type through a
//! [`FieldResolver`] and evaluate with null-propagating semantics.
//!
//! Independently built predicates compose with [`Lambda::and`], [`Lambda::or`]
//! and `!`, which keep a single record placeholder across both operands.
pub mod compiler;
pub mod errors;
pub mod eval;
pub mod expr;
pub mod limits;
pub mod model;
pub mod operator;
pub mod schema;
pub mod value;

pub use compiler::{compile, CompiledQuery, Compiler, Predicate};
pub use errors::{BindError, ValidationError, ValueError};
pub use eval::{BoundOrder, BoundPredicate};
pub use expr::{CompareOp, Expr, FieldAccess, Lambda, Param, StringFn};
pub use limits::QueryLimits;
pub use model::{Condition, DynamicQuery, Logic, OrderBy, OrderKey, Sort, SortDir};
pub use operator::{Operator, OperatorKind};
pub use schema::{Accessor, FieldKind, FieldRegistry, FieldResolver, JsonFields, ResolvedField};
pub use value::Value;
