//! Predicate expression tree and the AND/OR/NOT combinator.
//!
//! A predicate is a [`Lambda`]: one record placeholder ([`Param`]) plus a boolean
//! body ([`Expr`]) whose field accesses name that placeholder. Every lambda built
//! with [`Lambda::new`] gets a fresh placeholder, so two independently built
//! lambdas never share one. [`Lambda::and`] and [`Lambda::or`] therefore rewrite
//! the right operand's placeholder to the left operand's before joining the bodies.
//!
//! # Example
//!
//! ```rust
//! use querykit::Lambda;
//!
//! let adult = Lambda::new(|x| x.field("age").ge(18));
//! let active = Lambda::new(|y| y.field("active").eq(true));
//!
//! let both = adult.and(active);
//! assert_eq!(both.to_string(), "np(age) >= 18 and np(active) == true");
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::errors::BindError;
use crate::value::Value;

static NEXT_PARAM: AtomicU64 = AtomicU64::new(0);

/// Placeholder for "the record being tested".
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Param(u64);

impl Param {
    /// Allocate a placeholder that no other lambda uses.
    #[must_use]
    pub fn fresh() -> Self {
        Param(NEXT_PARAM.fetch_add(1, Ordering::Relaxed))
    }

    #[must_use]
    pub fn id(self) -> u64 {
        self.0
    }

    /// Field access through this placeholder.
    #[must_use]
    pub fn field(self, path: impl Into<String>) -> FieldAccess {
        FieldAccess {
            param: self,
            path: path.into(),
        }
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }
}

/// String containment functions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StringFn {
    StartsWith,
    EndsWith,
    Contains,
}

impl StringFn {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            StringFn::StartsWith => "StartsWith",
            StringFn::EndsWith => "EndsWith",
            StringFn::Contains => "Contains",
        }
    }

    #[must_use]
    pub fn apply(self, haystack: &str, needle: &str) -> bool {
        match self {
            StringFn::StartsWith => haystack.starts_with(needle),
            StringFn::EndsWith => haystack.ends_with(needle),
            StringFn::Contains => haystack.contains(needle),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Const(bool),
    Literal(Value),
    /// Positional reference into the value list of a compiled predicate.
    Slot(usize),
    /// Null-propagating field access on a placeholder.
    Field {
        param: Param,
        path: String,
    },
    Compare(Box<Expr>, CompareOp, Box<Expr>),
    Call(StringFn, Box<Expr>, Box<Expr>),
    /// Negated string call that stays unknown when either operand is null.
    ///
    /// `Not(Call(..))` is plain boolean negation and holds for a null target;
    /// this form never matches one.
    NotCall(StringFn, Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
}

impl Expr {
    #[must_use]
    pub fn compare(lhs: Expr, op: CompareOp, rhs: Expr) -> Expr {
        Expr::Compare(Box::new(lhs), op, Box::new(rhs))
    }

    #[must_use]
    pub fn call(func: StringFn, target: Expr, arg: Expr) -> Expr {
        Expr::Call(func, Box::new(target), Box::new(arg))
    }

    #[must_use]
    pub fn not_call(func: StringFn, target: Expr, arg: Expr) -> Expr {
        Expr::NotCall(func, Box::new(target), Box::new(arg))
    }

    /// Combine two expressions with AND: `expr1 and expr2`
    #[must_use]
    pub fn and(self, other: Expr) -> Expr {
        Expr::And(Box::new(self), Box::new(other))
    }

    /// Combine two expressions with OR: `expr1 or expr2`
    #[must_use]
    pub fn or(self, other: Expr) -> Expr {
        Expr::Or(Box::new(self), Box::new(other))
    }

    /// Negate an expression: `!expr`
    #[must_use]
    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Expr {
        !self
    }

    /// Replace every reference to `from` with `to`, leaving everything else as is.
    #[must_use]
    pub fn replace_param(self, from: Param, to: Param) -> Expr {
        match self {
            Expr::Field { param, path } if param == from => Expr::Field { param: to, path },
            Expr::Compare(l, op, r) => Expr::Compare(
                Box::new(l.replace_param(from, to)),
                op,
                Box::new(r.replace_param(from, to)),
            ),
            Expr::Call(func, target, arg) => Expr::Call(
                func,
                Box::new(target.replace_param(from, to)),
                Box::new(arg.replace_param(from, to)),
            ),
            Expr::NotCall(func, target, arg) => Expr::NotCall(
                func,
                Box::new(target.replace_param(from, to)),
                Box::new(arg.replace_param(from, to)),
            ),
            Expr::And(l, r) => Expr::And(
                Box::new(l.replace_param(from, to)),
                Box::new(r.replace_param(from, to)),
            ),
            Expr::Or(l, r) => Expr::Or(
                Box::new(l.replace_param(from, to)),
                Box::new(r.replace_param(from, to)),
            ),
            Expr::Not(inner) => Expr::Not(Box::new(inner.replace_param(from, to))),
            other @ (Expr::Const(_) | Expr::Literal(_) | Expr::Slot(_) | Expr::Field { .. }) => {
                other
            }
        }
    }

    /// Replace positional slots with the literal values they refer to.
    ///
    /// # Errors
    /// Returns `BindError::UnknownSlot` if a slot has no value in `values`.
    pub fn inline_slots(self, values: &[Option<Value>]) -> Result<Expr, BindError> {
        Ok(match self {
            Expr::Slot(i) => match values.get(i) {
                Some(Some(v)) => Expr::Literal(v.clone()),
                _ => return Err(BindError::UnknownSlot(i)),
            },
            Expr::Compare(l, op, r) => Expr::Compare(
                Box::new(l.inline_slots(values)?),
                op,
                Box::new(r.inline_slots(values)?),
            ),
            Expr::Call(func, target, arg) => Expr::Call(
                func,
                Box::new(target.inline_slots(values)?),
                Box::new(arg.inline_slots(values)?),
            ),
            Expr::NotCall(func, target, arg) => Expr::NotCall(
                func,
                Box::new(target.inline_slots(values)?),
                Box::new(arg.inline_slots(values)?),
            ),
            Expr::And(l, r) => Expr::And(
                Box::new(l.inline_slots(values)?),
                Box::new(r.inline_slots(values)?),
            ),
            Expr::Or(l, r) => Expr::Or(
                Box::new(l.inline_slots(values)?),
                Box::new(r.inline_slots(values)?),
            ),
            Expr::Not(inner) => Expr::Not(Box::new(inner.inline_slots(values)?)),
            other @ (Expr::Const(_) | Expr::Literal(_) | Expr::Field { .. }) => other,
        })
    }

    /// Visit every placeholder referenced anywhere in the expression.
    pub fn for_each_param(&self, f: &mut impl FnMut(Param)) {
        match self {
            Expr::Field { param, .. } => f(*param),
            Expr::Compare(l, _, r)
            | Expr::Call(_, l, r)
            | Expr::NotCall(_, l, r)
            | Expr::And(l, r)
            | Expr::Or(l, r) => {
                l.for_each_param(f);
                r.for_each_param(f);
            }
            Expr::Not(inner) => inner.for_each_param(f),
            Expr::Const(_) | Expr::Literal(_) | Expr::Slot(_) => {}
        }
    }

    fn fmt_operand(&self, f: &mut fmt::Formatter<'_>, parent_is_and: bool) -> fmt::Result {
        match self {
            // same operator chains flatten; the other one needs grouping
            Expr::And(..) if parent_is_and => write!(f, "{self}"),
            Expr::Or(..) if !parent_is_and => write!(f, "{self}"),
            Expr::And(..) | Expr::Or(..) => write!(f, "({self})"),
            _ => write!(f, "{self}"),
        }
    }
}

impl std::ops::Not for Expr {
    type Output = Expr;

    fn not(self) -> Self::Output {
        Expr::Not(Box::new(self))
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Const(b) => write!(f, "{b}"),
            Expr::Literal(v) => write!(f, "{v}"),
            Expr::Slot(i) => write!(f, "@{i}"),
            Expr::Field { path, .. } => write!(f, "np({path})"),
            Expr::Compare(l, op, r) => write!(f, "{l} {} {r}", op.symbol()),
            Expr::Call(func, target, arg) => write!(f, "{target}.{}({arg})", func.name()),
            Expr::NotCall(func, target, arg) => write!(f, "!{target}.{}({arg})", func.name()),
            Expr::And(l, r) => {
                l.fmt_operand(f, true)?;
                f.write_str(" and ")?;
                r.fmt_operand(f, true)
            }
            Expr::Or(l, r) => {
                l.fmt_operand(f, false)?;
                f.write_str(" or ")?;
                r.fmt_operand(f, false)
            }
            Expr::Not(inner) => match inner.as_ref() {
                Expr::Call(..) | Expr::Field { .. } | Expr::Const(_) => write!(f, "!{inner}"),
                _ => write!(f, "!({inner})"),
            },
        }
    }
}

/// Builder for comparisons against one field of a placeholder.
#[derive(Clone, Debug)]
pub struct FieldAccess {
    param: Param,
    path: String,
}

impl FieldAccess {
    fn into_expr(self) -> Expr {
        Expr::Field {
            param: self.param,
            path: self.path,
        }
    }

    fn compare(self, op: CompareOp, value: impl Into<Value>) -> Expr {
        Expr::compare(self.into_expr(), op, Expr::Literal(value.into()))
    }

    /// `field == value`
    #[must_use]
    pub fn eq(self, value: impl Into<Value>) -> Expr {
        self.compare(CompareOp::Eq, value)
    }

    /// `field != value`
    #[must_use]
    pub fn ne(self, value: impl Into<Value>) -> Expr {
        self.compare(CompareOp::Ne, value)
    }

    #[must_use]
    pub fn lt(self, value: impl Into<Value>) -> Expr {
        self.compare(CompareOp::Lt, value)
    }

    #[must_use]
    pub fn le(self, value: impl Into<Value>) -> Expr {
        self.compare(CompareOp::Le, value)
    }

    #[must_use]
    pub fn gt(self, value: impl Into<Value>) -> Expr {
        self.compare(CompareOp::Gt, value)
    }

    #[must_use]
    pub fn ge(self, value: impl Into<Value>) -> Expr {
        self.compare(CompareOp::Ge, value)
    }

    /// `field == null`
    #[must_use]
    pub fn is_null(self) -> Expr {
        self.compare(CompareOp::Eq, Value::Null)
    }

    /// `field != null`
    #[must_use]
    pub fn is_not_null(self) -> Expr {
        self.compare(CompareOp::Ne, Value::Null)
    }

    #[must_use]
    pub fn contains(self, needle: &str) -> Expr {
        Expr::call(StringFn::Contains, self.into_expr(), Expr::Literal(needle.into()))
    }

    #[must_use]
    pub fn starts_with(self, prefix: &str) -> Expr {
        Expr::call(StringFn::StartsWith, self.into_expr(), Expr::Literal(prefix.into()))
    }

    #[must_use]
    pub fn ends_with(self, suffix: &str) -> Expr {
        Expr::call(StringFn::EndsWith, self.into_expr(), Expr::Literal(suffix.into()))
    }
}

/// A single-placeholder boolean predicate.
#[derive(Clone, Debug, PartialEq)]
pub struct Lambda {
    param: Param,
    body: Expr,
}

impl Lambda {
    /// Build a lambda over a fresh placeholder.
    #[must_use]
    pub fn new(build: impl FnOnce(Param) -> Expr) -> Self {
        let param = Param::fresh();
        Self {
            param,
            body: build(param),
        }
    }

    #[must_use]
    pub fn from_parts(param: Param, body: Expr) -> Self {
        Self { param, body }
    }

    /// Predicate that holds for every record.
    #[must_use]
    pub fn always() -> Self {
        Self::new(|_| Expr::Const(true))
    }

    /// Predicate that holds for no record.
    #[must_use]
    pub fn never() -> Self {
        Self::new(|_| Expr::Const(false))
    }

    #[must_use]
    pub fn param(&self) -> Param {
        self.param
    }

    #[must_use]
    pub fn body(&self) -> &Expr {
        &self.body
    }

    #[must_use]
    pub fn into_parts(self) -> (Param, Expr) {
        (self.param, self.body)
    }

    /// Logical AND evaluated against the same record.
    ///
    /// The result keeps `self`'s placeholder.
    #[must_use]
    pub fn and(self, other: Lambda) -> Lambda {
        let rhs = other.body.replace_param(other.param, self.param);
        Lambda {
            param: self.param,
            body: self.body.and(rhs),
        }
    }

    /// Logical OR evaluated against the same record.
    ///
    /// The result keeps `self`'s placeholder.
    #[must_use]
    pub fn or(self, other: Lambda) -> Lambda {
        let rhs = other.body.replace_param(other.param, self.param);
        Lambda {
            param: self.param,
            body: self.body.or(rhs),
        }
    }

    /// Logical negation; keeps the placeholder.
    ///
    /// Two-valued: a record the predicate does not match (null fields included)
    /// matches the negation.
    #[must_use]
    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Lambda {
        !self
    }
}

impl std::ops::Not for Lambda {
    type Output = Lambda;

    fn not(self) -> Self::Output {
        Lambda {
            param: self.param,
            body: !self.body,
        }
    }
}

impl fmt::Display for Lambda {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.body)
    }
}
