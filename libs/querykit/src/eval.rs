//! In-memory evaluation of compiled predicates and orderings.
//!
//! Binding resolves every field path once through a [`FieldResolver`] and turns
//! positional slots into literals. The bound tree is then evaluated per record
//! with three-valued logic: a comparison touching a null field is *unknown*,
//! unknown propagates through `and`/`or` the usual Kleene way, and a record
//! matches only when the whole predicate is definitely true. `not` collapses
//! unknown to false before negating, so `!p` matches exactly the records `p`
//! does not. A negated string call ([`Expr::NotCall`]) stays unknown on nulls.

use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt;

use crate::compiler::Predicate;
use crate::errors::BindError;
use crate::expr::{CompareOp, Expr, Lambda, Param, StringFn};
use crate::model::{OrderBy, SortDir};
use crate::schema::{Accessor, FieldKind, FieldResolver};
use crate::value::Value;

enum Operand<T> {
    Literal(Value),
    Field(Accessor<T>),
}

impl<T> Operand<T> {
    fn read<'a>(&'a self, record: &T) -> Option<Cow<'a, Value>> {
        match self {
            Operand::Literal(Value::Null) => None,
            Operand::Literal(v) => Some(Cow::Borrowed(v)),
            Operand::Field(accessor) => accessor(record).filter(|v| !v.is_null()).map(Cow::Owned),
        }
    }
}

enum Node<T> {
    Const(bool),
    Compare(Operand<T>, CompareOp, Operand<T>),
    NullCheck { operand: Operand<T>, negated: bool },
    Call {
        func: StringFn,
        target: Operand<T>,
        arg: Operand<T>,
        negated: bool,
    },
    And(Box<Node<T>>, Box<Node<T>>),
    Or(Box<Node<T>>, Box<Node<T>>),
    Not(Box<Node<T>>),
}

impl<T> Node<T> {
    fn eval(&self, record: &T) -> Option<bool> {
        match self {
            Node::Const(b) => Some(*b),
            Node::Compare(lhs, op, rhs) => {
                let lhs = lhs.read(record)?;
                let rhs = rhs.read(record)?;
                let ord = lhs.compare(&rhs)?;
                Some(match op {
                    CompareOp::Eq => ord == Ordering::Equal,
                    CompareOp::Ne => ord != Ordering::Equal,
                    CompareOp::Lt => ord == Ordering::Less,
                    CompareOp::Le => ord != Ordering::Greater,
                    CompareOp::Gt => ord == Ordering::Greater,
                    CompareOp::Ge => ord != Ordering::Less,
                })
            }
            Node::NullCheck { operand, negated } => Some(operand.read(record).is_none() != *negated),
            Node::Call {
                func,
                target,
                arg,
                negated,
            } => {
                let target = target.read(record)?;
                let arg = arg.read(record)?;
                Some(func.apply(&target.as_text()?, &arg.as_text()?) != *negated)
            }
            Node::And(l, r) => match (l.eval(record), r.eval(record)) {
                (Some(false), _) | (_, Some(false)) => Some(false),
                (Some(true), Some(true)) => Some(true),
                _ => None,
            },
            Node::Or(l, r) => match (l.eval(record), r.eval(record)) {
                (Some(true), _) | (_, Some(true)) => Some(true),
                (Some(false), Some(false)) => Some(false),
                _ => None,
            },
            Node::Not(inner) => Some(inner.eval(record) != Some(true)),
        }
    }
}

/// A predicate bound to one record type.
pub struct BoundPredicate<T> {
    root: Node<T>,
}

impl<T> BoundPredicate<T> {
    /// `true` only if the predicate is definitely true for `record`.
    #[must_use]
    pub fn matches(&self, record: &T) -> bool {
        self.eval(record) == Some(true)
    }

    /// Three-valued result; `None` means unknown (a null was involved).
    #[must_use]
    pub fn eval(&self, record: &T) -> Option<bool> {
        self.root.eval(record)
    }
}

impl<T> fmt::Debug for BoundPredicate<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundPredicate").finish_non_exhaustive()
    }
}

struct BoundOperand<'e, T> {
    operand: Operand<T>,
    field: Option<(&'e str, Option<FieldKind>)>,
}

struct Binder<'a, R: ?Sized> {
    resolver: &'a R,
    param: Param,
    values: &'a [Option<Value>],
}

impl<R: ?Sized> Binder<'_, R> {
    fn bind<T>(&self, expr: &Expr) -> Result<Node<T>, BindError>
    where
        R: FieldResolver<T>,
    {
        Ok(match expr {
            Expr::Const(b) | Expr::Literal(Value::Bool(b)) => Node::Const(*b),
            Expr::Compare(lhs, op, rhs) => {
                let lhs = self.operand(lhs)?;
                let rhs = self.operand(rhs)?;
                if matches!(op, CompareOp::Eq | CompareOp::Ne) {
                    let negated = *op == CompareOp::Ne;
                    if matches!(rhs.operand, Operand::Literal(Value::Null)) {
                        return Ok(Node::NullCheck {
                            operand: lhs.operand,
                            negated,
                        });
                    }
                    if matches!(lhs.operand, Operand::Literal(Value::Null)) {
                        return Ok(Node::NullCheck {
                            operand: rhs.operand,
                            negated,
                        });
                    }
                }
                check_literal(&lhs, &rhs)?;
                check_literal(&rhs, &lhs)?;
                Node::Compare(lhs.operand, *op, rhs.operand)
            }
            Expr::Call(func, target, arg) => self.call(*func, target, arg, false)?,
            Expr::NotCall(func, target, arg) => self.call(*func, target, arg, true)?,
            Expr::And(l, r) => Node::And(Box::new(self.bind(l)?), Box::new(self.bind(r)?)),
            Expr::Or(l, r) => Node::Or(Box::new(self.bind(l)?), Box::new(self.bind(r)?)),
            Expr::Not(inner) => Node::Not(Box::new(self.bind(inner)?)),
            Expr::Literal(_) | Expr::Slot(_) | Expr::Field { .. } => {
                return Err(BindError::UnsupportedExpression(
                    "a bare value is not a predicate",
                ));
            }
        })
    }

    fn call<T>(
        &self,
        func: StringFn,
        target: &Expr,
        arg: &Expr,
        negated: bool,
    ) -> Result<Node<T>, BindError>
    where
        R: FieldResolver<T>,
    {
        let target = self.operand(target)?;
        let arg = self.operand(arg)?;
        for side in [&target, &arg] {
            if let Some((path, Some(kind))) = side.field
                && kind != FieldKind::String
            {
                return Err(BindError::TypeMismatch {
                    field: path.to_owned(),
                    expected: FieldKind::String,
                    got: "non-string field",
                });
            }
        }
        Ok(Node::Call {
            func,
            target: target.operand,
            arg: arg.operand,
            negated,
        })
    }

    fn operand<'e, T>(&self, expr: &'e Expr) -> Result<BoundOperand<'e, T>, BindError>
    where
        R: FieldResolver<T>,
    {
        match expr {
            Expr::Literal(v) => Ok(BoundOperand {
                operand: Operand::Literal(v.clone()),
                field: None,
            }),
            Expr::Slot(i) => match self.values.get(*i) {
                Some(Some(v)) => Ok(BoundOperand {
                    operand: Operand::Literal(v.clone()),
                    field: None,
                }),
                _ => Err(BindError::UnknownSlot(*i)),
            },
            Expr::Field { param, path } => {
                if *param != self.param {
                    return Err(BindError::UnboundParameter {
                        expected: self.param,
                        found: *param,
                    });
                }
                let resolved = self
                    .resolver
                    .resolve(path)
                    .ok_or_else(|| BindError::UnknownField(path.clone()))?;
                Ok(BoundOperand {
                    operand: Operand::Field(resolved.accessor),
                    field: Some((path.as_str(), resolved.kind)),
                })
            }
            _ => Err(BindError::UnsupportedExpression(
                "operand must be a field or a value",
            )),
        }
    }
}

fn check_literal<T>(field: &BoundOperand<'_, T>, other: &BoundOperand<'_, T>) -> Result<(), BindError> {
    if let (Some((path, Some(kind))), Operand::Literal(value)) = (field.field, &other.operand)
        && !kind.accepts(value)
    {
        return Err(BindError::TypeMismatch {
            field: path.to_owned(),
            expected: kind,
            got: value.type_name(),
        });
    }
    Ok(())
}

impl Lambda {
    /// Resolve fields and prepare the lambda for per-record evaluation.
    ///
    /// # Errors
    /// Returns a `BindError` if a field is unknown, a literal cannot match its
    /// field's type, or the body references a placeholder other than the lambda's.
    pub fn bind<T, R>(&self, resolver: &R) -> Result<BoundPredicate<T>, BindError>
    where
        R: FieldResolver<T> + ?Sized,
    {
        bind_body(self, resolver, &[])
    }
}

impl Predicate {
    /// Resolve fields and slot values for per-record evaluation.
    ///
    /// # Errors
    /// See [`Lambda::bind`]; also `BindError::UnknownSlot` for a slot with no value.
    pub fn bind<T, R>(&self, resolver: &R) -> Result<BoundPredicate<T>, BindError>
    where
        R: FieldResolver<T> + ?Sized,
    {
        bind_body(self.lambda(), resolver, self.values())
    }
}

fn bind_body<T, R>(
    lambda: &Lambda,
    resolver: &R,
    values: &[Option<Value>],
) -> Result<BoundPredicate<T>, BindError>
where
    R: FieldResolver<T> + ?Sized,
{
    let binder = Binder {
        resolver,
        param: lambda.param(),
        values,
    };
    Ok(BoundPredicate {
        root: binder.bind(lambda.body())?,
    })
}

/// An ordering bound to one record type.
pub struct BoundOrder<T> {
    keys: Vec<(Accessor<T>, SortDir)>,
}

impl<T> BoundOrder<T> {
    /// Compare two records key by key. Nulls sort first ascending and last
    /// descending; values of incompatible types compare equal.
    #[must_use]
    pub fn compare(&self, a: &T, b: &T) -> Ordering {
        for (accessor, dir) in &self.keys {
            let lhs = accessor(a).filter(|v| !v.is_null());
            let rhs = accessor(b).filter(|v| !v.is_null());
            let ord = match (lhs, rhs) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Less,
                (Some(_), None) => Ordering::Greater,
                (Some(x), Some(y)) => x.compare(&y).unwrap_or(Ordering::Equal),
            };
            let ord = match dir {
                SortDir::Asc => ord,
                SortDir::Desc => ord.reverse(),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl<T> fmt::Debug for BoundOrder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundOrder")
            .field("keys", &self.keys.len())
            .finish_non_exhaustive()
    }
}

impl OrderBy {
    /// Resolve every sort key.
    ///
    /// # Errors
    /// Returns `BindError::UnknownField` for a key the resolver does not know.
    pub fn bind<T, R>(&self, resolver: &R) -> Result<BoundOrder<T>, BindError>
    where
        R: FieldResolver<T> + ?Sized,
    {
        let keys = self
            .keys()
            .iter()
            .map(|key| {
                resolver
                    .resolve(&key.field)
                    .map(|field| (field.accessor, key.dir))
                    .ok_or_else(|| BindError::UnknownField(key.field.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(BoundOrder { keys })
    }
}
