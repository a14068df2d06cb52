//! Condition tree + sort list -> predicate + ordering.
//!
//! The compiler walks the tree in pre-order. The node visited at position `i`
//! renders one comparison against the positional slot `@i`, and its value (if
//! any) is stored at index `i` of the value list. Null checks occupy a position
//! but leave the slot empty, so numbering depends only on traversal order.
//!
//! A node's own comparison is joined to the comparisons of all its children by
//! the node's `logic`: `own <logic> (child1 <logic> child2 ...)`.
//!
//! # Example
//!
//! ```rust
//! use querykit::{compile, Condition, Logic, Sort, Value};
//!
//! let filter = Condition::new("age", "gte")
//!     .with_value(30)
//!     .with_logic(Logic::And)
//!     .with_child(Condition::new("active", "eq").with_value(true));
//!
//! let compiled = compile(Some(&filter), &[Sort::asc("lastName"), Sort::desc("age")]).unwrap();
//! let predicate = compiled.filter.unwrap();
//!
//! assert_eq!(predicate.to_string(), "np(age) >= @0 and np(active) == @1");
//! assert_eq!(predicate.values(), &[Some(Value::from(30)), Some(Value::from(true))]);
//! assert_eq!(compiled.order.to_string(), "lastName asc,age desc");
//! ```

use std::fmt;

use crate::errors::{BindError, ValidationError};
use crate::expr::{CompareOp, Expr, Lambda, Param};
use crate::limits::QueryLimits;
use crate::model::{Condition, DynamicQuery, Logic, OrderBy, OrderKey, Sort, SortDir};
use crate::operator::{Operator, OperatorKind};
use crate::value::Value;

/// A compiled filter: an expression over one record placeholder plus the values
/// its positional slots refer to.
#[derive(Clone, Debug, PartialEq)]
pub struct Predicate {
    lambda: Lambda,
    values: Vec<Option<Value>>,
}

impl Predicate {
    #[must_use]
    pub fn new(lambda: Lambda, values: Vec<Option<Value>>) -> Self {
        Self { lambda, values }
    }

    #[must_use]
    pub fn lambda(&self) -> &Lambda {
        &self.lambda
    }

    /// Values indexed by traversal position; `None` at null-check positions.
    #[must_use]
    pub fn values(&self) -> &[Option<Value>] {
        &self.values
    }

    /// The values that are actually referenced, in slot order.
    #[must_use]
    pub fn bound_values(&self) -> impl Iterator<Item = &Value> {
        self.values.iter().flatten()
    }

    /// Inline the slot values so the predicate can be combined with other lambdas.
    ///
    /// # Errors
    /// Returns `BindError::UnknownSlot` if the expression references a slot with no value.
    pub fn into_lambda(self) -> Result<Lambda, BindError> {
        let (param, body) = self.lambda.into_parts();
        Ok(Lambda::from_parts(param, body.inline_slots(&self.values)?))
    }
}

impl From<Lambda> for Predicate {
    fn from(lambda: Lambda) -> Self {
        Self {
            lambda,
            values: Vec::new(),
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.lambda)
    }
}

/// Output of [`Compiler::compile`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CompiledQuery {
    /// `None` when the request carried no filter (every record matches).
    pub filter: Option<Predicate>,
    /// Empty when the request carried no sort entries.
    pub order: OrderBy,
}

/// Condition tree and sort list compiler.
///
/// The default compiler is unbounded; caps apply only when passed to [`Compiler::new`].
#[derive(Clone, Copy, Debug)]
pub struct Compiler {
    limits: QueryLimits,
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new(QueryLimits::unbounded())
    }
}

impl Compiler {
    #[must_use]
    pub fn new(limits: QueryLimits) -> Self {
        Self { limits }
    }

    #[must_use]
    pub fn limits(&self) -> &QueryLimits {
        &self.limits
    }

    /// Compile an optional filter root and a sort list.
    ///
    /// # Errors
    /// Returns a `ValidationError` for the first malformed sort entry or condition node.
    pub fn compile(
        &self,
        root: Option<&Condition>,
        sorts: &[Sort],
    ) -> Result<CompiledQuery, ValidationError> {
        let order = self.compile_order(sorts)?;
        let filter = root.map(|r| self.compile_filter(r)).transpose()?;

        tracing::debug!(
            conditions = filter.as_ref().map_or(0, |p| p.values().len()),
            sort_keys = order.0.len(),
            "compiled dynamic query"
        );

        Ok(CompiledQuery { filter, order })
    }

    /// # Errors
    /// See [`Compiler::compile`].
    pub fn compile_dynamic(&self, query: &DynamicQuery) -> Result<CompiledQuery, ValidationError> {
        self.compile(query.filter.as_ref(), &query.sort)
    }

    /// Compile a condition tree into a predicate.
    ///
    /// # Errors
    /// Returns a `ValidationError` for the first malformed node in pre-order.
    pub fn compile_filter(&self, root: &Condition) -> Result<Predicate, ValidationError> {
        let param = Param::fresh();
        let mut values = Vec::new();
        let body = self.compile_node(root, param, 1, &mut values)?;
        Ok(Predicate::new(Lambda::from_parts(param, body), values))
    }

    /// Validate sort entries and keep their order.
    ///
    /// # Errors
    /// Returns `ValidationError::InvalidSortField` or `ValidationError::InvalidSortDirection`.
    pub fn compile_order(&self, sorts: &[Sort]) -> Result<OrderBy, ValidationError> {
        self.limits.validate_sort_count(sorts.len())?;
        sorts
            .iter()
            .map(|sort| {
                if sort.field.trim().is_empty() {
                    return Err(ValidationError::InvalidSortField);
                }
                let dir: SortDir = sort.direction.parse()?;
                Ok(OrderKey {
                    field: sort.field.clone(),
                    dir,
                })
            })
            .collect::<Result<Vec<_>, _>>()
            .map(OrderBy)
    }

    fn compile_node(
        &self,
        node: &Condition,
        param: Param,
        depth: usize,
        values: &mut Vec<Option<Value>>,
    ) -> Result<Expr, ValidationError> {
        self.limits.validate_depth(depth)?;
        self.limits.validate_conditions(values.len() + 1)?;

        if node.field.trim().is_empty() {
            return Err(ValidationError::InvalidField);
        }
        let op: Operator = node.operator.parse()?;
        let value = node.value.as_ref().filter(|v| !v.is_null());

        let index = values.len();
        let field = Expr::Field {
            param,
            path: node.field.clone(),
        };
        let own = match (op.kind(), value) {
            (OperatorKind::NullCheck { negated }, None) => {
                let cmp = if negated { CompareOp::Ne } else { CompareOp::Eq };
                Expr::compare(field, cmp, Expr::Literal(Value::Null))
            }
            (OperatorKind::NullCheck { .. }, Some(_)) => {
                return Err(ValidationError::UnexpectedValue {
                    field: node.field.clone(),
                    operator: node.operator.clone(),
                });
            }
            (_, None) => {
                return Err(ValidationError::MissingValue {
                    field: node.field.clone(),
                    operator: node.operator.clone(),
                });
            }
            (OperatorKind::Compare(cmp), Some(_)) => Expr::compare(field, cmp, Expr::Slot(index)),
            (OperatorKind::Containment { func, negated }, Some(_)) => {
                if negated {
                    Expr::not_call(func, field, Expr::Slot(index))
                } else {
                    Expr::call(func, field, Expr::Slot(index))
                }
            }
        };
        values.push(value.cloned());

        if node.children.is_empty() {
            return Ok(own);
        }

        let logic = node
            .logic
            .as_deref()
            .and_then(Logic::from_keyword)
            .ok_or_else(|| ValidationError::InvalidLogic {
                field: node.field.clone(),
                logic: node.logic.clone(),
            })?;

        let mut joined: Option<Expr> = None;
        for child in &node.children {
            let child = self.compile_node(child, param, depth + 1, values)?;
            joined = Some(match joined {
                Some(acc) => join(logic, acc, child),
                None => child,
            });
        }

        Ok(match joined {
            Some(children) => join(logic, own, children),
            None => own,
        })
    }
}

fn join(logic: Logic, lhs: Expr, rhs: Expr) -> Expr {
    match logic {
        Logic::And => lhs.and(rhs),
        Logic::Or => lhs.or(rhs),
    }
}

/// Compile without input caps.
///
/// # Errors
/// See [`Compiler::compile`].
pub fn compile(root: Option<&Condition>, sorts: &[Sort]) -> Result<CompiledQuery, ValidationError> {
    Compiler::default().compile(root, sorts)
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    fn leaf(field: &str, op: &str, value: impl Into<Value>) -> Condition {
        Condition::new(field, op).with_value(value)
    }

    #[test]
    fn no_filter_and_no_sort_compile_to_nothing() {
        let compiled = compile(None, &[]).unwrap();
        assert!(compiled.filter.is_none());
        assert!(compiled.order.is_empty());
    }

    #[test]
    fn slots_follow_preorder_positions() {
        // a (or) -> [ b (and) -> [c], isNull d, e ]
        let tree = leaf("a", "eq", 1).with_logic(Logic::Or).with_children([
            leaf("b", "gt", 2)
                .with_logic(Logic::And)
                .with_child(leaf("c", "lt", 3)),
            Condition::new("d", "isNull"),
            leaf("e", "contains", "x"),
        ]);

        let predicate = compile(Some(&tree), &[]).unwrap().filter.unwrap();

        assert_eq!(
            predicate.to_string(),
            "np(a) == @0 or (np(b) > @1 and np(c) < @2) or np(d) == null or np(e).Contains(@4)"
        );
        assert_eq!(
            predicate.values(),
            &[
                Some(Value::from(1)),
                Some(Value::from(2)),
                Some(Value::from(3)),
                None,
                Some(Value::from("x")),
            ]
        );
        let bound: Vec<_> = predicate.bound_values().cloned().collect();
        assert_eq!(bound.len(), 4);
    }

    #[test]
    fn does_not_contain_renders_negated_call() {
        let predicate = compile(Some(&leaf("name", "doesNotContain", "bob")), &[])
            .unwrap()
            .filter
            .unwrap();
        assert_eq!(predicate.to_string(), "!np(name).Contains(@0)");
        assert!(matches!(
            predicate.lambda().body(),
            Expr::NotCall(crate::expr::StringFn::Contains, ..)
        ));
    }

    #[test]
    fn positive_containment_renders_call() {
        for (op, name) in [
            ("startsWith", "StartsWith"),
            ("endsWith", "EndsWith"),
            ("contains", "Contains"),
        ] {
            let predicate = compile(Some(&leaf("name", op, "b")), &[])
                .unwrap()
                .filter
                .unwrap();
            assert_eq!(predicate.to_string(), format!("np(name).{name}(@0)"));
        }
    }

    #[test]
    fn comparison_symbols() {
        for (op, sym) in [
            ("eq", "=="),
            ("neq", "!="),
            ("lt", "<"),
            ("lte", "<="),
            ("gt", ">"),
            ("gte", ">="),
        ] {
            let predicate = compile(Some(&leaf("n", op, 1)), &[])
                .unwrap()
                .filter
                .unwrap();
            assert_eq!(predicate.to_string(), format!("np(n) {sym} @0"));
        }
    }

    #[test]
    fn is_not_null_consumes_no_value() {
        let predicate = compile(Some(&Condition::new("email", "isNotNull")), &[])
            .unwrap()
            .filter
            .unwrap();
        assert_eq!(predicate.to_string(), "np(email) != null");
        assert_eq!(predicate.values(), &[None::<Value>]);
    }

    #[test]
    fn logic_is_ignored_without_children() {
        let node = leaf("a", "eq", 1);
        let mut with_bogus_logic = node.clone();
        with_bogus_logic.logic = Some("xor".to_owned());
        assert_eq!(
            compile(Some(&with_bogus_logic), &[]).unwrap().filter.unwrap().to_string(),
            "np(a) == @0"
        );
    }

    #[test]
    fn missing_logic_with_children_is_rejected() {
        let tree = leaf("a", "eq", 1).with_child(leaf("b", "eq", 2));
        assert_eq!(
            compile(Some(&tree), &[]),
            Err(ValidationError::InvalidLogic {
                field: "a".to_owned(),
                logic: None
            })
        );
    }

    #[test]
    fn unknown_logic_with_children_is_rejected() {
        let mut tree = leaf("a", "eq", 1).with_child(leaf("b", "eq", 2));
        tree.logic = Some("AND".to_owned());
        assert!(matches!(
            compile(Some(&tree), &[]),
            Err(ValidationError::InvalidLogic { .. })
        ));
    }

    #[test]
    fn value_with_null_check_is_rejected() {
        let node = leaf("a", "isNull", 1);
        assert!(matches!(
            compile(Some(&node), &[]),
            Err(ValidationError::UnexpectedValue { .. })
        ));
    }

    #[test]
    fn missing_value_is_rejected() {
        assert!(matches!(
            compile(Some(&Condition::new("a", "gte")), &[]),
            Err(ValidationError::MissingValue { .. })
        ));
    }

    #[test]
    fn explicit_null_value_counts_as_absent() {
        let node = Condition::new("a", "isNull").with_value(Value::Null);
        assert!(compile(Some(&node), &[]).is_ok());
    }

    #[test]
    fn depth_limit_applies() {
        let compiler = Compiler::new(QueryLimits::default().with_max_depth(2));
        let tree = leaf("a", "eq", 1).with_logic(Logic::And).with_child(
            leaf("b", "eq", 1)
                .with_logic(Logic::And)
                .with_child(leaf("c", "eq", 1)),
        );
        assert_eq!(
            compiler.compile(Some(&tree), &[]),
            Err(ValidationError::TooDeep(2))
        );
    }

    #[test]
    fn condition_limit_applies() {
        let compiler = Compiler::new(QueryLimits::default().with_max_conditions(2));
        let tree = leaf("a", "eq", 1)
            .with_logic(Logic::Or)
            .with_children([leaf("b", "eq", 1), leaf("c", "eq", 1)]);
        assert_eq!(
            compiler.compile(Some(&tree), &[]),
            Err(ValidationError::TooManyConditions(2))
        );
    }

    #[test]
    fn default_compiler_has_no_caps() {
        assert_eq!(*Compiler::default().limits(), QueryLimits::unbounded());
    }

    #[test]
    fn deep_valid_chain_compiles_without_caps() {
        let mut tree = leaf("f39", "eq", 39);
        for i in (0..39).rev() {
            tree = leaf(&format!("f{i}"), "eq", i)
                .with_logic(Logic::And)
                .with_child(tree);
        }

        let predicate = compile(Some(&tree), &[]).unwrap().filter.unwrap();

        assert_eq!(predicate.values().len(), 40);
        assert_eq!(predicate.values()[39], Some(Value::from(39)));
        assert!(predicate.to_string().ends_with("np(f39) == @39"));
    }

    #[test]
    fn long_sort_list_compiles_without_caps() {
        let sorts: Vec<_> = (0..12).map(|i| Sort::asc(format!("k{i}"))).collect();
        let order = compile(None, &sorts).unwrap().order;
        assert_eq!(order.keys().len(), 12);
    }

    #[test]
    fn sort_preserves_order() {
        let order = compile(None, &[Sort::asc("lastName"), Sort::desc("age")])
            .unwrap()
            .order;
        assert_eq!(order.keys()[0].field, "lastName");
        assert_eq!(order.keys()[0].dir, SortDir::Asc);
        assert_eq!(order.keys()[1].field, "age");
        assert_eq!(order.keys()[1].dir, SortDir::Desc);
    }

    #[test]
    fn sort_limit_applies() {
        let compiler = Compiler::new(QueryLimits::default().with_max_sort_fields(1));
        assert_eq!(
            compiler.compile(None, &[Sort::asc("a"), Sort::asc("b")]),
            Err(ValidationError::TooManySortFields(1))
        );
    }

    #[test]
    fn into_lambda_inlines_values() {
        let tree = leaf("age", "gte", 30)
            .with_logic(Logic::And)
            .with_child(Condition::new("email", "isNull"));
        let lambda = compile(Some(&tree), &[])
            .unwrap()
            .filter
            .unwrap()
            .into_lambda()
            .unwrap();
        assert_eq!(lambda.to_string(), "np(age) >= 30 and np(email) == null");
    }
}
