//! The fixed operator table.
//!
//! Caller-supplied operator symbols are parsed once into [`Operator`]; everything
//! downstream matches on the enum exhaustively.

use std::fmt;
use std::str::FromStr;

use crate::errors::ValidationError;
use crate::expr::{CompareOp, StringFn};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operator {
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
    IsNull,
    IsNotNull,
    StartsWith,
    EndsWith,
    Contains,
    DoesNotContain,
}

/// What an operator renders to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperatorKind {
    /// `field <op> @i`
    Compare(CompareOp),
    /// `field == null` / `field != null`; never consumes a value.
    NullCheck { negated: bool },
    /// `field.StartsWith(@i)` and friends, optionally negated.
    Containment { func: StringFn, negated: bool },
}

impl Operator {
    pub const ALL: &'static [Operator] = &[
        Operator::Eq,
        Operator::Neq,
        Operator::Lt,
        Operator::Lte,
        Operator::Gt,
        Operator::Gte,
        Operator::IsNull,
        Operator::IsNotNull,
        Operator::StartsWith,
        Operator::EndsWith,
        Operator::Contains,
        Operator::DoesNotContain,
    ];

    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            Operator::Eq => "eq",
            Operator::Neq => "neq",
            Operator::Lt => "lt",
            Operator::Lte => "lte",
            Operator::Gt => "gt",
            Operator::Gte => "gte",
            Operator::IsNull => "isNull",
            Operator::IsNotNull => "isNotNull",
            Operator::StartsWith => "startsWith",
            Operator::EndsWith => "endsWith",
            Operator::Contains => "contains",
            Operator::DoesNotContain => "doesNotContain",
        }
    }

    /// Look up an operator by its exact symbol.
    #[must_use]
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|op| op.symbol() == symbol)
    }

    #[must_use]
    pub fn kind(self) -> OperatorKind {
        match self {
            Operator::Eq => OperatorKind::Compare(CompareOp::Eq),
            Operator::Neq => OperatorKind::Compare(CompareOp::Ne),
            Operator::Lt => OperatorKind::Compare(CompareOp::Lt),
            Operator::Lte => OperatorKind::Compare(CompareOp::Le),
            Operator::Gt => OperatorKind::Compare(CompareOp::Gt),
            Operator::Gte => OperatorKind::Compare(CompareOp::Ge),
            Operator::IsNull => OperatorKind::NullCheck { negated: false },
            Operator::IsNotNull => OperatorKind::NullCheck { negated: true },
            Operator::StartsWith => OperatorKind::Containment {
                func: StringFn::StartsWith,
                negated: false,
            },
            Operator::EndsWith => OperatorKind::Containment {
                func: StringFn::EndsWith,
                negated: false,
            },
            Operator::Contains => OperatorKind::Containment {
                func: StringFn::Contains,
                negated: false,
            },
            Operator::DoesNotContain => OperatorKind::Containment {
                func: StringFn::Contains,
                negated: true,
            },
        }
    }

    /// Whether a condition using this operator must carry a value.
    #[must_use]
    pub fn takes_value(self) -> bool {
        !matches!(self.kind(), OperatorKind::NullCheck { .. })
    }
}

impl FromStr for Operator {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_symbol(s).ok_or_else(|| ValidationError::InvalidOperator(s.to_owned()))
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn every_symbol_round_trips() {
        for op in Operator::ALL {
            assert_eq!(op.symbol().parse::<Operator>().unwrap(), *op);
        }
    }

    #[test]
    fn symbols_are_case_sensitive() {
        assert!("isnull".parse::<Operator>().is_err());
        assert!("EQ".parse::<Operator>().is_err());
    }

    #[test]
    fn unknown_symbol_is_invalid_operator() {
        assert_eq!(
            "like".parse::<Operator>(),
            Err(ValidationError::InvalidOperator("like".to_owned()))
        );
    }

    #[test]
    fn null_checks_take_no_value() {
        assert!(!Operator::IsNull.takes_value());
        assert!(!Operator::IsNotNull.takes_value());
        assert!(Operator::DoesNotContain.takes_value());
        assert!(Operator::Gte.takes_value());
    }

    #[test]
    fn does_not_contain_is_negated_contains() {
        assert_eq!(
            Operator::DoesNotContain.kind(),
            OperatorKind::Containment {
                func: StringFn::Contains,
                negated: true
            }
        );
    }
}
