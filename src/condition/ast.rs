//! Condition tree
//!
//! Pure data plus well-formedness checks. Conditions are immutable once
//! built; combinators consume their operands and return a new tree.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{StatementError, StatementResult};

/// Comparison operators available on a single attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Operator {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    /// Value is a regular expression string
    Regex,
    /// Value is a non-empty list
    In,
    /// Value is exactly `[min, max]`, both inclusive
    Between,
    /// Value is a string prefix
    StartsWith,
    /// Value is a string suffix
    EndsWith,
}

impl Operator {
    pub const ALL: [Operator; 11] = [
        Operator::Eq,
        Operator::Neq,
        Operator::Gt,
        Operator::Gte,
        Operator::Lt,
        Operator::Lte,
        Operator::Regex,
        Operator::In,
        Operator::Between,
        Operator::StartsWith,
        Operator::EndsWith,
    ];

    /// Wire name of the operator
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Eq => "eq",
            Operator::Neq => "neq",
            Operator::Gt => "gt",
            Operator::Gte => "gte",
            Operator::Lt => "lt",
            Operator::Lte => "lte",
            Operator::Regex => "regex",
            Operator::In => "in",
            Operator::Between => "between",
            Operator::StartsWith => "startsWith",
            Operator::EndsWith => "endsWith",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Operator {
    type Err = StatementError;

    fn from_str(s: &str) -> StatementResult<Self> {
        Operator::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| StatementError::query(format!("Unsupported operator '{}'", s)))
    }
}

/// Boolean combinators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GroupOperator {
    And,
    Or,
}

impl GroupOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupOperator::And => "and",
            GroupOperator::Or => "or",
        }
    }
}

/// A boolean query expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Condition {
    /// `attribute <operator> value`
    Leaf {
        attribute: String,
        operator: Operator,
        value: Value,
    },
    /// Negation of any condition
    Not { inner: Box<Condition> },
    /// `left <op> right`
    Group {
        left: Box<Condition>,
        op: GroupOperator,
        right: Box<Condition>,
    },
}

impl Condition {
    /// Starts a leaf condition on `attribute`
    pub fn attr(attribute: impl Into<String>) -> AttributeRef {
        AttributeRef {
            attribute: attribute.into(),
        }
    }

    /// Creates a leaf condition
    pub fn leaf(attribute: impl Into<String>, operator: Operator, value: impl Into<Value>) -> Self {
        Condition::Leaf {
            attribute: attribute.into(),
            operator,
            value: value.into(),
        }
    }

    /// Creates a group of two conditions
    pub fn group(left: Condition, op: GroupOperator, right: Condition) -> Self {
        Condition::Group {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    pub fn and(self, other: Condition) -> Self {
        Self::group(self, GroupOperator::And, other)
    }

    pub fn or(self, other: Condition) -> Self {
        Self::group(self, GroupOperator::Or, other)
    }

    /// Wraps this condition in a negation
    pub fn negate(self) -> Self {
        Condition::Not {
            inner: Box::new(self),
        }
    }

    /// Returns `(attribute, value)` if this is an equality leaf
    pub fn as_equality(&self) -> Option<(&str, &Value)> {
        match self {
            Condition::Leaf {
                attribute,
                operator: Operator::Eq,
                value,
            } => Some((attribute, value)),
            _ => None,
        }
    }

    /// Returns the group operator if this is a group
    pub fn group_op(&self) -> Option<GroupOperator> {
        match self {
            Condition::Group { op, .. } => Some(*op),
            _ => None,
        }
    }

    /// Every attribute referenced, in tree order (duplicates kept)
    pub fn attributes(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_attributes(&mut out);
        out
    }

    fn collect_attributes<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Condition::Leaf { attribute, .. } => out.push(attribute),
            Condition::Not { inner } => inner.collect_attributes(out),
            Condition::Group { left, right, .. } => {
                left.collect_attributes(out);
                right.collect_attributes(out);
            }
        }
    }

    /// Checks operator/value well-formedness across the whole tree.
    ///
    /// Ordering of `BETWEEN` bounds is not checked; an inverted range is
    /// valid and simply matches nothing.
    pub fn validate(&self) -> StatementResult<()> {
        match self {
            Condition::Leaf {
                attribute,
                operator,
                value,
            } => validate_leaf(attribute, *operator, value),
            Condition::Not { inner } => inner.validate(),
            Condition::Group { left, right, .. } => {
                left.validate()?;
                right.validate()
            }
        }
    }
}

impl std::ops::Not for Condition {
    type Output = Condition;

    fn not(self) -> Condition {
        self.negate()
    }
}

fn validate_leaf(attribute: &str, operator: Operator, value: &Value) -> StatementResult<()> {
    if attribute.is_empty() {
        return Err(StatementError::query("Condition attribute must not be empty"));
    }

    let ok = match operator {
        Operator::Between => value.as_array().is_some_and(|bounds| bounds.len() == 2),
        Operator::In => value.as_array().is_some_and(|items| !items.is_empty()),
        Operator::StartsWith | Operator::EndsWith | Operator::Regex => value.is_string(),
        Operator::Eq
        | Operator::Neq
        | Operator::Gt
        | Operator::Gte
        | Operator::Lt
        | Operator::Lte => true,
    };

    if ok {
        Ok(())
    } else {
        Err(StatementError::query(format!(
            "Invalid value for '{}' {}: {}",
            attribute,
            operator,
            expectation(operator)
        )))
    }
}

fn expectation(operator: Operator) -> &'static str {
    match operator {
        Operator::Between => "expected [min, max]",
        Operator::In => "expected a non-empty list",
        Operator::StartsWith | Operator::EndsWith | Operator::Regex => "expected a string",
        _ => "unexpected value",
    }
}

/// Fluent entry point returned by [`Condition::attr`]
#[derive(Debug, Clone)]
pub struct AttributeRef {
    attribute: String,
}

impl AttributeRef {
    fn build(self, operator: Operator, value: Value) -> Condition {
        Condition::Leaf {
            attribute: self.attribute,
            operator,
            value,
        }
    }

    pub fn eq(self, value: impl Into<Value>) -> Condition {
        self.build(Operator::Eq, value.into())
    }

    pub fn neq(self, value: impl Into<Value>) -> Condition {
        self.build(Operator::Neq, value.into())
    }

    pub fn gt(self, value: impl Into<Value>) -> Condition {
        self.build(Operator::Gt, value.into())
    }

    pub fn gte(self, value: impl Into<Value>) -> Condition {
        self.build(Operator::Gte, value.into())
    }

    pub fn lt(self, value: impl Into<Value>) -> Condition {
        self.build(Operator::Lt, value.into())
    }

    pub fn lte(self, value: impl Into<Value>) -> Condition {
        self.build(Operator::Lte, value.into())
    }

    pub fn regex(self, pattern: impl Into<String>) -> Condition {
        self.build(Operator::Regex, Value::String(pattern.into()))
    }

    pub fn in_list<V: Into<Value>>(self, values: impl IntoIterator<Item = V>) -> Condition {
        let list = values.into_iter().map(Into::into).collect();
        self.build(Operator::In, Value::Array(list))
    }

    pub fn between(self, min: impl Into<Value>, max: impl Into<Value>) -> Condition {
        self.build(Operator::Between, Value::Array(vec![min.into(), max.into()]))
    }

    pub fn starts_with(self, prefix: impl Into<String>) -> Condition {
        self.build(Operator::StartsWith, Value::String(prefix.into()))
    }

    pub fn ends_with(self, suffix: impl Into<String>) -> Condition {
        self.build(Operator::EndsWith, Value::String(suffix.into()))
    }
}
