//! Operator translation table
//!
//! Maps condition operators onto selector-dialect tokens. Pure lookup.

use std::fmt;

use crate::condition::{GroupOperator, Operator};
use crate::errors::{StatementError, StatementResult};

/// Tokens of the declarative selector dialect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SelectorToken {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    Regex,
    In,
    Not,
    And,
    Or,
}

impl SelectorToken {
    pub const ALL: [SelectorToken; 11] = [
        SelectorToken::Eq,
        SelectorToken::Ne,
        SelectorToken::Gt,
        SelectorToken::Gte,
        SelectorToken::Lt,
        SelectorToken::Lte,
        SelectorToken::Regex,
        SelectorToken::In,
        SelectorToken::Not,
        SelectorToken::And,
        SelectorToken::Or,
    ];

    /// Token for a `$`-prefixed key, if the dialect knows it
    pub fn parse(key: &str) -> Option<SelectorToken> {
        SelectorToken::ALL.into_iter().find(|t| t.as_str() == key)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SelectorToken::Eq => "$eq",
            SelectorToken::Ne => "$ne",
            SelectorToken::Gt => "$gt",
            SelectorToken::Gte => "$gte",
            SelectorToken::Lt => "$lt",
            SelectorToken::Lte => "$lte",
            SelectorToken::Regex => "$regex",
            SelectorToken::In => "$in",
            SelectorToken::Not => "$not",
            SelectorToken::And => "$and",
            SelectorToken::Or => "$or",
        }
    }

    /// True for tokens that combine whole clauses rather than constrain a field
    pub fn is_combinator(&self) -> bool {
        matches!(self, SelectorToken::And | SelectorToken::Or | SelectorToken::Not)
    }
}

impl fmt::Display for SelectorToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Direct 1:1 translation of an operator.
///
/// `Between`, `StartsWith` and `EndsWith` have no single token; they are
/// derived by the selector builder and rejected here.
pub fn translate(operator: Operator) -> StatementResult<SelectorToken> {
    match operator {
        Operator::Eq => Ok(SelectorToken::Eq),
        Operator::Neq => Ok(SelectorToken::Ne),
        Operator::Gt => Ok(SelectorToken::Gt),
        Operator::Gte => Ok(SelectorToken::Gte),
        Operator::Lt => Ok(SelectorToken::Lt),
        Operator::Lte => Ok(SelectorToken::Lte),
        Operator::Regex => Ok(SelectorToken::Regex),
        Operator::In => Ok(SelectorToken::In),
        Operator::Between | Operator::StartsWith | Operator::EndsWith => {
            Err(StatementError::query(format!(
                "Operator '{}' has no direct selector token",
                operator
            )))
        }
    }
}

pub fn translate_group(op: GroupOperator) -> SelectorToken {
    match op {
        GroupOperator::And => SelectorToken::And,
        GroupOperator::Or => SelectorToken::Or,
    }
}

/// Whether a selector key is an operator/combinator rather than a field name
pub fn is_token_key(key: &str) -> bool {
    key.starts_with('$')
}
