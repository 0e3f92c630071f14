//! Prepared-statement squasher
//!
//! Recognizes the few query shapes that map onto a whitelisted procedure and
//! emits a procedure call instead of a selector. Positional argument order is
//! part of the wire contract with each procedure:
//!
//! | Pattern                                 | Procedure   | Args                                   |
//! |-----------------------------------------|-------------|----------------------------------------|
//! | primary key equality                    | `find`      | `[id]`                                 |
//! | single equality, single-result arity    | `findOneBy` | `[attribute, value]`                   |
//! | single equality, no limit               | `findBy`    | `[attribute, value]`                   |
//! | no condition, one sort field, no limit  | `listBy`    | `[field, direction]`                   |
//! | single equality, one sort field, limit  | `pageBy`    | `[attribute, value, field, direction, limit]` |

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::condition::{Condition, OrderBy};
use crate::errors::{StatementError, StatementResult};

/// Closed set of procedures exposed by the execution boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Procedure {
    Find,
    FindBy,
    FindOneBy,
    ListBy,
    PageBy,
}

impl Procedure {
    pub const ALL: [Procedure; 5] = [
        Procedure::Find,
        Procedure::FindBy,
        Procedure::FindOneBy,
        Procedure::ListBy,
        Procedure::PageBy,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Procedure::Find => "find",
            Procedure::FindBy => "findBy",
            Procedure::FindOneBy => "findOneBy",
            Procedure::ListBy => "listBy",
            Procedure::PageBy => "pageBy",
        }
    }

    /// Number of positional arguments the procedure parses
    pub fn arity(&self) -> usize {
        match self {
            Procedure::Find => 1,
            Procedure::FindBy | Procedure::FindOneBy | Procedure::ListBy => 2,
            Procedure::PageBy => 5,
        }
    }
}

impl fmt::Display for Procedure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Procedure {
    type Err = StatementError;

    /// Unknown names indicate a translation bug, never user input
    fn from_str(s: &str) -> StatementResult<Self> {
        Procedure::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| StatementError::internal(format!("Unknown procedure '{}'", s)))
    }
}

/// Named procedure plus positional arguments
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreparedStatement {
    pub procedure: Procedure,
    pub args: Vec<Value>,
}

impl PreparedStatement {
    /// Creates a statement, checking the argument count against the procedure
    pub fn new(procedure: Procedure, args: Vec<Value>) -> StatementResult<Self> {
        if args.len() != procedure.arity() {
            return Err(StatementError::internal(format!(
                "Procedure '{}' takes {} arguments, got {}",
                procedure,
                procedure.arity(),
                args.len()
            )));
        }
        Ok(Self { procedure, args })
    }

    /// Decodes `{"procedure": <name>, "args": [...]}`
    pub fn from_json(value: &Value) -> StatementResult<Self> {
        let name = value
            .get("procedure")
            .and_then(Value::as_str)
            .ok_or_else(|| StatementError::serialization("Prepared statement missing 'procedure'"))?;
        let args = value
            .get("args")
            .and_then(Value::as_array)
            .cloned()
            .ok_or_else(|| StatementError::serialization("Prepared statement missing 'args'"))?;

        Self::new(name.parse()?, args)
    }

    pub fn to_json(&self) -> Value {
        json!({ "procedure": self.procedure.as_str(), "args": self.args })
    }
}

/// Squashing policy for one statement
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SquashPolicy {
    /// Squash when the query shape allows it
    pub force_simple_queries: bool,
    /// Caller expects at most one record
    pub single_result: bool,
}

/// Converts eligible queries into procedure calls
pub struct Squasher<'a> {
    primary_key: &'a str,
}

impl<'a> Squasher<'a> {
    pub fn new(primary_key: &'a str) -> Self {
        Self { primary_key }
    }

    /// Returns a procedure call for whitelisted shapes, `None` otherwise.
    ///
    /// `None` is not an error: the caller falls back to a selector.
    pub fn try_squash(
        &self,
        condition: Option<&Condition>,
        order_by: &[OrderBy],
        limit: Option<u64>,
        policy: SquashPolicy,
    ) -> StatementResult<Option<PreparedStatement>> {
        if !policy.force_simple_queries {
            return Ok(None);
        }

        let equality = condition.map(Condition::as_equality);

        let (procedure, args) = match (equality, order_by, limit) {
            (None, [order], None) => (
                Procedure::ListBy,
                vec![json!(order.field), json!(order.direction.as_str())],
            ),
            (Some(Some((attribute, value))), [], _) if attribute == self.primary_key => {
                (Procedure::Find, vec![value.clone()])
            }
            (Some(Some((attribute, value))), [], _) if policy.single_result => {
                (Procedure::FindOneBy, vec![json!(attribute), value.clone()])
            }
            (Some(Some((attribute, value))), [], None) => {
                (Procedure::FindBy, vec![json!(attribute), value.clone()])
            }
            (Some(Some((attribute, value))), [order], Some(limit)) => (
                Procedure::PageBy,
                vec![
                    json!(attribute),
                    value.clone(),
                    json!(order.field),
                    json!(order.direction.as_str()),
                    json!(limit),
                ],
            ),
            _ => return Ok(None),
        };

        PreparedStatement::new(procedure, args).map(Some)
    }
}
