//! Record hydration
//!
//! Converts raw rows returned by the executor into caller records.

use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::errors::{StatementError, StatementResult};

/// Turns one raw row into a record
pub trait Hydrator: Send + Sync {
    type Record;

    fn revert(&self, row: Value) -> StatementResult<Self::Record>;
}

/// Returns rows unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonHydrator;

impl Hydrator for JsonHydrator {
    type Record = Value;

    fn revert(&self, row: Value) -> StatementResult<Value> {
        Ok(row)
    }
}

/// Deserializes rows into `T`
pub struct SerdeHydrator<T> {
    _record: PhantomData<fn() -> T>,
}

impl<T> SerdeHydrator<T> {
    pub fn new() -> Self {
        Self {
            _record: PhantomData,
        }
    }
}

impl<T> Default for SerdeHydrator<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: DeserializeOwned> Hydrator for SerdeHydrator<T> {
    type Record = T;

    fn revert(&self, row: Value) -> StatementResult<T> {
        serde_json::from_value(row)
            .map_err(|e| StatementError::serialization(format!("Cannot hydrate record: {}", e)))
    }
}

/// Extracts record rows from a selector or procedure response.
///
/// Accepts a row array, an object carrying `docs` or `rows`, a single
/// document object, or null for no result.
pub fn records_of(raw: Value) -> StatementResult<Vec<Value>> {
    match raw {
        Value::Null => Ok(Vec::new()),
        Value::Array(rows) => Ok(rows),
        Value::Object(mut map) => {
            for key in ["docs", "rows"] {
                match map.remove(key) {
                    Some(Value::Array(rows)) => return Ok(rows),
                    Some(_) => {
                        return Err(StatementError::serialization(format!(
                            "Result '{}' must be an array",
                            key
                        )))
                    }
                    None => {}
                }
            }
            Ok(vec![Value::Object(map)])
        }
        other => Err(StatementError::serialization(format!(
            "Unexpected result shape: {}",
            other
        ))),
    }
}

/// Hydrates every row, failing on the first bad one
pub fn hydrate_all<H: Hydrator + ?Sized>(
    hydrator: &H,
    rows: Vec<Value>,
) -> StatementResult<Vec<H::Record>> {
    rows.into_iter().map(|row| hydrator.revert(row)).collect()
}
