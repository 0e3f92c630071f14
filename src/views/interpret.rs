//! View result interpretation
//!
//! Converts raw view rows into the shape the caller asked for. Raw results are
//! either a bare row array or an object carrying a `rows` array.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::errors::{StatementError, StatementResult};

use super::planner::AggregatePlan;
use super::registry::AggregateKind;

/// Interpreted aggregate result
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AggregateOutput {
    /// count, sum, min, max, avg and countDistinct
    Scalar(Value),
    /// distinct and groupBy keys
    Keys(Vec<Value>),
    /// documents returned by a document-emitting view
    Records(Vec<Value>),
}

impl AggregateOutput {
    pub fn as_scalar(&self) -> Option<&Value> {
        match self {
            AggregateOutput::Scalar(value) => Some(value),
            _ => None,
        }
    }

    pub fn into_value(self) -> Value {
        match self {
            AggregateOutput::Scalar(value) => value,
            AggregateOutput::Keys(values) | AggregateOutput::Records(values) => {
                Value::Array(values)
            }
        }
    }
}

/// Extracts the row list from a raw view result
pub fn rows_of(raw: &Value) -> StatementResult<&[Value]> {
    match raw {
        Value::Array(rows) => Ok(rows),
        Value::Object(map) => match map.get("rows") {
            Some(Value::Array(rows)) => Ok(rows),
            Some(other) => Err(StatementError::serialization(format!(
                "View result 'rows' must be an array, got {}",
                type_name(other)
            ))),
            None => Err(StatementError::serialization(
                "View result object has no 'rows' field",
            )),
        },
        other => Err(StatementError::serialization(format!(
            "View result must be an array or an object with 'rows', got {}",
            type_name(other)
        ))),
    }
}

/// Interprets the result of a single-view plan
pub fn interpret(plan: &AggregatePlan, raw: &Value) -> StatementResult<AggregateOutput> {
    let (kind, descriptor, count_distinct) = match plan {
        AggregatePlan::View {
            kind,
            descriptor,
            count_distinct,
        } => (*kind, descriptor, *count_distinct),
        AggregatePlan::Average { .. } => {
            return Err(StatementError::internal(
                "Average plans are interpreted with compute_average",
            ))
        }
    };

    let rows = rows_of(raw)?;

    if count_distinct {
        return Ok(AggregateOutput::Scalar(Value::from(rows.len() as u64)));
    }

    if kind.is_grouping() {
        let keys = rows
            .iter()
            .map(|row| {
                let row = object_row(row, kind.as_str())?;
                Ok(field(row, "key")
                    .or_else(|| field(row, "value"))
                    .cloned()
                    .unwrap_or(Value::Null))
            })
            .collect::<StatementResult<Vec<_>>>()?;
        return Ok(AggregateOutput::Keys(keys));
    }

    if descriptor.return_docs {
        let records = rows
            .iter()
            .map(|row| {
                row.as_object()
                    .and_then(|map| field(map, "value").or_else(|| field(map, "doc")))
                    .unwrap_or(row)
                    .clone()
            })
            .collect();
        return Ok(AggregateOutput::Records(records));
    }

    let scalar = match rows.first() {
        None if kind == AggregateKind::Count => Value::from(0),
        None => Value::Null,
        Some(row) => {
            let row = object_row(row, kind.as_str())?;
            field(row, "value")
                .or_else(|| field(row, "key"))
                .cloned()
                .unwrap_or(Value::Null)
        }
    };
    Ok(AggregateOutput::Scalar(scalar))
}

/// Divides the first sum row by the first count row.
///
/// Missing rows or null values count as zero; a zero count yields zero.
pub fn compute_average(sum_raw: &Value, count_raw: &Value) -> StatementResult<f64> {
    let sum = first_number(sum_raw, "sum")?;
    let count = first_number(count_raw, "count")?;

    if count == 0.0 {
        return Ok(0.0);
    }
    Ok(sum / count)
}

fn first_number(raw: &Value, label: &str) -> StatementResult<f64> {
    let rows = rows_of(raw)?;
    let value = match rows.first() {
        None => None,
        Some(row) => field(object_row(row, label)?, "value"),
    };
    match value {
        None => Ok(0.0),
        Some(value) => value.as_f64().ok_or_else(|| {
            StatementError::serialization(format!(
                "Expected a numeric {} value, got {}",
                label,
                type_name(value)
            ))
        }),
    }
}

/// Reduced and grouped view rows are always `{key, value}` objects
fn object_row<'v>(row: &'v Value, label: &str) -> StatementResult<&'v Map<String, Value>> {
    row.as_object().ok_or_else(|| {
        StatementError::serialization(format!(
            "Expected {} view rows to be objects, got {}",
            label,
            type_name(row)
        ))
    })
}

/// Non-null field of a row
fn field<'v>(row: &'v Map<String, Value>, name: &str) -> Option<&'v Value> {
    row.get(name).filter(|v| !v.is_null())
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::views::registry::{ViewDescriptor, ViewOptions};
    use serde_json::json;

    fn view_plan(kind: AggregateKind, return_docs: bool, count_distinct: bool) -> AggregatePlan {
        AggregatePlan::View {
            kind,
            descriptor: ViewDescriptor {
                design_document: "user_views".to_string(),
                view_name: format!("user_x_{}", kind),
                options: ViewOptions {
                    reduce: !return_docs,
                    group: kind.is_grouping(),
                },
                return_docs,
            },
            count_distinct,
        }
    }

    #[test]
    fn test_average_of_empty_results_is_zero() {
        assert_eq!(compute_average(&json!([]), &json!([])).unwrap(), 0.0);
        assert_eq!(
            compute_average(&json!({"rows": []}), &json!({"rows": []})).unwrap(),
            0.0
        );
    }

    #[test]
    fn test_average() {
        let avg = compute_average(&json!([{"value": 100}]), &json!({"rows": [{"value": 4}]}))
            .unwrap();
        assert_eq!(avg, 25.0);
    }

    #[test]
    fn test_average_zero_count() {
        assert_eq!(
            compute_average(&json!([{"value": 12}]), &json!([{"value": 0}])).unwrap(),
            0.0
        );
        assert_eq!(
            compute_average(&json!([{"value": 12}]), &json!([{"value": null}])).unwrap(),
            0.0
        );
    }

    #[test]
    fn test_average_non_numeric() {
        let err = compute_average(&json!([{"value": "lots"}]), &json!([{"value": 2}]))
            .unwrap_err();
        assert_eq!(err.code(), "LEDGER_QUERY_SERIALIZATION");
    }

    #[test]
    fn test_rows_shapes() {
        assert_eq!(rows_of(&json!([1, 2])).unwrap().len(), 2);
        assert_eq!(rows_of(&json!({"rows": [1]})).unwrap().len(), 1);
        assert!(rows_of(&json!("rows")).is_err());
        assert!(rows_of(&json!({"total": 3})).is_err());
        assert!(rows_of(&json!({"rows": 3})).is_err());
    }

    #[test]
    fn test_distinct_and_count_distinct_share_rows() {
        let rows = json!({"rows": [
            {"key": "Paris", "value": 3},
            {"key": "Oslo", "value": 1},
            {"value": "Rome"}
        ]});

        let distinct = interpret(&view_plan(AggregateKind::Distinct, false, false), &rows).unwrap();
        assert_eq!(
            distinct,
            AggregateOutput::Keys(vec![json!("Paris"), json!("Oslo"), json!("Rome")])
        );

        let counted = interpret(&view_plan(AggregateKind::Distinct, false, true), &rows).unwrap();
        assert_eq!(counted, AggregateOutput::Scalar(json!(3)));
    }

    #[test]
    fn test_group_by_keys() {
        let rows = json!([{"key": ["a", 1], "value": 2}]);
        let out = interpret(&view_plan(AggregateKind::GroupBy, false, false), &rows).unwrap();
        assert_eq!(out.into_value(), json!([["a", 1]]));
    }

    #[test]
    fn test_return_docs() {
        let rows = json!([
            {"id": "1", "value": {"name": "a"}},
            {"id": "2", "doc": {"name": "b"}},
            {"name": "c"}
        ]);
        let out = interpret(&view_plan(AggregateKind::Min, true, false), &rows).unwrap();
        assert_eq!(
            out,
            AggregateOutput::Records(vec![
                json!({"name": "a"}),
                json!({"name": "b"}),
                json!({"name": "c"})
            ])
        );
    }

    #[test]
    fn test_scalars() {
        let empty = json!([]);
        assert_eq!(
            interpret(&view_plan(AggregateKind::Count, false, false), &empty).unwrap(),
            AggregateOutput::Scalar(json!(0))
        );
        assert_eq!(
            interpret(&view_plan(AggregateKind::Max, false, false), &empty).unwrap(),
            AggregateOutput::Scalar(Value::Null)
        );

        let rows = json!([{"key": null, "value": 42}]);
        let out = interpret(&view_plan(AggregateKind::Sum, false, false), &rows).unwrap();
        assert_eq!(out.as_scalar(), Some(&json!(42)));

        let keyed = json!([{"key": 7}]);
        let out = interpret(&view_plan(AggregateKind::Min, false, false), &keyed).unwrap();
        assert_eq!(out.as_scalar(), Some(&json!(7)));
    }

    #[test]
    fn test_bare_rows_are_rejected() {
        let cities = json!(["Paris", "Oslo"]);
        let err = interpret(&view_plan(AggregateKind::Distinct, false, false), &cities).unwrap_err();
        assert_eq!(err.code(), "LEDGER_QUERY_SERIALIZATION");

        let err = interpret(&view_plan(AggregateKind::Sum, false, false), &json!([42])).unwrap_err();
        assert_eq!(err.code(), "LEDGER_QUERY_SERIALIZATION");

        let err = interpret(&view_plan(AggregateKind::Count, false, false), &json!([7])).unwrap_err();
        assert_eq!(err.code(), "LEDGER_QUERY_SERIALIZATION");

        let err = compute_average(&json!([100]), &json!([4])).unwrap_err();
        assert_eq!(err.code(), "LEDGER_QUERY_SERIALIZATION");
    }

    #[test]
    fn test_return_docs_keeps_bare_rows() {
        let rows = json!(["raw"]);
        let out = interpret(&view_plan(AggregateKind::Min, true, false), &rows).unwrap();
        assert_eq!(out, AggregateOutput::Records(vec![json!("raw")]));
    }

    #[test]
    fn test_average_plan_rejected() {
        let plan = AggregatePlan::Average {
            attribute: "age".to_string(),
            sum: match view_plan(AggregateKind::Sum, false, false) {
                AggregatePlan::View { descriptor, .. } => descriptor,
                _ => unreachable!(),
            },
            count: match view_plan(AggregateKind::Count, false, false) {
                AggregatePlan::View { descriptor, .. } => descriptor,
                _ => unreachable!(),
            },
        };
        assert!(interpret(&plan, &json!([])).unwrap_err().is_internal());
    }
}
