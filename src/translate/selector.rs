//! Selector builder
//!
//! Lowers a condition tree into a declarative selector document.
//!
//! Root shapes:
//! - no condition, leaf or negation: one flat field map, discriminator merged in
//! - AND root: discriminator next to a single flat `$and` list
//! - OR root: `{"$and": [{"$or": [...]}, <discriminator>, ...]}`
//!
//! Every sort field without a top-level clause gets `{"$gt": null}` so the
//! store can serve the sort from an index.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::condition::{Condition, GroupOperator, OrderBy, Operator, SortDirection};
use crate::config::StatementConfig;
use crate::errors::{StatementError, StatementResult};
use crate::observability::{Logger, QueryEvent};

use super::operators::{is_token_key, translate, translate_group, SelectorToken};
use super::ranges::{prefix_range, suffix_pattern};

/// A selector clause: field or combinator keys to constraints
pub type Clause = Map<String, Value>;

/// Declarative query document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectorDocument {
    pub selector: Clause,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sort: Vec<BTreeMap<String, SortDirection>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip: Option<u64>,

    /// Opaque continuation token, set only by the paginator
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bookmark: Option<String>,
}

impl SelectorDocument {
    /// Sets the field projection
    pub fn with_fields(mut self, fields: Option<Vec<String>>) -> Self {
        self.fields = fields.filter(|f| !f.is_empty());
        self
    }

    /// Serializes into the selector dialect
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Parses a caller-supplied selector document.
    ///
    /// Top-level `$` keys must be known combinators; field constraints are
    /// passed through untouched.
    pub fn from_json(value: Value) -> StatementResult<Self> {
        let document: Self = serde_json::from_value(value)
            .map_err(|e| StatementError::query(format!("Invalid selector document: {}", e)))?;

        for (key, clause) in &document.selector {
            if !is_token_key(key) {
                continue;
            }
            let token = SelectorToken::parse(key)
                .filter(SelectorToken::is_combinator)
                .ok_or_else(|| {
                    StatementError::query(format!("Unsupported top-level selector key '{}'", key))
                })?;
            let well_formed = match token {
                SelectorToken::Not => clause.is_object(),
                _ => clause.is_array(),
            };
            if !well_formed {
                return Err(StatementError::query(format!(
                    "Malformed '{}' clause in selector document",
                    key
                )));
            }
        }

        Ok(document)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RootShape {
    /// Top-level keys are implicitly conjoined
    Flat,
    /// Top-level conjuncts live in an explicit `$and` list
    Conjunction,
}

/// Builds selector documents for one entity scope
pub struct SelectorBuilder<'a> {
    discriminator: &'a str,
    default_limit: u64,
    logger: &'a Logger,
}

impl<'a> SelectorBuilder<'a> {
    pub fn new(config: &'a StatementConfig, logger: &'a Logger) -> Self {
        Self {
            discriminator: &config.discriminator_field,
            default_limit: config.default_limit,
            logger,
        }
    }

    /// Builds the selector document for `scope`.
    ///
    /// Deterministic: same inputs produce the same document.
    pub fn build(
        &self,
        scope: &str,
        condition: Option<&Condition>,
        order_by: &[OrderBy],
        limit: Option<u64>,
        offset: Option<u64>,
    ) -> StatementResult<SelectorDocument> {
        if let Some(cond) = condition {
            cond.validate()?;
        }

        let (mut selector, shape) = match condition {
            None => (Clause::new(), RootShape::Flat),
            Some(cond) => match cond.group_op() {
                Some(GroupOperator::And) => {
                    let mut root = Clause::new();
                    let members = self.members(cond, GroupOperator::And)?;
                    root.insert(SelectorToken::And.as_str().to_string(), Value::Array(members));
                    (root, RootShape::Flat)
                }
                Some(GroupOperator::Or) => {
                    let mut root = Clause::new();
                    let or_clause = Value::Object(self.lower(cond)?);
                    root.insert(
                        SelectorToken::And.as_str().to_string(),
                        Value::Array(vec![or_clause]),
                    );
                    (root, RootShape::Conjunction)
                }
                None => (self.lower(cond)?, RootShape::Flat),
            },
        };

        if !self.has_scope(&selector) {
            add_conjunct(
                &mut selector,
                shape,
                self.discriminator,
                Value::String(scope.to_string()),
            );
        }

        for order in order_by {
            if !has_field_clause(&selector, &order.field) {
                add_conjunct(
                    &mut selector,
                    shape,
                    &order.field,
                    op_map(SelectorToken::Gt, Value::Null),
                );
            }
        }

        let limit = match limit {
            Some(limit) => limit,
            None => {
                let default = self.default_limit.to_string();
                self.logger.event(
                    QueryEvent::DefaultLimitApplied,
                    &[("entity", scope), ("limit", &default)],
                );
                self.default_limit
            }
        };

        Ok(SelectorDocument {
            selector,
            sort: order_by
                .iter()
                .map(|o| BTreeMap::from([(o.field.clone(), o.direction)]))
                .collect(),
            fields: None,
            limit: Some(limit),
            skip: offset.filter(|o| *o > 0),
            bookmark: None,
        })
    }

    /// Lowers any condition into a single clause
    pub fn lower(&self, condition: &Condition) -> StatementResult<Clause> {
        let mut clause = Clause::new();

        match condition {
            Condition::Leaf {
                attribute,
                operator,
                value,
            } => {
                clause.insert(attribute.clone(), lower_operand(attribute, *operator, value)?);
            }
            Condition::Not { inner } => match inner.as_ref() {
                Condition::Leaf {
                    attribute,
                    operator,
                    value,
                } => {
                    let negated = op_map(SelectorToken::Not, lower_operand(attribute, *operator, value)?);
                    clause.insert(attribute.clone(), negated);
                }
                group => {
                    clause.insert(
                        SelectorToken::Not.as_str().to_string(),
                        Value::Object(self.lower(group)?),
                    );
                }
            },
            Condition::Group { op, .. } => {
                let members = self.members(condition, *op)?;
                clause.insert(translate_group(*op).as_str().to_string(), Value::Array(members));
            }
        }

        Ok(clause)
    }

    /// Lowered members of a group, with same-operator subgroups flattened
    fn members(&self, condition: &Condition, op: GroupOperator) -> StatementResult<Vec<Value>> {
        let mut out = Vec::new();
        self.collect_members(condition, op, &mut out)?;
        Ok(out)
    }

    fn collect_members(
        &self,
        condition: &Condition,
        op: GroupOperator,
        out: &mut Vec<Value>,
    ) -> StatementResult<()> {
        match condition {
            Condition::Group {
                left,
                op: inner_op,
                right,
            } if *inner_op == op => {
                self.collect_members(left, op, out)?;
                self.collect_members(right, op, out)
            }
            other => {
                out.push(Value::Object(self.lower(other)?));
                Ok(())
            }
        }
    }

    /// Whether a top-level conjunct already pins the discriminator by equality
    fn has_scope(&self, selector: &Clause) -> bool {
        top_level_conjuncts(selector)
            .filter_map(|clause| clause.get(self.discriminator))
            .any(is_equality)
    }
}

fn lower_operand(attribute: &str, operator: Operator, value: &Value) -> StatementResult<Value> {
    let mut ops = Map::new();

    match operator {
        Operator::Between => {
            let (min, max) = match value.as_array().map(Vec::as_slice) {
                Some([min, max]) => (min, max),
                _ => {
                    return Err(StatementError::query(format!(
                        "Invalid value for '{}' between: expected [min, max]",
                        attribute
                    )));
                }
            };
            ops.insert(SelectorToken::Gte.as_str().to_string(), min.clone());
            ops.insert(SelectorToken::Lte.as_str().to_string(), max.clone());
        }
        Operator::StartsWith => {
            let prefix = expect_str(attribute, operator, value)?;
            let (lower, upper) = prefix_range(prefix);
            ops.insert(SelectorToken::Gte.as_str().to_string(), Value::String(lower));
            if let Some(upper) = upper {
                ops.insert(SelectorToken::Lt.as_str().to_string(), Value::String(upper));
            }
        }
        Operator::EndsWith => {
            let suffix = expect_str(attribute, operator, value)?;
            ops.insert(
                SelectorToken::Regex.as_str().to_string(),
                json!(suffix_pattern(suffix)),
            );
        }
        direct => {
            ops.insert(translate(direct)?.as_str().to_string(), value.clone());
        }
    }

    Ok(Value::Object(ops))
}

/// `{token: value}`
fn op_map(token: SelectorToken, value: Value) -> Value {
    let mut ops = Map::new();
    ops.insert(token.as_str().to_string(), value);
    Value::Object(ops)
}

fn expect_str<'v>(attribute: &str, operator: Operator, value: &'v Value) -> StatementResult<&'v str> {
    value.as_str().ok_or_else(|| {
        StatementError::query(format!(
            "Invalid value for '{}' {}: expected a string",
            attribute, operator
        ))
    })
}

/// The selector itself plus each object in its top-level `$and` list
fn top_level_conjuncts(selector: &Clause) -> impl Iterator<Item = &Clause> {
    let nested = selector
        .get(SelectorToken::And.as_str())
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_object);

    std::iter::once(selector).chain(nested)
}

fn has_field_clause(selector: &Clause, field: &str) -> bool {
    top_level_conjuncts(selector).any(|clause| clause.contains_key(field))
}

/// A literal, or an operator map holding only `$eq`
fn is_equality(constraint: &Value) -> bool {
    match constraint {
        Value::Object(ops) => ops.len() == 1 && ops.contains_key(SelectorToken::Eq.as_str()),
        _ => true,
    }
}

/// Adds `{key: constraint}` as a top-level conjunct without overwriting an
/// existing clause on the same key.
fn add_conjunct(selector: &mut Clause, shape: RootShape, key: &str, constraint: Value) {
    if shape == RootShape::Flat && !selector.contains_key(key) {
        selector.insert(key.to_string(), constraint);
        return;
    }

    let mut clause = Clause::new();
    clause.insert(key.to_string(), constraint);

    let and_key = SelectorToken::And.as_str();
    match selector.get_mut(and_key) {
        Some(Value::Array(list)) => list.push(Value::Object(clause)),
        _ => {
            selector.insert(and_key.to_string(), Value::Array(vec![Value::Object(clause)]));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(condition: Option<&Condition>, order_by: &[OrderBy]) -> SelectorDocument {
        let config = StatementConfig::default();
        let logger = Logger::silent();
        SelectorBuilder::new(&config, &logger)
            .build("user", condition, order_by, Some(25), None)
            .unwrap()
    }

    #[test]
    fn test_no_condition_scopes_by_discriminator() {
        let doc = build(None, &[]);
        assert_eq!(Value::Object(doc.selector), json!({"??table": "user"}));
        assert_eq!(doc.limit, Some(25));
    }

    #[test]
    fn test_equality_leaf() {
        let cond = Condition::attr("email").eq("a@b.com");
        let doc = build(Some(&cond), &[]);
        assert_eq!(
            Value::Object(doc.selector),
            json!({"email": {"$eq": "a@b.com"}, "??table": "user"})
        );
    }

    #[test]
    fn test_direct_operators() {
        let cases = [
            (Condition::attr("a").neq(1), json!({"$ne": 1})),
            (Condition::attr("a").gt(1), json!({"$gt": 1})),
            (Condition::attr("a").gte(1), json!({"$gte": 1})),
            (Condition::attr("a").lt(1), json!({"$lt": 1})),
            (Condition::attr("a").lte(1), json!({"$lte": 1})),
            (Condition::attr("a").regex("^x"), json!({"$regex": "^x"})),
            (Condition::attr("a").in_list([1, 2]), json!({"$in": [1, 2]})),
        ];

        for (cond, expected) in cases {
            let doc = build(Some(&cond), &[]);
            assert_eq!(doc.selector["a"], expected);
        }
    }

    #[test]
    fn test_between_single_operator_map() {
        let cond = Condition::attr("age").between(18, 30);
        let doc = build(Some(&cond), &[]);
        assert_eq!(doc.selector["age"], json!({"$gte": 18, "$lte": 30}));
        assert_eq!(doc.selector.len(), 2);
    }

    #[test]
    fn test_inverted_between_still_builds() {
        let cond = Condition::attr("age").between(30, 18);
        let doc = build(Some(&cond), &[]);
        assert_eq!(doc.selector["age"], json!({"$gte": 30, "$lte": 18}));
    }

    #[test]
    fn test_starts_with_range() {
        let cond = Condition::attr("name").starts_with("Al");
        let doc = build(Some(&cond), &[]);
        assert_eq!(doc.selector["name"], json!({"$gte": "Al", "$lt": "Am"}));
    }

    #[test]
    fn test_empty_prefix_is_open_range() {
        let cond = Condition::attr("name").starts_with("");
        let doc = build(Some(&cond), &[]);
        assert_eq!(doc.selector["name"], json!({"$gte": ""}));
    }

    #[test]
    fn test_maximal_prefix_is_open_range() {
        let prefix = char::MAX.to_string();
        let cond = Condition::attr("name").starts_with(prefix.as_str());
        let doc = build(Some(&cond), &[]);
        assert_eq!(doc.selector["name"], json!({"$gte": prefix}));
    }

    #[test]
    fn test_ends_with_escaped_regex() {
        let cond = Condition::attr("email").ends_with(".com");
        let doc = build(Some(&cond), &[]);
        assert_eq!(doc.selector["email"], json!({"$regex": "\\.com$"}));
    }

    #[test]
    fn test_not_leaf_scoped_to_attribute() {
        let cond = !Condition::attr("age").gt(5);
        let doc = build(Some(&cond), &[]);
        assert_eq!(doc.selector["age"], json!({"$not": {"$gt": 5}}));
    }

    #[test]
    fn test_not_group() {
        let cond = !(Condition::attr("a").eq(1).or(Condition::attr("b").eq(2)));
        let doc = build(Some(&cond), &[]);
        assert_eq!(
            Value::Object(doc.selector),
            json!({
                "$not": {"$or": [{"a": {"$eq": 1}}, {"b": {"$eq": 2}}]},
                "??table": "user"
            })
        );
    }

    #[test]
    fn test_and_flattens() {
        let a = Condition::attr("a").eq(1);
        let b = Condition::attr("b").eq(2);
        let c = Condition::attr("c").eq(3);
        let doc = build(Some(&a.and(b).and(c)), &[]);

        assert_eq!(
            Value::Object(doc.selector),
            json!({
                "$and": [{"a": {"$eq": 1}}, {"b": {"$eq": 2}}, {"c": {"$eq": 3}}],
                "??table": "user"
            })
        );
    }

    #[test]
    fn test_right_nested_and_flattens() {
        let a = Condition::attr("a").eq(1);
        let b = Condition::attr("b").eq(2);
        let c = Condition::attr("c").eq(3);
        let doc = build(Some(&a.and(b.and(c))), &[]);
        assert_eq!(doc.selector["$and"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn test_or_wrapped_with_scope() {
        let cond = Condition::attr("a").eq(1).or(Condition::attr("b").eq(2));
        let doc = build(Some(&cond), &[]);

        assert_eq!(
            Value::Object(doc.selector),
            json!({
                "$and": [
                    {"$or": [{"a": {"$eq": 1}}, {"b": {"$eq": 2}}]},
                    {"??table": "user"}
                ]
            })
        );
    }

    #[test]
    fn test_or_inside_and_stays_nested() {
        let either = Condition::attr("a").eq(1).or(Condition::attr("b").eq(2));
        let cond = Condition::attr("c").gt(0).and(either);
        let doc = build(Some(&cond), &[]);

        let members = doc.selector["$and"].as_array().unwrap();
        assert_eq!(members.len(), 2);
        assert_eq!(members[1]["$or"].as_array().unwrap().len(), 2);
        assert_eq!(doc.selector["??table"], json!("user"));
    }

    #[test]
    fn test_explicit_discriminator_wins() {
        let cond = Condition::attr("??table").eq("admin");
        let doc = build(Some(&cond), &[]);
        assert_eq!(
            Value::Object(doc.selector),
            json!({"??table": {"$eq": "admin"}})
        );
    }

    #[test]
    fn test_explicit_discriminator_in_and() {
        let cond = Condition::attr("??table")
            .eq("admin")
            .and(Condition::attr("age").gt(1));
        let doc = build(Some(&cond), &[]);
        assert!(doc.selector.get("??table").is_none());
        assert_eq!(doc.selector["$and"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_non_equality_discriminator_keeps_scope() {
        let cond = Condition::attr("??table").neq("admin");
        let doc = build(Some(&cond), &[]);
        assert_eq!(
            Value::Object(doc.selector),
            json!({
                "??table": {"$ne": "admin"},
                "$and": [{"??table": "user"}]
            })
        );
    }

    #[test]
    fn test_sort_fields_get_existence_clause() {
        let cond = Condition::attr("age").gt(18);
        let doc = build(Some(&cond), &[OrderBy::desc("age"), OrderBy::asc("name")]);

        assert_eq!(doc.selector["age"], json!({"$gt": 18}));
        assert_eq!(doc.selector["name"], json!({"$gt": null}));
        assert_eq!(
            serde_json::to_value(&doc.sort).unwrap(),
            json!([{"age": "desc"}, {"name": "asc"}])
        );
    }

    #[test]
    fn test_sort_fields_inside_or_root() {
        let cond = Condition::attr("a").eq(1).or(Condition::attr("b").eq(2));
        let doc = build(Some(&cond), &[OrderBy::asc("a")]);

        let members = doc.selector["$and"].as_array().unwrap();
        assert_eq!(members.len(), 3);
        assert_eq!(members[2], json!({"a": {"$gt": null}}));
    }

    #[test]
    fn test_default_limit_warns() {
        let config = StatementConfig::default();
        let (logger, buffer) = Logger::buffered();
        let doc = SelectorBuilder::new(&config, &logger)
            .build("user", None, &[], None, None)
            .unwrap();

        assert_eq!(doc.limit, Some(100));
        let lines = buffer.lock().unwrap();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("QUERY_DEFAULT_LIMIT_APPLIED"));
        assert!(lines[0].contains("WARN"));
    }

    #[test]
    fn test_offset_becomes_skip() {
        let config = StatementConfig::default();
        let logger = Logger::silent();
        let builder = SelectorBuilder::new(&config, &logger);

        let doc = builder.build("user", None, &[], Some(10), Some(20)).unwrap();
        assert_eq!(doc.skip, Some(20));

        let doc = builder.build("user", None, &[], Some(10), Some(0)).unwrap();
        assert_eq!(doc.skip, None);
    }

    #[test]
    fn test_invalid_condition_rejected() {
        let config = StatementConfig::default();
        let logger = Logger::silent();
        let cond = Condition::leaf("age", Operator::Between, json!([1]));

        let err = SelectorBuilder::new(&config, &logger)
            .build("user", Some(&cond), &[], None, None)
            .unwrap_err();
        assert_eq!(err.code(), "LEDGER_QUERY_INVALID");
    }

    #[test]
    fn test_document_json_shape() {
        let cond = Condition::attr("age").gt(1);
        let doc = build(Some(&cond), &[OrderBy::asc("age")]).with_fields(Some(vec!["name".into()]));

        assert_eq!(
            doc.to_json(),
            json!({
                "selector": {"age": {"$gt": 1}, "??table": "user"},
                "sort": [{"age": "asc"}],
                "fields": ["name"],
                "limit": 25
            })
        );
    }

    #[test]
    fn test_deterministic() {
        let cond = Condition::attr("a")
            .eq(1)
            .and(Condition::attr("b").starts_with("x").or(Condition::attr("c").lt(3)));
        let first = build(Some(&cond), &[OrderBy::asc("d")]).to_json();
        for _ in 0..10 {
            assert_eq!(build(Some(&cond), &[OrderBy::asc("d")]).to_json(), first);
        }
    }

    #[test]
    fn test_raw_document_validation() {
        let doc = SelectorDocument::from_json(json!({
            "selector": {"$or": [{"a": 1}, {"b": 2}], "??table": "user"},
            "limit": 10
        }))
        .unwrap();
        assert_eq!(doc.limit, Some(10));

        let err = SelectorDocument::from_json(json!({"selector": {"$where": "1"}})).unwrap_err();
        assert!(err.to_string().contains("$where"));

        assert!(SelectorDocument::from_json(json!({"selector": {"$and": {"a": 1}}})).is_err());
        assert!(SelectorDocument::from_json(json!({"limit": 10})).is_err());
    }
}
