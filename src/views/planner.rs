//! Aggregate planner
//!
//! Resolves the aggregator intents of a statement to registered views. View
//! selection is a metadata lookup, never a search: the first kind present in
//! priority order wins, and asking for two kinds at once is rejected because
//! one physical view answers exactly one aggregate.

use serde::Serialize;

use crate::errors::{StatementError, StatementResult};
use crate::observability::{Logger, QueryEvent};

use super::registry::{AggregateKind, ViewDescriptor, ViewRegistry};

/// Kinds in the order the planner checks them
pub const PRIORITY: [AggregateKind; 8] = [
    AggregateKind::Avg,
    AggregateKind::CountDistinct,
    AggregateKind::Count,
    AggregateKind::Max,
    AggregateKind::Min,
    AggregateKind::Sum,
    AggregateKind::Distinct,
    AggregateKind::GroupBy,
];

/// One aggregator intent attached to a statement
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregateSelector {
    pub kind: AggregateKind,
    pub attribute: Option<String>,
}

impl AggregateSelector {
    pub fn new(kind: AggregateKind, attribute: Option<&str>) -> Self {
        Self {
            kind,
            attribute: attribute.map(str::to_string),
        }
    }
}

/// Execution plan for an aggregate statement
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum AggregatePlan {
    /// Single view lookup
    View {
        kind: AggregateKind,
        descriptor: ViewDescriptor,
        /// Count the rows of a distinct view instead of returning them
        count_distinct: bool,
    },
    /// Concurrent sum and count lookups divided client-side
    Average {
        attribute: String,
        sum: ViewDescriptor,
        count: ViewDescriptor,
    },
}

impl AggregatePlan {
    /// Kind the caller asked for
    pub fn requested_kind(&self) -> AggregateKind {
        match self {
            AggregatePlan::View {
                count_distinct: true,
                ..
            } => AggregateKind::CountDistinct,
            AggregatePlan::View { kind, .. } => *kind,
            AggregatePlan::Average { .. } => AggregateKind::Avg,
        }
    }

    /// Descriptors looked up when the plan runs
    pub fn descriptors(&self) -> Vec<&ViewDescriptor> {
        match self {
            AggregatePlan::View { descriptor, .. } => vec![descriptor],
            AggregatePlan::Average { sum, count, .. } => vec![sum, count],
        }
    }
}

/// Builds aggregate plans from registry metadata
pub struct AggregatePlanner<'a> {
    registry: &'a ViewRegistry,
    logger: &'a Logger,
}

impl<'a> AggregatePlanner<'a> {
    pub fn new(registry: &'a ViewRegistry, logger: &'a Logger) -> Self {
        Self { registry, logger }
    }

    /// Plans the aggregate for `entity`
    pub fn plan(
        &self,
        entity: &str,
        request: &[AggregateSelector],
    ) -> StatementResult<AggregatePlan> {
        let requested: Vec<&AggregateSelector> = PRIORITY
            .iter()
            .filter_map(|kind| request.iter().find(|s| s.kind == *kind))
            .collect();

        let selector = match requested.as_slice() {
            [] => return Err(StatementError::query("No aggregate requested")),
            [selector] => *selector,
            [first, second, ..] => {
                return Err(StatementError::query(format!(
                    "Cannot combine '{}' and '{}' in one statement",
                    first.kind, second.kind
                )))
            }
        };

        // Same kind twice must target the same attribute
        if let Some(other) = request
            .iter()
            .find(|s| s.kind == selector.kind && s.attribute != selector.attribute)
        {
            return Err(StatementError::query(format!(
                "Cannot request '{}' over both {} and {}",
                selector.kind,
                selector.attribute.as_deref().unwrap_or("*"),
                other.attribute.as_deref().unwrap_or("*")
            )));
        }

        let attribute = selector.attribute.as_deref();
        let plan = match selector.kind {
            AggregateKind::Avg => {
                let attribute = attribute
                    .ok_or_else(|| StatementError::query("'avg' requires an attribute"))?;
                AggregatePlan::Average {
                    attribute: attribute.to_string(),
                    sum: self
                        .registry
                        .lookup(entity, AggregateKind::Sum, Some(attribute))?
                        .clone(),
                    count: self
                        .registry
                        .lookup(entity, AggregateKind::Count, Some(attribute))?
                        .clone(),
                }
            }
            AggregateKind::CountDistinct => AggregatePlan::View {
                kind: AggregateKind::Distinct,
                descriptor: self
                    .registry
                    .lookup(entity, AggregateKind::Distinct, attribute)?
                    .clone(),
                count_distinct: true,
            },
            kind => AggregatePlan::View {
                kind,
                descriptor: self.registry.lookup(entity, kind, attribute)?.clone(),
                count_distinct: false,
            },
        };

        let views: Vec<&str> = plan
            .descriptors()
            .iter()
            .map(|d| d.view_name.as_str())
            .collect();
        self.logger.event(
            QueryEvent::AggregatePlanned,
            &[
                ("entity", entity),
                ("kind", selector.kind.as_str()),
                ("views", &views.join(",")),
            ],
        );

        Ok(plan)
    }
}
