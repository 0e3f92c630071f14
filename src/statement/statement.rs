//! Statement façade
//!
//! A statement collects a condition, projection, ordering and aggregator
//! intents, freezes them into exactly one executable artifact, and runs that
//! artifact once:
//!
//! ```text
//! Building --prepare()--> Prepared --execute()--> Executed
//! ```
//!
//! Preparation tries, in order: a raw selector document, an aggregate plan,
//! a whitelisted procedure call, and finally a generated selector.

use std::mem;

use futures_util::future::try_join;
use serde_json::Value;

use crate::condition::{Condition, OrderBy};
use crate::errors::{StatementError, StatementResult};
use crate::observability::QueryEvent;
use crate::translate::{
    PreparedStatement, Procedure, SelectorBuilder, SelectorDocument, SquashPolicy, Squasher,
};
use crate::views::{
    compute_average, interpret, AggregateKind, AggregateOutput, AggregatePlan, AggregatePlanner,
    AggregateSelector, EntityModel,
};

use super::engine::QueryEngine;
use super::executor::{ExecutionContext, ExecutionRequest, QueryExecutor};
use super::explain::StatementExplain;
use super::hydrate::{hydrate_all, records_of, Hydrator};
use super::paginator::Paginator;

/// Executable artifact produced by `Statement::prepare`
#[derive(Debug, Clone, PartialEq)]
pub enum PreparedQuery {
    Selector(SelectorDocument),
    Procedure(PreparedStatement),
    Aggregate(AggregatePlan),
}

impl PreparedQuery {
    pub fn mode(&self) -> &'static str {
        match self {
            PreparedQuery::Selector(_) => "selector",
            PreparedQuery::Procedure(_) => "procedure",
            PreparedQuery::Aggregate(_) => "aggregate",
        }
    }
}

/// Result of executing a statement
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutput<R> {
    Records(Vec<R>),
    /// At most one record was requested
    Single(Option<R>),
    Aggregate(AggregateOutput),
}

impl<R> QueryOutput<R> {
    /// Records of a list or single-record result; empty for aggregates
    pub fn into_records(self) -> Vec<R> {
        match self {
            QueryOutput::Records(records) => records,
            QueryOutput::Single(record) => record.into_iter().collect(),
            QueryOutput::Aggregate(_) => Vec::new(),
        }
    }

    pub fn into_single(self) -> Option<R> {
        self.into_records().into_iter().next()
    }

    pub fn aggregate(&self) -> Option<&AggregateOutput> {
        match self {
            QueryOutput::Aggregate(output) => Some(output),
            _ => None,
        }
    }

    fn result_count(&self) -> usize {
        match self {
            QueryOutput::Records(records) => records.len(),
            QueryOutput::Single(record) => usize::from(record.is_some()),
            QueryOutput::Aggregate(_) => 1,
        }
    }
}

#[derive(Debug)]
enum StatementState {
    Building,
    Prepared(PreparedQuery),
    Executed,
}

/// Single-use query over one entity
#[derive(Debug)]
pub struct Statement<'e> {
    engine: &'e QueryEngine,
    entity: &'e EntityModel,
    condition: Option<Condition>,
    fields: Option<Vec<String>>,
    order_by: Vec<OrderBy>,
    limit: Option<u64>,
    offset: Option<u64>,
    single: bool,
    aggregates: Vec<AggregateSelector>,
    raw: Option<Value>,
    state: StatementState,
}

impl<'e> Statement<'e> {
    pub(crate) fn new(engine: &'e QueryEngine, entity: &'e EntityModel) -> Self {
        Self {
            engine,
            entity,
            condition: None,
            fields: None,
            order_by: Vec::new(),
            limit: None,
            offset: None,
            single: false,
            aggregates: Vec::new(),
            raw: None,
            state: StatementState::Building,
        }
    }

    pub fn entity(&self) -> &str {
        self.entity.name()
    }

    // ============================================================
    // Builder
    // ============================================================

    /// Adds a condition; repeated calls are conjoined
    pub fn where_(mut self, condition: Condition) -> Self {
        self.condition = Some(match self.condition.take() {
            Some(existing) => existing.and(condition),
            None => condition,
        });
        self.modified()
    }

    /// Restricts the returned fields
    pub fn select<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = Some(fields.into_iter().map(Into::into).collect());
        self.modified()
    }

    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.order_by.push(order);
        self.modified()
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self.modified()
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset).filter(|o| *o > 0);
        self.modified()
    }

    /// Expect at most one record
    pub fn single(mut self) -> Self {
        self.single = true;
        self.modified()
    }

    pub fn count(self, attribute: &str) -> Self {
        self.aggregate(AggregateKind::Count, Some(attribute))
    }

    pub fn count_all(self) -> Self {
        self.aggregate(AggregateKind::Count, None)
    }

    pub fn sum(self, attribute: &str) -> Self {
        self.aggregate(AggregateKind::Sum, Some(attribute))
    }

    pub fn min(self, attribute: &str) -> Self {
        self.aggregate(AggregateKind::Min, Some(attribute))
    }

    pub fn max(self, attribute: &str) -> Self {
        self.aggregate(AggregateKind::Max, Some(attribute))
    }

    pub fn avg(self, attribute: &str) -> Self {
        self.aggregate(AggregateKind::Avg, Some(attribute))
    }

    pub fn distinct(self, attribute: &str) -> Self {
        self.aggregate(AggregateKind::Distinct, Some(attribute))
    }

    pub fn count_distinct(self, attribute: &str) -> Self {
        self.aggregate(AggregateKind::CountDistinct, Some(attribute))
    }

    pub fn group_by(self, attribute: &str) -> Self {
        self.aggregate(AggregateKind::GroupBy, Some(attribute))
    }

    /// Sends a caller-written selector document verbatim
    pub fn raw(mut self, query: Value) -> Self {
        self.raw = Some(query);
        self.modified()
    }

    fn aggregate(mut self, kind: AggregateKind, attribute: Option<&str>) -> Self {
        self.aggregates.push(AggregateSelector::new(kind, attribute));
        self.modified()
    }

    /// Drops a cached artifact that no longer matches the builder state
    fn modified(mut self) -> Self {
        if matches!(self.state, StatementState::Prepared(_)) {
            self.state = StatementState::Building;
        }
        self
    }

    // ============================================================
    // Preparation
    // ============================================================

    /// Freezes the statement into its executable artifact
    pub fn prepare(&mut self) -> StatementResult<&PreparedQuery> {
        if matches!(self.state, StatementState::Executed) {
            return Err(StatementError::invalid_state(format!(
                "Statement on '{}' was already executed",
                self.entity.name()
            )));
        }

        if matches!(self.state, StatementState::Building) {
            let prepared = self.translate()?;
            self.engine.logger().event(
                QueryEvent::Prepared,
                &[("entity", self.entity.name()), ("mode", prepared.mode())],
            );
            self.state = StatementState::Prepared(prepared);
        }

        match &self.state {
            StatementState::Prepared(prepared) => Ok(prepared),
            _ => Err(StatementError::internal("Statement preparation lost its artifact")),
        }
    }

    /// Describes the prepared artifact, or why preparation fails
    pub fn explain(&mut self) -> StatementExplain {
        match self.prepare() {
            Ok(prepared) => StatementExplain::from_prepared(prepared),
            Err(err) => StatementExplain::from_error(&err),
        }
    }

    fn translate(&self) -> StatementResult<PreparedQuery> {
        let config = self.engine.config();
        let logger = self.engine.logger();
        let entity = self.entity.name();

        if let Some(raw) = &self.raw {
            if !config.allows_ad_hoc() {
                return Err(StatementError::unsupported(
                    "Raw queries are disabled in prepared-only mode",
                ));
            }
            if self.condition.is_some() || !self.aggregates.is_empty() {
                return Err(StatementError::query(
                    "A raw query cannot be combined with conditions or aggregates",
                ));
            }
            return SelectorDocument::from_json(raw.clone()).map(PreparedQuery::Selector);
        }

        if let Some(condition) = &self.condition {
            condition.validate()?;
        }

        if !self.aggregates.is_empty() {
            if self.condition.is_some() {
                return Err(StatementError::unsupported(
                    "Aggregate views answer whole-entity aggregates and cannot be filtered",
                ));
            }
            return AggregatePlanner::new(self.engine.registry(), logger)
                .plan(entity, &self.aggregates)
                .map(PreparedQuery::Aggregate);
        }

        let limit = if self.single { Some(1) } else { self.limit };

        if self.offset.is_none() {
            let policy = SquashPolicy {
                force_simple_queries: config.force_simple_queries,
                single_result: self.single,
            };
            let squashed = Squasher::new(self.entity.primary_key()).try_squash(
                self.condition.as_ref(),
                &self.order_by,
                limit,
                policy,
            )?;
            if let Some(stmt) = squashed {
                logger.event(
                    QueryEvent::Squashed,
                    &[("entity", entity), ("procedure", stmt.procedure.as_str())],
                );
                return Ok(PreparedQuery::Procedure(stmt));
            }
        }

        if !config.allows_ad_hoc() {
            return Err(StatementError::unsupported(format!(
                "Query on '{}' cannot be expressed as a prepared statement",
                entity
            )));
        }

        let document = SelectorBuilder::new(config, logger).build(
            entity,
            self.condition.as_ref(),
            &self.order_by,
            limit,
            self.offset,
        )?;
        Ok(PreparedQuery::Selector(
            document.with_fields(self.fields.clone()),
        ))
    }

    // ============================================================
    // Execution
    // ============================================================

    /// Runs the statement once
    pub async fn execute<E, H>(
        &mut self,
        executor: &E,
        hydrator: &H,
    ) -> StatementResult<QueryOutput<H::Record>>
    where
        E: QueryExecutor + ?Sized,
        H: Hydrator + ?Sized,
    {
        self.prepare()?;
        let prepared = match mem::replace(&mut self.state, StatementState::Executed) {
            StatementState::Prepared(prepared) => prepared,
            _ => return Err(StatementError::internal("Statement was not prepared")),
        };

        let mode = prepared.mode();
        let ctx = ExecutionContext::new(self.entity.name());
        let result = self.run(prepared, executor, hydrator, &ctx).await;

        let logger = self.engine.logger();
        match &result {
            Ok(output) => logger.event(
                QueryEvent::Executed,
                &[
                    ("entity", self.entity.name()),
                    ("mode", mode),
                    ("results", &output.result_count().to_string()),
                ],
            ),
            Err(err) => logger.event(
                QueryEvent::ExecutionFailed,
                &[
                    ("entity", self.entity.name()),
                    ("mode", mode),
                    ("code", err.code()),
                    ("error", &err.to_string()),
                ],
            ),
        }

        result
    }

    async fn run<E, H>(
        &self,
        prepared: PreparedQuery,
        executor: &E,
        hydrator: &H,
        ctx: &ExecutionContext,
    ) -> StatementResult<QueryOutput<H::Record>>
    where
        E: QueryExecutor + ?Sized,
        H: Hydrator + ?Sized,
    {
        match prepared {
            PreparedQuery::Selector(document) => {
                let request = ExecutionRequest::Selector(document);
                let raw = executor
                    .execute(&request, ctx)
                    .await
                    .map_err(StatementError::execution)?;
                let records = hydrate_all(hydrator, records_of(raw.rows)?)?;
                Ok(self.shape(records, self.single))
            }
            PreparedQuery::Procedure(stmt) => {
                let single = self.single
                    || matches!(stmt.procedure, Procedure::Find | Procedure::FindOneBy);
                let request = ExecutionRequest::Procedure(stmt);
                let raw = executor
                    .execute(&request, ctx)
                    .await
                    .map_err(StatementError::execution)?;
                let records = hydrate_all(hydrator, records_of(raw.rows)?)?;
                Ok(self.shape(records, single))
            }
            PreparedQuery::Aggregate(AggregatePlan::Average { sum, count, .. }) => {
                let sum_request = ExecutionRequest::View(sum);
                let count_request = ExecutionRequest::View(count);
                let (sum_raw, count_raw) = try_join(
                    executor.execute(&sum_request, ctx),
                    executor.execute(&count_request, ctx),
                )
                .await
                .map_err(StatementError::execution)?;

                let average = compute_average(&sum_raw.rows, &count_raw.rows)?;
                Ok(QueryOutput::Aggregate(AggregateOutput::Scalar(Value::from(
                    average,
                ))))
            }
            PreparedQuery::Aggregate(plan) => {
                let descriptor = match &plan {
                    AggregatePlan::View { descriptor, .. } => descriptor.clone(),
                    AggregatePlan::Average { .. } => {
                        return Err(StatementError::internal("Unexpected average plan"))
                    }
                };
                let request = ExecutionRequest::View(descriptor);
                let raw = executor
                    .execute(&request, ctx)
                    .await
                    .map_err(StatementError::execution)?;
                interpret(&plan, &raw.rows).map(QueryOutput::Aggregate)
            }
        }
    }

    fn shape<R>(&self, records: Vec<R>, single: bool) -> QueryOutput<R> {
        if single {
            QueryOutput::Single(records.into_iter().next())
        } else {
            QueryOutput::Records(records)
        }
    }

    // ============================================================
    // Pagination
    // ============================================================

    /// Converts the statement into a bookmark paginator.
    ///
    /// Only `pageBy` calls and selector documents page; offsets are rejected
    /// because the store cannot skip cheaply.
    pub fn paginate(mut self) -> StatementResult<Paginator> {
        if self.offset.is_some() {
            return Err(StatementError::unsupported(
                "Offset pagination is not supported; pages continue from a bookmark",
            ));
        }
        if !self.aggregates.is_empty() {
            return Err(StatementError::unsupported(
                "Aggregate statements cannot be paginated",
            ));
        }

        self.prepare()?;
        let request = match mem::replace(&mut self.state, StatementState::Executed) {
            StatementState::Prepared(PreparedQuery::Selector(document)) => {
                ExecutionRequest::Selector(document)
            }
            StatementState::Prepared(PreparedQuery::Procedure(stmt))
                if stmt.procedure == Procedure::PageBy =>
            {
                ExecutionRequest::Procedure(stmt)
            }
            StatementState::Prepared(PreparedQuery::Procedure(stmt)) => {
                return Err(StatementError::unsupported(format!(
                    "'{}' results cannot be paginated",
                    stmt.procedure
                )))
            }
            _ => {
                return Err(StatementError::unsupported(
                    "Statement cannot be paginated",
                ))
            }
        };

        Ok(Paginator::new(
            self.entity.name(),
            request,
            self.engine.logger().clone(),
        ))
    }
}
