//! Execution boundary
//!
//! The engine never performs I/O. Every prepared artifact is handed to a
//! caller-supplied `QueryExecutor`, whose failures are propagated wrapped.

use std::future::Future;
use std::pin::Pin;

use serde::Serialize;
use serde_json::Value;

use crate::errors::ExecutorError;
use crate::translate::{PreparedStatement, SelectorDocument};
use crate::views::ViewDescriptor;

/// Future returned by an executor
pub type ExecutorFuture<'a> =
    Pin<Box<dyn Future<Output = Result<RawResult, ExecutorError>> + Send + 'a>>;

/// Artifact sent to the executor
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum ExecutionRequest {
    /// Declarative selector query
    Selector(SelectorDocument),
    /// Whitelisted procedure call
    Procedure(PreparedStatement),
    /// Materialized view lookup
    View(ViewDescriptor),
}

impl ExecutionRequest {
    /// Short label used in log events
    pub fn mode(&self) -> &'static str {
        match self {
            ExecutionRequest::Selector(_) => "selector",
            ExecutionRequest::Procedure(_) => "procedure",
            ExecutionRequest::View(_) => "view",
        }
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Per-call context
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionContext {
    pub entity: String,
    /// Opaque continuation token from the previous page
    pub bookmark: Option<String>,
}

impl ExecutionContext {
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            bookmark: None,
        }
    }

    pub fn with_bookmark(mut self, bookmark: Option<String>) -> Self {
        self.bookmark = bookmark;
        self
    }
}

/// Unprocessed executor response
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawResult {
    pub rows: Value,
    pub bookmark: Option<String>,
}

impl RawResult {
    pub fn new(rows: Value) -> Self {
        Self {
            rows,
            bookmark: None,
        }
    }

    pub fn with_bookmark(mut self, bookmark: impl Into<String>) -> Self {
        self.bookmark = Some(bookmark.into());
        self
    }
}

/// Executes prepared artifacts against the store
pub trait QueryExecutor: Send + Sync {
    fn execute(&self, request: &ExecutionRequest, ctx: &ExecutionContext) -> ExecutorFuture<'_>;
}

/// Adapts an async closure into a `QueryExecutor`
pub struct FnExecutor<F>(F);

impl<F, Fut> FnExecutor<F>
where
    F: Fn(ExecutionRequest, ExecutionContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<RawResult, ExecutorError>> + Send + 'static,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F, Fut> QueryExecutor for FnExecutor<F>
where
    F: Fn(ExecutionRequest, ExecutionContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<RawResult, ExecutorError>> + Send + 'static,
{
    fn execute(&self, request: &ExecutionRequest, ctx: &ExecutionContext) -> ExecutorFuture<'_> {
        Box::pin((self.0)(request.clone(), ctx.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translate::Procedure;
    use serde_json::json;

    #[test]
    fn test_request_json() {
        let stmt = PreparedStatement::new(Procedure::Find, vec![json!("u1")]).unwrap();
        let request = ExecutionRequest::Procedure(stmt);
        assert_eq!(request.mode(), "procedure");
        assert_eq!(
            request.to_json(),
            json!({"type": "procedure", "payload": {"procedure": "find", "args": ["u1"]}})
        );
    }

    #[test]
    fn test_context() {
        let ctx = ExecutionContext::new("user").with_bookmark(Some("b1".to_string()));
        assert_eq!(ctx.entity, "user");
        assert_eq!(ctx.bookmark.as_deref(), Some("b1"));
    }

    #[test]
    fn test_fn_executor_is_an_executor() {
        fn assert_executor<E: QueryExecutor>(_: &E) {}
        let executor = FnExecutor::new(|_req: ExecutionRequest, _ctx: ExecutionContext| async {
            Ok::<_, ExecutorError>(RawResult::new(json!([])))
        });
        assert_executor(&executor);
    }
}
