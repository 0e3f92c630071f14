//! Statement execution
//!
//! The façade callers use: a `QueryEngine` creates single-use statements,
//! which prepare into a selector, a procedure call or an aggregate plan and
//! run against a caller-supplied executor.

mod engine;
mod executor;
mod explain;
mod hydrate;
mod paginator;
mod statement;

pub use engine::QueryEngine;
pub use executor::{
    ExecutionContext, ExecutionRequest, ExecutorFuture, FnExecutor, QueryExecutor, RawResult,
};
pub use explain::StatementExplain;
pub use hydrate::{hydrate_all, records_of, Hydrator, JsonHydrator, SerdeHydrator};
pub use paginator::{Page, Paginator};
pub use statement::{PreparedQuery, QueryOutput, Statement};
