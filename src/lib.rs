//! ledger-query - condition translation and aggregation for a ledger-backed document store
//!
//! Translates fluent condition trees into selector documents, whitelisted
//! procedure calls or aggregate view lookups, and interprets the results.
//! The engine performs no I/O of its own.

pub mod condition;
pub mod config;
pub mod errors;
pub mod observability;
pub mod statement;
pub mod translate;
pub mod views;

pub use condition::{Condition, Operator, OrderBy, SortDirection};
pub use config::StatementConfig;
pub use errors::{ExecutorError, StatementError, StatementResult};
pub use statement::{QueryEngine, QueryExecutor, QueryOutput, Statement};
pub use views::{RegistryConfig, ViewRegistry};
