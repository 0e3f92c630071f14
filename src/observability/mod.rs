//! Observability for statement preparation and execution
//!
//! - Structured logging (JSON, one line per event)
//! - Typed lifecycle events
//!
//! Observability is read-only: nothing logged here changes a translation,
//! a plan or a result.
//!
//! ```ignore
//! use ledger_query::observability::{Logger, QueryEvent};
//!
//! let logger = Logger::default();
//! logger.event(QueryEvent::Executed, &[("entity", "user"), ("rows", "42")]);
//! ```

mod events;
mod logger;

pub use events::QueryEvent;
pub use logger::{LogSink, Logger, Severity};
