//! Observable query lifecycle events
//!
//! Events are explicit and typed.

use std::fmt;

use super::logger::Severity;

/// Observable events emitted while preparing and executing statements
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryEvent {
    /// Statement frozen into a selector, procedure call or aggregate plan
    Prepared,
    /// No limit given, the configured default was applied
    DefaultLimitApplied,
    /// Query converted into a whitelisted procedure call
    Squashed,
    /// Aggregate resolved to one or two view lookups
    AggregatePlanned,
    /// Executor returned successfully
    Executed,
    /// Executor or interpreter failed
    ExecutionFailed,
    /// Paginator fetched a page
    PageFetched,
}

impl QueryEvent {
    /// Returns the event name
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryEvent::Prepared => "QUERY_PREPARED",
            QueryEvent::DefaultLimitApplied => "QUERY_DEFAULT_LIMIT_APPLIED",
            QueryEvent::Squashed => "QUERY_SQUASHED",
            QueryEvent::AggregatePlanned => "QUERY_AGGREGATE_PLANNED",
            QueryEvent::Executed => "QUERY_EXECUTED",
            QueryEvent::ExecutionFailed => "QUERY_EXECUTION_FAILED",
            QueryEvent::PageFetched => "QUERY_PAGE_FETCHED",
        }
    }

    /// Default severity for this event
    pub fn severity(&self) -> Severity {
        match self {
            QueryEvent::DefaultLimitApplied => Severity::Warn,
            QueryEvent::ExecutionFailed => Severity::Error,
            QueryEvent::Prepared | QueryEvent::Squashed | QueryEvent::AggregatePlanned => {
                Severity::Trace
            }
            QueryEvent::Executed | QueryEvent::PageFetched => Severity::Info,
        }
    }
}

impl fmt::Display for QueryEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
