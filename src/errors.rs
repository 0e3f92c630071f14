//! # Statement Errors
//!
//! Error taxonomy shared by translation, planning, interpretation and execution.
//!
//! Error codes:
//! - LEDGER_QUERY_INVALID
//! - LEDGER_QUERY_INTERNAL
//! - LEDGER_QUERY_SERIALIZATION
//! - LEDGER_QUERY_UNSUPPORTED
//! - LEDGER_QUERY_INVALID_STATE
//! - LEDGER_QUERY_EXECUTION
//! - LEDGER_QUERY_CONFIG

use thiserror::Error;

/// Error raised by a caller-supplied executor, carried verbatim
pub type ExecutorError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type for statement operations
pub type StatementResult<T> = Result<T, StatementError>;

/// Statement errors
#[derive(Debug, Error)]
pub enum StatementError {
    // ==================
    // Caller Errors
    // ==================
    /// Unsupported operator, ill-formed condition, missing view metadata,
    /// or conflicting aggregators
    #[error("Query error: {0}")]
    Query(String),

    /// Query shape not permitted by the active policy
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// Statement used outside its lifecycle
    #[error("Invalid statement state: {0}")]
    InvalidState(String),

    /// Configuration or registry document could not be loaded
    #[error("Configuration error: {0}")]
    Config(String),

    // ==================
    // Boundary Errors
    // ==================
    /// Rows or records do not have the expected shape
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Executor failure
    #[error("Execution failed: {0}")]
    Execution(#[source] ExecutorError),

    // ==================
    // Translator Bugs
    // ==================
    /// Procedure name outside the known whitelist
    #[error("Internal error: {0}")]
    Internal(String),
}

impl StatementError {
    /// Create a query error
    pub fn query(msg: impl Into<String>) -> Self {
        Self::Query(msg.into())
    }

    /// Create an unsupported error
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported(msg.into())
    }

    /// Create a serialization error
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Create an invalid state error
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Wrap an executor failure without altering it
    pub fn execution(err: impl Into<ExecutorError>) -> Self {
        Self::Execution(err.into())
    }

    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            Self::Query(_) => "LEDGER_QUERY_INVALID",
            Self::Unsupported(_) => "LEDGER_QUERY_UNSUPPORTED",
            Self::InvalidState(_) => "LEDGER_QUERY_INVALID_STATE",
            Self::Config(_) => "LEDGER_QUERY_CONFIG",
            Self::Serialization(_) => "LEDGER_QUERY_SERIALIZATION",
            Self::Execution(_) => "LEDGER_QUERY_EXECUTION",
            Self::Internal(_) => "LEDGER_QUERY_INTERNAL",
        }
    }

    /// Whether the error indicates a bug in this crate rather than bad input
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::Internal(_))
    }
}

impl From<serde_json::Error> for StatementError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}
