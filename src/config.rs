//! Statement Configuration
//!
//! Policy and defaults applied to every statement created by a
//! `QueryEngine`. Loaded once at startup; never mutated afterwards.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{StatementError, StatementResult};

/// Limit applied when a selector query does not set one
pub const DEFAULT_LIMIT: u64 = 100;

/// Field naming the logical entity of a stored document
pub const DEFAULT_DISCRIMINATOR: &str = "??table";

/// Statement configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementConfig {
    /// Discriminator field injected into every selector (default: "??table")
    #[serde(default = "default_discriminator")]
    pub discriminator_field: String,

    /// Limit used when none is given (default: 100)
    #[serde(default = "default_limit")]
    pub default_limit: u64,

    /// Convert eligible queries into procedure calls (default: false)
    #[serde(default)]
    pub force_simple_queries: bool,

    /// Reject every query that cannot become a procedure call (default: false)
    #[serde(default)]
    pub prepared_only: bool,
}

fn default_discriminator() -> String {
    DEFAULT_DISCRIMINATOR.to_string()
}

fn default_limit() -> u64 {
    DEFAULT_LIMIT
}

impl Default for StatementConfig {
    fn default() -> Self {
        Self {
            discriminator_field: default_discriminator(),
            default_limit: default_limit(),
            force_simple_queries: false,
            prepared_only: false,
        }
    }
}

impl StatementConfig {
    /// Configuration for execution boundaries that only accept procedure calls.
    ///
    /// Squashing is forced and anything that cannot be squashed is rejected.
    pub fn prepared_only() -> Self {
        Self {
            force_simple_queries: true,
            prepared_only: true,
            ..Self::default()
        }
    }

    /// Enables or disables squashing into procedure calls
    pub fn with_force_simple_queries(mut self, force: bool) -> Self {
        self.force_simple_queries = force;
        self
    }

    /// Parses and validates a JSON configuration document
    pub fn from_json(json: &str) -> StatementResult<Self> {
        let config: Self = parse_object(json, "statement config")?;
        config.validate()?;
        Ok(config)
    }

    /// Checks internal consistency
    pub fn validate(&self) -> StatementResult<()> {
        if self.discriminator_field.is_empty() {
            return Err(StatementError::config("discriminator_field must not be empty"));
        }
        if self.default_limit == 0 {
            return Err(StatementError::config("default_limit must be positive"));
        }
        if self.prepared_only && !self.force_simple_queries {
            return Err(StatementError::config(
                "prepared_only requires force_simple_queries",
            ));
        }
        Ok(())
    }

    /// Whether ad-hoc selector queries may be sent to the executor
    pub fn allows_ad_hoc(&self) -> bool {
        !self.prepared_only
    }
}

/// Deserializes a JSON document that must be an object.
///
/// Derived struct visitors also accept sequences, so `[]` would otherwise
/// load as an all-defaults value.
pub(crate) fn parse_object<T: DeserializeOwned>(json: &str, what: &str) -> StatementResult<T> {
    let value: Value = serde_json::from_str(json)
        .map_err(|e| StatementError::config(format!("Invalid {}: {}", what, e)))?;
    if !value.is_object() {
        return Err(StatementError::config(format!(
            "Invalid {}: expected a JSON object",
            what
        )));
    }
    serde_json::from_value(value)
        .map_err(|e| StatementError::config(format!("Invalid {}: {}", what, e)))
}
