//! Query engine
//!
//! Owns configuration, view registry and logger, and hands out statements.
//! Shared read-only between any number of concurrent statements.

use crate::config::StatementConfig;
use crate::errors::StatementResult;
use crate::observability::Logger;
use crate::views::ViewRegistry;

use super::statement::Statement;

/// Entry point for building statements
#[derive(Debug, Clone)]
pub struct QueryEngine {
    config: StatementConfig,
    registry: ViewRegistry,
    logger: Logger,
}

impl QueryEngine {
    /// Creates an engine, validating the configuration
    pub fn new(config: StatementConfig, registry: ViewRegistry) -> StatementResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            registry,
            logger: Logger::default(),
        })
    }

    /// Loads configuration and registry from JSON documents
    pub fn from_json(config_json: &str, registry_json: &str) -> StatementResult<Self> {
        Self::new(
            StatementConfig::from_json(config_json)?,
            ViewRegistry::from_json(registry_json)?,
        )
    }

    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = logger;
        self
    }

    /// Starts a statement over a registered entity
    pub fn statement(&self, entity: &str) -> StatementResult<Statement<'_>> {
        let model = self.registry.entity(entity)?;
        Ok(Statement::new(self, model))
    }

    pub fn config(&self) -> &StatementConfig {
        &self.config
    }

    pub fn registry(&self) -> &ViewRegistry {
        &self.registry
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_json() {
        let engine = QueryEngine::from_json(
            r#"{"discriminator_field": "type"}"#,
            r#"{"entities": [{"name": "user"}]}"#,
        )
        .unwrap();
        assert_eq!(engine.config().discriminator_field, "type");
        assert_eq!(engine.statement("user").unwrap().entity(), "user");
    }

    #[test]
    fn test_unknown_entity() {
        let engine = QueryEngine::new(StatementConfig::default(), ViewRegistry::default()).unwrap();
        let err = engine.statement("ghost").unwrap_err();
        assert_eq!(err.code(), "LEDGER_QUERY_INVALID");
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = StatementConfig {
            default_limit: 0,
            ..StatementConfig::default()
        };
        assert!(QueryEngine::new(config, ViewRegistry::default()).is_err());
    }
}
