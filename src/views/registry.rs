//! View metadata registry
//!
//! Static per-entity metadata describing which materialized views exist and
//! how to address them. Built once from `RegistryConfig` at startup and
//! read-only afterwards.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::parse_object;
use crate::errors::{StatementError, StatementResult};

/// Primary key attribute used when an entity does not name one
pub const DEFAULT_PRIMARY_KEY: &str = "id";

/// Aggregator kinds a statement may request
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AggregateKind {
    Count,
    Sum,
    Min,
    Max,
    Distinct,
    GroupBy,
    Avg,
    CountDistinct,
}

impl AggregateKind {
    pub const ALL: [AggregateKind; 8] = [
        AggregateKind::Count,
        AggregateKind::Sum,
        AggregateKind::Min,
        AggregateKind::Max,
        AggregateKind::Distinct,
        AggregateKind::GroupBy,
        AggregateKind::Avg,
        AggregateKind::CountDistinct,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AggregateKind::Count => "count",
            AggregateKind::Sum => "sum",
            AggregateKind::Min => "min",
            AggregateKind::Max => "max",
            AggregateKind::Distinct => "distinct",
            AggregateKind::GroupBy => "groupBy",
            AggregateKind::Avg => "avg",
            AggregateKind::CountDistinct => "countDistinct",
        }
    }

    /// Whether a single physical view answers this kind.
    ///
    /// `avg` combines a sum and a count view; `countDistinct` reads a
    /// distinct view.
    pub fn is_view_backed(&self) -> bool {
        !matches!(self, AggregateKind::Avg | AggregateKind::CountDistinct)
    }

    /// One output row per distinct key
    pub fn is_grouping(&self) -> bool {
        matches!(self, AggregateKind::Distinct | AggregateKind::GroupBy)
    }
}

impl fmt::Display for AggregateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AggregateKind {
    type Err = StatementError;

    fn from_str(s: &str) -> StatementResult<Self> {
        AggregateKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| StatementError::query(format!("Unknown aggregate kind '{}'", s)))
    }
}

/// Query options sent with a view lookup
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewOptions {
    pub reduce: bool,
    pub group: bool,
}

/// Fully resolved address of one materialized view
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewDescriptor {
    pub design_document: String,
    pub view_name: String,
    pub options: ViewOptions,
    /// View emits matching documents rather than a reduced value
    pub return_docs: bool,
}

impl ViewDescriptor {
    /// Derives the descriptor for `(entity, kind, attribute)`.
    ///
    /// Same inputs always produce the same names. Explicit names in the
    /// view configuration take precedence.
    pub fn derive(entity: &str, view: &ViewConfig) -> Self {
        let design_document = view
            .design_document
            .clone()
            .unwrap_or_else(|| format!("{}_views", entity));

        let view_name = view.name.clone().unwrap_or_else(|| match &view.attribute {
            Some(attribute) => format!("{}_{}_{}", entity, attribute, view.kind),
            None => format!("{}_{}", entity, view.kind),
        });

        let options = if view.kind.is_grouping() {
            ViewOptions {
                reduce: true,
                group: true,
            }
        } else {
            ViewOptions {
                reduce: !view.return_docs,
                group: false,
            }
        };

        Self {
            design_document,
            view_name,
            options,
            return_docs: view.return_docs,
        }
    }
}

// ============================================================
// Configuration
// ============================================================

/// One registered view
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewConfig {
    pub kind: AggregateKind,

    /// Attribute the view is keyed on; absent for whole-entity counts
    #[serde(default)]
    pub attribute: Option<String>,

    /// Overrides the derived design document name
    #[serde(default)]
    pub design_document: Option<String>,

    /// Overrides the derived view name
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub return_docs: bool,
}

impl ViewConfig {
    pub fn new(kind: AggregateKind, attribute: Option<&str>) -> Self {
        Self {
            kind,
            attribute: attribute.map(str::to_string),
            design_document: None,
            name: None,
            return_docs: false,
        }
    }

    pub fn named(mut self, design_document: impl Into<String>, name: impl Into<String>) -> Self {
        self.design_document = Some(design_document.into());
        self.name = Some(name.into());
        self
    }

    pub fn returning_docs(mut self) -> Self {
        self.return_docs = true;
        self
    }
}

/// One entity and its views
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityConfig {
    pub name: String,

    #[serde(default = "default_primary_key")]
    pub primary_key: String,

    #[serde(default)]
    pub views: Vec<ViewConfig>,
}

fn default_primary_key() -> String {
    DEFAULT_PRIMARY_KEY.to_string()
}

impl EntityConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            primary_key: default_primary_key(),
            views: Vec::new(),
        }
    }

    pub fn with_primary_key(mut self, primary_key: impl Into<String>) -> Self {
        self.primary_key = primary_key.into();
        self
    }

    pub fn with_view(mut self, view: ViewConfig) -> Self {
        self.views.push(view);
        self
    }
}

/// Registry configuration document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryConfig {
    #[serde(default)]
    pub entities: Vec<EntityConfig>,
}

impl RegistryConfig {
    pub fn with_entity(mut self, entity: EntityConfig) -> Self {
        self.entities.push(entity);
        self
    }
}

// ============================================================
// Registry
// ============================================================

type ViewKey = (AggregateKind, Option<String>);

/// Registered entity
#[derive(Debug, Clone)]
pub struct EntityModel {
    name: String,
    primary_key: String,
    views: BTreeMap<ViewKey, ViewDescriptor>,
}

impl EntityModel {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    /// Looks up the view answering `kind` over `attribute`
    pub fn view(&self, kind: AggregateKind, attribute: Option<&str>) -> Option<&ViewDescriptor> {
        self.views.get(&(kind, attribute.map(str::to_string)))
    }
}

/// Read-only lookup `(entity, kind, attribute) -> ViewDescriptor`
#[derive(Debug, Clone, Default)]
pub struct ViewRegistry {
    entities: HashMap<String, EntityModel>,
}

impl ViewRegistry {
    /// Builds the registry, rejecting duplicate entities or views
    pub fn from_config(config: &RegistryConfig) -> StatementResult<Self> {
        let mut registry = Self::default();
        for entity in &config.entities {
            registry.register(entity)?;
        }
        Ok(registry)
    }

    /// Parses a JSON registry document
    pub fn from_json(json: &str) -> StatementResult<Self> {
        let config: RegistryConfig = parse_object(json, "registry config")?;
        Self::from_config(&config)
    }

    fn register(&mut self, entity: &EntityConfig) -> StatementResult<()> {
        if entity.name.is_empty() {
            return Err(StatementError::config("Entity name must not be empty"));
        }
        if entity.primary_key.is_empty() {
            return Err(StatementError::config(format!(
                "Entity '{}' has an empty primary key",
                entity.name
            )));
        }
        if self.entities.contains_key(&entity.name) {
            return Err(StatementError::config(format!(
                "Entity '{}' registered twice",
                entity.name
            )));
        }

        let mut views = BTreeMap::new();
        for view in &entity.views {
            if !view.kind.is_view_backed() {
                return Err(StatementError::config(format!(
                    "Entity '{}': '{}' is computed from other views and cannot be registered",
                    entity.name, view.kind
                )));
            }
            if view.attribute.is_none() && view.kind != AggregateKind::Count {
                return Err(StatementError::config(format!(
                    "Entity '{}': '{}' view requires an attribute",
                    entity.name, view.kind
                )));
            }

            let key = (view.kind, view.attribute.clone());
            if views.contains_key(&key) {
                return Err(StatementError::config(format!(
                    "Entity '{}': duplicate '{}' view on {}",
                    entity.name,
                    view.kind,
                    view.attribute.as_deref().unwrap_or("<all>")
                )));
            }
            views.insert(key, ViewDescriptor::derive(&entity.name, view));
        }

        self.entities.insert(
            entity.name.clone(),
            EntityModel {
                name: entity.name.clone(),
                primary_key: entity.primary_key.clone(),
                views,
            },
        );
        Ok(())
    }

    /// Returns the registered entity
    pub fn entity(&self, name: &str) -> StatementResult<&EntityModel> {
        self.entities
            .get(name)
            .ok_or_else(|| StatementError::query(format!("Unknown entity '{}'", name)))
    }

    /// Resolves a view, failing when no metadata exists
    pub fn lookup(
        &self,
        entity: &str,
        kind: AggregateKind,
        attribute: Option<&str>,
    ) -> StatementResult<&ViewDescriptor> {
        self.entity(entity)?.view(kind, attribute).ok_or_else(|| {
            StatementError::query(format!(
                "No '{}' view registered for {}.{}",
                kind,
                entity,
                attribute.unwrap_or("*")
            ))
        })
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> ViewRegistry {
        let config = RegistryConfig::default().with_entity(
            EntityConfig::new("user")
                .with_view(ViewConfig::new(AggregateKind::Count, None))
                .with_view(ViewConfig::new(AggregateKind::Sum, Some("age")))
                .with_view(ViewConfig::new(AggregateKind::Distinct, Some("city")))
                .with_view(ViewConfig::new(AggregateKind::Min, Some("age")).returning_docs())
                .with_view(
                    ViewConfig::new(AggregateKind::Max, Some("age")).named("stats", "oldest"),
                ),
        );
        ViewRegistry::from_config(&config).unwrap()
    }

    #[test]
    fn test_derived_names() {
        let registry = registry();
        let sum = registry.lookup("user", AggregateKind::Sum, Some("age")).unwrap();
        assert_eq!(sum.design_document, "user_views");
        assert_eq!(sum.view_name, "user_age_sum");

        let count = registry.lookup("user", AggregateKind::Count, None).unwrap();
        assert_eq!(count.view_name, "user_count");
    }

    #[test]
    fn test_explicit_names_win() {
        let max = registry()
            .lookup("user", AggregateKind::Max, Some("age"))
            .unwrap()
            .clone();
        assert_eq!(max.design_document, "stats");
        assert_eq!(max.view_name, "oldest");
    }

    #[test]
    fn test_options() {
        let registry = registry();
        let distinct = registry
            .lookup("user", AggregateKind::Distinct, Some("city"))
            .unwrap();
        assert_eq!(distinct.options, ViewOptions { reduce: true, group: true });

        let sum = registry.lookup("user", AggregateKind::Sum, Some("age")).unwrap();
        assert_eq!(sum.options, ViewOptions { reduce: true, group: false });

        let min = registry.lookup("user", AggregateKind::Min, Some("age")).unwrap();
        assert!(min.return_docs);
        assert!(!min.options.reduce);
    }

    #[test]
    fn test_missing_view_is_query_error() {
        let err = registry()
            .lookup("user", AggregateKind::Sum, Some("height"))
            .unwrap_err();
        assert_eq!(err.code(), "LEDGER_QUERY_INVALID");

        let err = registry()
            .lookup("order", AggregateKind::Count, None)
            .unwrap_err();
        assert!(err.to_string().contains("Unknown entity"));
    }

    #[test]
    fn test_default_primary_key() {
        assert_eq!(registry().entity("user").unwrap().primary_key(), "id");

        let config = RegistryConfig::default()
            .with_entity(EntityConfig::new("asset").with_primary_key("assetId"));
        let registry = ViewRegistry::from_config(&config).unwrap();
        assert_eq!(registry.entity("asset").unwrap().primary_key(), "assetId");
    }

    #[test]
    fn test_from_json() {
        let registry = ViewRegistry::from_json(
            r#"{"entities": [{"name": "order", "primary_key": "orderId",
                 "views": [{"kind": "groupBy", "attribute": "status"}]}]}"#,
        )
        .unwrap();
        assert_eq!(registry.len(), 1);
        let order = registry.entity("order").unwrap();
        assert_eq!(order.primary_key(), "orderId");
        assert!(order.view(AggregateKind::GroupBy, Some("status")).is_some());
    }

    #[test]
    fn test_rejects_bad_config() {
        let dup = RegistryConfig::default()
            .with_entity(EntityConfig::new("a"))
            .with_entity(EntityConfig::new("a"));
        assert!(ViewRegistry::from_config(&dup).is_err());

        let avg = RegistryConfig::default().with_entity(
            EntityConfig::new("a").with_view(ViewConfig::new(AggregateKind::Avg, Some("x"))),
        );
        assert_eq!(
            ViewRegistry::from_config(&avg).unwrap_err().code(),
            "LEDGER_QUERY_CONFIG"
        );

        let unkeyed = RegistryConfig::default().with_entity(
            EntityConfig::new("a").with_view(ViewConfig::new(AggregateKind::Sum, None)),
        );
        assert!(ViewRegistry::from_config(&unkeyed).is_err());

        assert!(ViewRegistry::from_json("[]").is_err());
    }

    #[test]
    fn test_kind_names() {
        for kind in AggregateKind::ALL {
            assert_eq!(kind.as_str().parse::<AggregateKind>().unwrap(), kind);
        }
        assert_eq!(
            serde_json::to_value(AggregateKind::CountDistinct).unwrap(),
            serde_json::json!("countDistinct")
        );
    }
}
