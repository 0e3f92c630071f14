//! Aggregate views
//!
//! Registry of materialized view metadata, the planner that maps aggregator
//! intents onto it, and the interpreter for the rows those views return.

mod interpret;
mod planner;
mod registry;

pub use interpret::{compute_average, interpret, rows_of, AggregateOutput};
pub use planner::{AggregatePlan, AggregatePlanner, AggregateSelector, PRIORITY};
pub use registry::{
    AggregateKind, EntityConfig, EntityModel, RegistryConfig, ViewConfig, ViewDescriptor,
    ViewOptions, ViewRegistry, DEFAULT_PRIMARY_KEY,
};
