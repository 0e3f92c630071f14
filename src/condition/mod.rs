//! Condition model
//!
//! A recursive boolean expression over document attributes, plus the sort
//! list that accompanies it. Conditions carry no translation logic; the
//! `translate` module lowers them.

mod ast;
mod order;

pub use ast::{AttributeRef, Condition, GroupOperator, Operator};
pub use order::{OrderBy, SortDirection};
