//! Condition translation
//!
//! Lowers condition trees into either a selector document or a whitelisted
//! procedure call. Everything here is pure and synchronous.

mod operators;
mod ranges;
mod selector;
mod squash;

pub use operators::{is_token_key, translate, translate_group, SelectorToken};
pub use ranges::{lexicographic_successor, prefix_range, suffix_pattern, SENTINEL};
pub use selector::{Clause, SelectorBuilder, SelectorDocument};
pub use squash::{PreparedStatement, Procedure, SquashPolicy, Squasher};
