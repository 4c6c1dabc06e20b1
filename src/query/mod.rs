//! Query construction: predicate trees plus a builder that validates against the registry.

mod builder;
pub mod predicate;
pub use builder::{Query, QueryBuilder};
pub use predicate::*;
pub use crate::sql::Direction;
