//! Entity Store: typed records persisted in embedded SQLite, with a query builder that checks
//! columns, values and joins against registered schemas before any statement runs.

pub mod config;
pub mod error;
pub mod ids;
pub mod migration;
pub mod query;
pub mod schema;
pub mod sql;
pub mod store;

pub use config::StoreConfig;
pub use error::{ConfigError, Result, StoreError};
pub use ids::{parse_id, IdGenerator, RandomIds, SequentialIds};
pub use query::{col, col_of, ColumnRef, Direction, Predicate, Query, QueryBuilder};
pub use schema::{DataType, Field, Record, Registry, Schema, TypeDescriptor};
pub use store::{Database, Rows, StoreTransaction};
