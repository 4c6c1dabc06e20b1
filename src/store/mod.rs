//! Entity store: the database handle, explicit transactions and lazy row streams.

pub mod catalog;
pub(crate) mod crud;
mod database;
mod rows;
mod transaction;

pub use catalog::CATALOG_TABLE;
pub use database::Database;
pub use rows::Rows;
pub use transaction::StoreTransaction;
