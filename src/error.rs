//! Typed errors for registration, CRUD, query building and execution.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
    #[error("config load: {0}")]
    Load(String),
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("schema conflict on {table}: {reason}")]
    SchemaConflict { table: String, reason: String },
    #[error("unknown type: {0}")]
    UnknownType(String),
    #[error("no relation declared between {from} and {to}")]
    NoSuchRelation { from: String, to: String },
    #[error("duplicate key {id} in {table}")]
    DuplicateKey { table: String, id: uuid::Uuid },
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid column: {0}")]
    InvalidColumn(String),
    #[error("ambiguous column '{column}' (present in {tables:?})")]
    AmbiguousColumn { column: String, tables: Vec<String> },
    #[error("table joined more than once: {0}")]
    DuplicateJoin(String),
    #[error("transaction already open on this connection")]
    TransactionConflict,
    #[error("malformed id: {0}")]
    MalformedId(String),
    #[error("type mismatch on {column}: expected {expected}")]
    TypeMismatch { column: String, expected: String },
    #[error("serialization: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("statement: {0}")]
    Statement(#[from] sea_query::error::Error),
    #[error("database: {0}")]
    Engine(#[from] sqlx::Error),
}

impl StoreError {
    /// Only engine-level lock contention is worth retrying; everything else is structural.
    pub fn is_retryable(&self) -> bool {
        match self {
            StoreError::Engine(sqlx::Error::Database(e)) => e.code().map(|c| is_lock_code(&c)).unwrap_or(false),
            StoreError::Engine(sqlx::Error::PoolTimedOut) => true,
            _ => false,
        }
    }

    pub(crate) fn conflict(table: &str, reason: impl Into<String>) -> Self {
        StoreError::SchemaConflict {
            table: table.to_string(),
            reason: reason.into(),
        }
    }
}

/// SQLITE_BUSY (5) and SQLITE_LOCKED (6), including their extended codes.
fn is_lock_code(code: &str) -> bool {
    code.parse::<i32>().map(|c| matches!(c & 0xff, 5 | 6)).unwrap_or(false)
}

pub type Result<T, E = StoreError> = std::result::Result<T, E>;
