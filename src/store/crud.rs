//! CRUD execution against SQLite. Every function runs on the connection it is given; callers
//! own the transaction.

use crate::error::StoreError;
use crate::ids::{parse_id, IdGenerator};
use crate::schema::{Record, Schema, PRIMARY_KEY};
use crate::sql::{self, row_to_json, QueryBuf};
use crate::store::Rows;
use futures::StreamExt;
use sea_query::SelectStatement;
use serde_json::{Map, Value};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use std::sync::Arc;
use uuid::Uuid;

/// Serialize `record` into a column map. Unknown keys are rejected; returns the id if set.
pub(crate) fn record_to_row<T: Record>(
    schema: &Schema,
    record: &T,
) -> Result<(Option<Uuid>, Map<String, Value>), StoreError> {
    let row = match serde_json::to_value(record)? {
        Value::Object(map) => map,
        _ => {
            return Err(StoreError::TypeMismatch {
                column: schema.table_name.clone(),
                expected: "record serializing to an object".into(),
            })
        }
    };
    if let Some(key) = row.keys().find(|k| !schema.has_column(k)) {
        return Err(StoreError::InvalidColumn(format!("{}.{}", schema.table_name, key)));
    }
    let id = match row.get(PRIMARY_KEY) {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(parse_id(s)?),
        Some(other) => return Err(StoreError::MalformedId(other.to_string())),
    };
    Ok((id, row))
}

pub(crate) fn decode<T: Record>(row: &SqliteRow, schema: &Schema) -> Result<T, StoreError> {
    let map = row_to_json(row, &schema.columns, 0)?;
    Ok(serde_json::from_value(Value::Object(map))?)
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(e) if e.is_unique_violation())
}

async fn execute(conn: &mut SqliteConnection, q: QueryBuf) -> Result<u64, StoreError> {
    tracing::debug!(sql = %q.sql, "query");
    let done = sqlx::query_with(&q.sql, q.values).execute(&mut *conn).await?;
    Ok(done.rows_affected())
}

async fn fetch_optional(conn: &mut SqliteConnection, q: QueryBuf) -> Result<Option<SqliteRow>, StoreError> {
    tracing::debug!(sql = %q.sql, "query");
    Ok(sqlx::query_with(&q.sql, q.values).fetch_optional(&mut *conn).await?)
}

/// Insert one record, assigning an id from `ids` when it has none.
pub(crate) async fn insert<T: Record>(
    conn: &mut SqliteConnection,
    schema: &Schema,
    ids: &dyn IdGenerator,
    record: &T,
) -> Result<Uuid, StoreError> {
    let (id, mut row) = record_to_row(schema, record)?;
    let id = id.unwrap_or_else(|| ids.generate());
    row.insert(PRIMARY_KEY.to_string(), Value::String(id.to_string()));
    if exists(conn, schema, &id).await? {
        return Err(StoreError::DuplicateKey {
            table: schema.table_name.clone(),
            id,
        });
    }
    let q = QueryBuf::render(&sql::insert(schema, &row)?);
    match execute(conn, q).await {
        Ok(_) => Ok(id),
        Err(StoreError::Engine(e)) if is_unique_violation(&e) => Err(StoreError::DuplicateKey {
            table: schema.table_name.clone(),
            id,
        }),
        Err(e) => Err(e),
    }
}

pub(crate) async fn find<T: Record>(
    conn: &mut SqliteConnection,
    schema: &Schema,
    id: &Uuid,
) -> Result<Option<T>, StoreError> {
    let q = QueryBuf::render(&sql::select_by_id(schema, id));
    match fetch_optional(conn, q).await? {
        Some(row) => Ok(Some(decode(&row, schema)?)),
        None => Ok(None),
    }
}

pub(crate) async fn get<T: Record>(conn: &mut SqliteConnection, schema: &Schema, id: &Uuid) -> Result<T, StoreError> {
    find(conn, schema, id)
        .await?
        .ok_or_else(|| StoreError::NotFound(format!("{} {}", schema.table_name, id)))
}

/// Replace every mapped column of the row keyed by the record's id.
pub(crate) async fn update<T: Record>(conn: &mut SqliteConnection, schema: &Schema, record: &T) -> Result<(), StoreError> {
    let (id, row) = record_to_row(schema, record)?;
    let id = id.ok_or_else(|| StoreError::NotFound(format!("{} (record has no id)", schema.table_name)))?;
    let q = QueryBuf::render(&sql::update(schema, &id, &row)?);
    if execute(conn, q).await? == 0 {
        return Err(StoreError::NotFound(format!("{} {}", schema.table_name, id)));
    }
    Ok(())
}

pub(crate) async fn remove(conn: &mut SqliteConnection, schema: &Schema, id: &Uuid) -> Result<(), StoreError> {
    let q = QueryBuf::render(&sql::delete(schema, id));
    if execute(conn, q).await? == 0 {
        return Err(StoreError::NotFound(format!("{} {}", schema.table_name, id)));
    }
    Ok(())
}

pub(crate) async fn exists(conn: &mut SqliteConnection, schema: &Schema, id: &Uuid) -> Result<bool, StoreError> {
    let q = QueryBuf::render(&sql::select_exists(schema, id));
    Ok(fetch_optional(conn, q).await?.is_some())
}

pub(crate) async fn count(conn: &mut SqliteConnection, root: &Schema, stmt: SelectStatement) -> Result<u64, StoreError> {
    let q = QueryBuf::render(&sql::count(stmt, root));
    tracing::debug!(sql = %q.sql, "query");
    let row = sqlx::query_with(&q.sql, q.values).fetch_one(&mut *conn).await?;
    let n: i64 = row.try_get(0)?;
    Ok(n.max(0) as u64)
}

/// Lazy row stream. The rendered SQL is parked in `slot` so the stream can borrow it for as
/// long as it borrows the connection.
pub(crate) fn stream<'c, T: Record>(
    conn: &'c mut SqliteConnection,
    slot: &'c mut Option<String>,
    root: Arc<Schema>,
    stmt: SelectStatement,
) -> Rows<'c, T> {
    let QueryBuf { sql, values } = QueryBuf::render(&stmt);
    let sql: &'c String = slot.insert(sql);
    tracing::debug!(sql = %sql, "query");
    let rows = sqlx::query_with(sql.as_str(), values)
        .fetch(conn)
        .map(move |row| decode::<T>(&row?, &root));
    Rows::new(rows.boxed())
}
