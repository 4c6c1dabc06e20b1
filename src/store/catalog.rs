//! `_sys_schemas`: one row per bound table holding its schema as a JSON payload, so a reopened
//! file can tell whether a registration matches what was committed before.

use crate::error::StoreError;
use crate::schema::Schema;
use crate::sql::{ident, QueryBuf};
use sea_query::{ColumnDef as SqlColumnDef, Expr, OnConflict, Query, SchemaStatementBuilder, SqliteQueryBuilder, Table};
use sqlx::SqliteConnection;

pub const CATALOG_TABLE: &str = "_sys_schemas";

/// A column as SQLite reports it for an existing table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TableColumn {
    pub name: String,
    pub primary_key: bool,
}

pub(crate) async fn ensure_catalog(conn: &mut SqliteConnection) -> Result<(), StoreError> {
    let ddl = Table::create()
        .table(ident(CATALOG_TABLE))
        .if_not_exists()
        .col(SqlColumnDef::new(ident("table_name")).text().not_null().primary_key())
        .col(SqlColumnDef::new(ident("payload")).text().not_null())
        .col(SqlColumnDef::new(ident("updated_at")).text().not_null())
        .build(SqliteQueryBuilder);
    tracing::debug!(sql = %ddl, "query");
    sqlx::query(&ddl).execute(&mut *conn).await?;
    Ok(())
}

/// Committed schema for `table`, if any.
pub(crate) async fn load(conn: &mut SqliteConnection, table: &str) -> Result<Option<Schema>, StoreError> {
    let stmt = Query::select()
        .column(ident("payload"))
        .from(ident(CATALOG_TABLE))
        .and_where(Expr::col(ident("table_name")).eq(table))
        .to_owned();
    let q = QueryBuf::render(&stmt);
    tracing::debug!(sql = %q.sql, "query");
    let row: Option<(String,)> = sqlx::query_as_with(&q.sql, q.values)
        .fetch_optional(&mut *conn)
        .await?;
    match row {
        Some((payload,)) => Ok(Some(serde_json::from_str(&payload)?)),
        None => Ok(None),
    }
}

/// Insert or replace the catalog row for `schema`.
pub(crate) async fn save(conn: &mut SqliteConnection, schema: &Schema) -> Result<(), StoreError> {
    let payload = serde_json::to_string(schema)?;
    let stmt = Query::insert()
        .into_table(ident(CATALOG_TABLE))
        .columns([ident("table_name"), ident("payload"), ident("updated_at")])
        .values([
            schema.table_name.clone().into(),
            payload.into(),
            chrono::Utc::now().to_rfc3339().into(),
        ])?
        .on_conflict(
            OnConflict::column(ident("table_name"))
                .update_columns([ident("payload"), ident("updated_at")])
                .to_owned(),
        )
        .to_owned();
    let q = QueryBuf::render(&stmt);
    tracing::debug!(sql = %q.sql, "query");
    sqlx::query_with(&q.sql, q.values).execute(&mut *conn).await?;
    Ok(())
}

/// Every committed schema, ordered by table name. Empty when the catalog does not exist yet.
pub(crate) async fn list(conn: &mut SqliteConnection) -> Result<Vec<Schema>, StoreError> {
    if table_columns(conn, CATALOG_TABLE).await?.is_empty() {
        return Ok(Vec::new());
    }
    let stmt = Query::select()
        .column(ident("payload"))
        .from(ident(CATALOG_TABLE))
        .order_by(ident("table_name"), sea_query::Order::Asc)
        .to_owned();
    let q = QueryBuf::render(&stmt);
    tracing::debug!(sql = %q.sql, "query");
    let rows: Vec<(String,)> = sqlx::query_as_with(&q.sql, q.values).fetch_all(&mut *conn).await?;
    rows.iter()
        .map(|(payload,)| serde_json::from_str(payload).map_err(StoreError::from))
        .collect()
}

/// Columns of an existing table in declaration order; empty when the table does not exist.
pub(crate) async fn table_columns(conn: &mut SqliteConnection, table: &str) -> Result<Vec<TableColumn>, StoreError> {
    let sql = "SELECT name, pk FROM pragma_table_info(?) ORDER BY cid";
    tracing::debug!(sql = %sql, table = %table, "query");
    let rows: Vec<(String, i64)> = sqlx::query_as(sql).bind(table).fetch_all(&mut *conn).await?;
    Ok(rows
        .into_iter()
        .map(|(name, pk)| TableColumn {
            name,
            primary_key: pk > 0,
        })
        .collect())
}
