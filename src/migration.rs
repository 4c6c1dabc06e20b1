//! Bind a validated schema to its table: verify against what the file already holds, then create
//! the table and record it in the catalog.

use crate::error::StoreError;
use crate::schema::validator::difference;
use crate::schema::Schema;
use crate::sql::create_table;
use crate::store::catalog::{self, TableColumn};
use sqlx::SqliteConnection;

/// Must run inside a transaction: on any error nothing is created and the catalog is untouched.
pub async fn bind_table(conn: &mut SqliteConnection, schema: &Schema) -> Result<(), StoreError> {
    catalog::ensure_catalog(conn).await?;
    match catalog::load(conn, &schema.table_name).await? {
        Some(committed) => {
            if let Some(reason) = difference(&committed, schema) {
                tracing::warn!(table = %schema.table_name, reason = %reason, "schema conflicts with catalog");
                return Err(StoreError::conflict(&schema.table_name, reason));
            }
        }
        None => {
            let existing = catalog::table_columns(conn, &schema.table_name).await?;
            if !existing.is_empty() {
                verify_layout(schema, &existing)?;
            }
        }
    }
    let ddl = create_table(schema);
    tracing::debug!(sql = %ddl, "query");
    sqlx::query(&ddl).execute(&mut *conn).await?;
    catalog::save(conn, schema).await
}

/// A table with no catalog row was created outside this library; adopt it only if its column
/// names and key line up exactly.
fn verify_layout(schema: &Schema, existing: &[TableColumn]) -> Result<(), StoreError> {
    let found: Vec<&str> = existing.iter().map(|c| c.name.as_str()).collect();
    let expected: Vec<&str> = schema.columns.iter().map(|c| c.name.as_str()).collect();
    if found != expected {
        let reason = format!("existing table has columns {:?}, expected {:?}", found, expected);
        tracing::warn!(table = %schema.table_name, reason = %reason, "schema conflicts with table");
        return Err(StoreError::conflict(&schema.table_name, reason));
    }
    let keys: Vec<&str> = existing.iter().filter(|c| c.primary_key).map(|c| c.name.as_str()).collect();
    if keys != [schema.primary_key()] {
        return Err(StoreError::conflict(
            &schema.table_name,
            format!("existing table keyed by {:?}", keys),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{DataType, Field, Registry, TypeDescriptor};

    fn schema() -> Schema {
        Registry::new()
            .prepare(&TypeDescriptor::new("app", "note").field(Field::new("body", DataType::String)))
            .unwrap()
    }

    fn column(name: &str, primary_key: bool) -> TableColumn {
        TableColumn {
            name: name.into(),
            primary_key,
        }
    }

    #[test]
    fn matching_layout_is_adopted() {
        assert!(verify_layout(&schema(), &[column("id", true), column("body", false)]).is_ok());
    }

    #[test]
    fn renamed_column_conflicts() {
        let err = verify_layout(&schema(), &[column("id", true), column("text", false)]).unwrap_err();
        assert!(matches!(err, StoreError::SchemaConflict { .. }));
    }

    #[test]
    fn wrong_primary_key_conflicts() {
        let err = verify_layout(&schema(), &[column("id", false), column("body", true)]).unwrap_err();
        assert!(matches!(err, StoreError::SchemaConflict { .. }));
    }
}
