//! Builds sea-query statement trees from resolved schemas. Identifiers come from the registry
//! only; every value is a bound parameter.

use crate::error::StoreError;
use crate::schema::{ColumnDef, Relation, Schema};
use crate::sql::params::{bind_value, null_of};
use sea_query::{
    Alias, ColumnDef as SqlColumnDef, Condition, DeleteStatement, Expr, ForeignKey, InsertStatement, JoinType,
    Order, Query, SchemaStatementBuilder, SelectStatement, SimpleExpr, SqliteQueryBuilder, Table, UpdateStatement,
};
use sea_query_binder::{SqlxBinder, SqlxValues};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Alias given to the inner select when counting.
const COUNT_ALIAS: &str = "matched";

/// SQLite rejects OFFSET without LIMIT; this stands in for "no limit".
const UNBOUNDED_LIMIT: u64 = i64::MAX as u64;

/// A rendered statement ready for `sqlx::query_with`.
pub struct QueryBuf {
    pub sql: String,
    pub values: SqlxValues,
}

impl QueryBuf {
    pub fn render<S: SqlxBinder>(stmt: &S) -> Self {
        let (sql, values) = stmt.build_sqlx(SqliteQueryBuilder);
        QueryBuf { sql, values }
    }
}

pub(crate) fn ident(s: &str) -> Alias {
    Alias::new(s)
}

pub(crate) fn qualified(table: &str, column: &str) -> (Alias, Alias) {
    (ident(table), ident(column))
}

fn id_param(id: &Uuid) -> SimpleExpr {
    SimpleExpr::from(id.to_string())
}

fn pk_matches(schema: &Schema, id: &Uuid) -> SimpleExpr {
    Expr::col(qualified(&schema.table_name, schema.primary_key())).eq(id_param(id))
}

/// SELECT list: every column of `schema`, table-qualified, in schema order.
fn select_columns(stmt: &mut SelectStatement, schema: &Schema) {
    for c in &schema.columns {
        stmt.column(qualified(&schema.table_name, &c.name));
    }
}

/// SELECT by primary key.
pub fn select_by_id(schema: &Schema, id: &Uuid) -> SelectStatement {
    let mut stmt = Query::select();
    select_columns(&mut stmt, schema);
    stmt.from(ident(&schema.table_name)).and_where(pk_matches(schema, id));
    stmt
}

/// SELECT pk ... LIMIT 1; used for existence checks.
pub fn select_exists(schema: &Schema, id: &Uuid) -> SelectStatement {
    Query::select()
        .column(qualified(&schema.table_name, schema.primary_key()))
        .from(ident(&schema.table_name))
        .and_where(pk_matches(schema, id))
        .limit(1)
        .to_owned()
}

fn column_value(column: &ColumnDef, row: &Map<String, Value>) -> Result<SimpleExpr, StoreError> {
    let v = match row.get(&column.name) {
        Some(v) => bind_value(column, v)?,
        None => null_of(column.data_type),
    };
    Ok(SimpleExpr::from(v))
}

/// INSERT of every column; absent keys bind NULL.
pub fn insert(schema: &Schema, row: &Map<String, Value>) -> Result<InsertStatement, StoreError> {
    let mut values = Vec::with_capacity(schema.columns.len());
    for c in &schema.columns {
        values.push(column_value(c, row)?);
    }
    let mut stmt = Query::insert();
    stmt.into_table(ident(&schema.table_name))
        .columns(schema.columns.iter().map(|c| ident(&c.name)))
        .values(values)?;
    Ok(stmt)
}

/// UPDATE by id: SET every non-key column.
pub fn update(schema: &Schema, id: &Uuid, row: &Map<String, Value>) -> Result<UpdateStatement, StoreError> {
    let mut sets = Vec::with_capacity(schema.columns.len());
    for c in schema.value_columns() {
        sets.push((ident(&c.name), column_value(c, row)?));
    }
    let mut stmt = Query::update();
    stmt.table(ident(&schema.table_name)).and_where(pk_matches(schema, id));
    if sets.is_empty() {
        // Nothing but the key: rewrite it to itself so the row count still reports a match.
        stmt.value(ident(schema.primary_key()), id_param(id));
    } else {
        stmt.values(sets);
    }
    Ok(stmt)
}

/// DELETE by id.
pub fn delete(schema: &Schema, id: &Uuid) -> DeleteStatement {
    Query::delete()
        .from_table(ident(&schema.table_name))
        .and_where(pk_matches(schema, id))
        .to_owned()
}

/// CREATE TABLE IF NOT EXISTS with one FOREIGN KEY per reference. No ON DELETE action: the
/// engine refuses deletes that would orphan dependents.
pub fn create_table(schema: &Schema) -> String {
    let mut stmt = Table::create();
    stmt.table(ident(&schema.table_name)).if_not_exists();
    for c in &schema.columns {
        let mut def = SqlColumnDef::new(ident(&c.name));
        def.custom(ident(c.data_type.sqlite_type()));
        if c.primary_key {
            def.not_null().primary_key();
        } else if !c.nullable {
            def.not_null();
        }
        stmt.col(&mut def);
    }
    for (c, fk) in schema.foreign_keys() {
        stmt.foreign_key(
            ForeignKey::create()
                .from(ident(&schema.table_name), ident(&c.name))
                .to(ident(&fk.table), ident(&fk.column)),
        );
    }
    stmt.build(SqliteQueryBuilder)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

/// Lowered pieces of a validated query.
pub struct SelectParts<'a> {
    pub root: &'a Schema,
    pub joins: &'a [Relation],
    /// For each join, the table being brought into scope.
    pub join_targets: &'a [String],
    pub condition: Option<Condition>,
    pub order: &'a [((String, String), Direction)],
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    pub distinct: bool,
}

/// SELECT root columns FROM root [INNER JOIN ...] [WHERE] [ORDER BY] [LIMIT/OFFSET].
pub fn select(parts: SelectParts<'_>) -> SelectStatement {
    let mut stmt = Query::select();
    if parts.distinct {
        stmt.distinct();
    }
    select_columns(&mut stmt, parts.root);
    stmt.from(ident(&parts.root.table_name));
    for (rel, target) in parts.joins.iter().zip(parts.join_targets) {
        stmt.join(
            JoinType::InnerJoin,
            ident(target),
            Expr::col(qualified(&rel.from_table, &rel.from_column)).equals(qualified(&rel.to_table, &rel.to_column)),
        );
    }
    if let Some(cond) = parts.condition {
        stmt.cond_where(cond);
    }
    for ((table, column), dir) in parts.order {
        let order = match dir {
            Direction::Asc => Order::Asc,
            Direction::Desc => Order::Desc,
        };
        stmt.order_by(qualified(table, column), order);
    }
    match (parts.limit, parts.offset) {
        (Some(limit), offset) => {
            stmt.limit(limit);
            if let Some(offset) = offset {
                stmt.offset(offset);
            }
        }
        (None, Some(offset)) => {
            stmt.limit(UNBOUNDED_LIMIT).offset(offset);
        }
        (None, None) => {}
    }
    stmt
}

/// SELECT COUNT over the rows `inner` yields.
pub fn count(inner: SelectStatement, root: &Schema) -> SelectStatement {
    Query::select()
        .expr(Expr::col(qualified(COUNT_ALIAS, root.primary_key())).count())
        .from_subquery(inner, ident(COUNT_ALIAS))
        .to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{DataType, ForeignKeyRef, TypeName};
    use sea_query::QueryStatementWriter;
    use serde_json::json;

    fn person() -> Schema {
        Schema {
            type_name: TypeName::new("test", "person"),
            table_name: "test_person".into(),
            columns: vec![
                ColumnDef {
                    name: "id".into(),
                    data_type: DataType::Uuid,
                    nullable: false,
                    primary_key: true,
                    references: None,
                },
                ColumnDef {
                    name: "name".into(),
                    data_type: DataType::String,
                    nullable: false,
                    primary_key: false,
                    references: None,
                },
                ColumnDef {
                    name: "team".into(),
                    data_type: DataType::Reference,
                    nullable: true,
                    primary_key: false,
                    references: Some(ForeignKeyRef {
                        table: "test_team".into(),
                        column: "id".into(),
                    }),
                },
            ],
        }
    }

    #[test]
    fn select_by_id_binds_key_as_parameter() {
        let id = Uuid::from_u128(7);
        let buf = QueryBuf::render(&select_by_id(&person(), &id));
        assert_eq!(
            buf.sql,
            r#"SELECT "test_person"."id", "test_person"."name", "test_person"."team" FROM "test_person" WHERE "test_person"."id" = ?"#
        );
        assert!(!buf.sql.contains(&id.to_string()));
    }

    #[test]
    fn insert_lists_every_column() {
        let row = json!({"id": Uuid::from_u128(1).to_string(), "name": "Ana"});
        let stmt = insert(&person(), row.as_object().unwrap()).unwrap();
        let sql = stmt.to_string(SqliteQueryBuilder);
        assert!(sql.starts_with(r#"INSERT INTO "test_person" ("id", "name", "team") VALUES"#));
        assert!(sql.contains("NULL"));
    }

    #[test]
    fn create_table_declares_foreign_key_without_cascade() {
        let ddl = create_table(&person());
        assert!(ddl.contains(r#"CREATE TABLE IF NOT EXISTS "test_person""#));
        assert!(ddl.contains("FOREIGN KEY"));
        assert!(ddl.contains(r#"REFERENCES "test_team" ("id")"#));
        assert!(!ddl.to_uppercase().contains("CASCADE"));
    }

    #[test]
    fn offset_without_limit_gets_unbounded_limit() {
        let schema = person();
        let stmt = select(SelectParts {
            root: &schema,
            joins: &[],
            join_targets: &[],
            condition: None,
            order: &[],
            limit: None,
            offset: Some(3),
            distinct: false,
        });
        let sql = stmt.to_string(SqliteQueryBuilder);
        assert!(sql.contains("LIMIT"));
        assert!(sql.contains("OFFSET 3"));
    }
}
