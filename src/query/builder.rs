//! Query builder: filters, joins, ordering and pagination, validated in `build()`.

use crate::error::StoreError;
use crate::query::{ColumnRef, CompareOp, Predicate};
use crate::schema::{ColumnDef, DataType, Record, Registry, Relation, Schema};
use crate::sql::{self, bind_value, qualified, Direction, SelectParts};
use sea_query::{
    Condition, Expr, QueryStatementWriter, SelectStatement, SimpleExpr, SqliteQueryBuilder, Value as SqlValue,
};
use serde_json::Value;
use std::marker::PhantomData;
use std::sync::Arc;

struct JoinRequest {
    target: Result<Arc<Schema>, StoreError>,
    via: Option<String>,
}

/// Collects query parts for record type `T`. Nothing is checked until `build()`.
pub struct QueryBuilder<'r, T: Record> {
    registry: &'r Registry,
    filters: Vec<Predicate>,
    joins: Vec<JoinRequest>,
    order: Vec<(ColumnRef, Direction)>,
    limit: Option<u64>,
    offset: Option<u64>,
    distinct: bool,
    _record: PhantomData<fn() -> T>,
}

/// A validated, immutable query. Execution consumes it.
pub struct Query<T: Record> {
    root: Arc<Schema>,
    tables: Vec<String>,
    statement: SelectStatement,
    /// Same filters and joins without order or pagination.
    counting: SelectStatement,
    _record: PhantomData<fn() -> T>,
}

impl<T: Record> Query<T> {
    /// Root table followed by joined tables, in join order.
    pub fn tables(&self) -> &[String] {
        &self.tables
    }

    /// SQL with values inlined. For logs and tests; execution always binds.
    pub fn to_sql(&self) -> String {
        self.statement.to_string(SqliteQueryBuilder)
    }

    pub(crate) fn into_parts(self) -> (Arc<Schema>, SelectStatement) {
        (self.root, self.statement)
    }

    pub(crate) fn into_count_parts(self) -> (Arc<Schema>, SelectStatement) {
        (self.root, self.counting)
    }
}

impl<'r, T: Record> QueryBuilder<'r, T> {
    pub fn new(registry: &'r Registry) -> Self {
        Self {
            registry,
            filters: Vec::new(),
            joins: Vec::new(),
            order: Vec::new(),
            limit: None,
            offset: None,
            distinct: false,
            _record: PhantomData,
        }
    }

    /// AND another predicate onto the filter.
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.filters.push(predicate);
        self
    }

    /// Earlier calls take precedence.
    pub fn order_by(mut self, column: ColumnRef, direction: Direction) -> Self {
        self.order.push((column, direction));
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Collapse duplicate root rows produced by to-many joins.
    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    /// Inner join `B` through the relation declared between it and a table already in scope.
    pub fn join<B: Record>(mut self) -> Self {
        self.joins.push(JoinRequest {
            target: self.registry.resolve::<B>(),
            via: None,
        });
        self
    }

    /// Inner join `B` through the named foreign-key column (on `B` or on a table in scope).
    pub fn join_on<B: Record>(mut self, fk_column: impl Into<String>) -> Self {
        self.joins.push(JoinRequest {
            target: self.registry.resolve::<B>(),
            via: Some(fk_column.into()),
        });
        self
    }

    pub fn build(self) -> Result<Query<T>, StoreError> {
        let root = self.registry.resolve::<T>()?;
        let mut scope: Vec<Arc<Schema>> = vec![root.clone()];
        let mut relations = Vec::with_capacity(self.joins.len());
        let mut targets = Vec::with_capacity(self.joins.len());

        for request in self.joins {
            let target = request.target?;
            if scope.iter().any(|s| s.table_name == target.table_name) {
                return Err(StoreError::DuplicateJoin(target.table_name.clone()));
            }
            let relation = resolve_join(self.registry, &scope, &target, request.via.as_deref())?;
            targets.push(target.table_name.clone());
            relations.push(relation);
            scope.push(target);
        }

        let resolver = Scope { tables: &scope };
        let condition = match self.filters.len() {
            0 => None,
            _ => {
                let mut all = Condition::all();
                for p in &self.filters {
                    all = all.add(resolver.lower(p)?);
                }
                Some(all)
            }
        };
        let mut order = Vec::with_capacity(self.order.len());
        for (column, dir) in &self.order {
            let (schema, def) = resolver.resolve(column)?;
            order.push(((schema.table_name.clone(), def.name.clone()), *dir));
        }

        let counting = sql::select(SelectParts {
            root: &root,
            joins: &relations,
            join_targets: &targets,
            condition: condition.clone(),
            order: &[],
            limit: None,
            offset: None,
            distinct: self.distinct,
        });
        let statement = sql::select(SelectParts {
            root: &root,
            joins: &relations,
            join_targets: &targets,
            condition,
            order: &order,
            limit: self.limit,
            offset: self.offset,
            distinct: self.distinct,
        });
        tracing::debug!(root = %root.table_name, joins = targets.len(), "query built");

        let mut tables = vec![root.table_name.clone()];
        tables.extend(targets);
        Ok(Query {
            root,
            tables,
            statement,
            counting,
            _record: PhantomData,
        })
    }
}

/// Find the relation linking `target` to something already in scope. Tables in scope holding a
/// key to `target` are tried before `target` holding a key to them.
fn resolve_join(
    registry: &Registry,
    scope: &[Arc<Schema>],
    target: &Schema,
    via: Option<&str>,
) -> Result<Relation, StoreError> {
    for current in scope {
        let outgoing = match via {
            Some(column) => registry.relation_via(current, column, target),
            None => registry.relation(current, target),
        };
        if let Ok(rel) = outgoing {
            return Ok(rel);
        }
        let incoming = match via {
            Some(column) => registry.relation_via(target, column, current),
            None => registry.relation(target, current),
        };
        if let Ok(rel) = incoming {
            return Ok(rel);
        }
    }
    let from = scope
        .iter()
        .map(|s| s.table_name.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    let from = match via {
        Some(column) => format!("{} via '{}'", from, column),
        None => from,
    };
    Err(StoreError::NoSuchRelation {
        from,
        to: target.table_name.clone(),
    })
}

struct Scope<'a> {
    tables: &'a [Arc<Schema>],
}

impl<'a> Scope<'a> {
    fn resolve(&self, column: &ColumnRef) -> Result<(&'a Schema, &'a ColumnDef), StoreError> {
        match &column.table {
            Some(table) => {
                let schema = self
                    .tables
                    .iter()
                    .find(|s| &s.table_name == table)
                    .ok_or_else(|| StoreError::InvalidColumn(format!("{}.{} (table not in query)", table, column.name)))?;
                let def = schema
                    .column(&column.name)
                    .ok_or_else(|| StoreError::InvalidColumn(format!("{}.{}", table, column.name)))?;
                Ok((schema.as_ref(), def))
            }
            None => {
                let hits: Vec<(&'a Schema, &'a ColumnDef)> = self
                    .tables
                    .iter()
                    .filter_map(|s| s.column(&column.name).map(|c| (s.as_ref(), c)))
                    .collect();
                match hits.as_slice() {
                    [] => Err(StoreError::InvalidColumn(column.name.clone())),
                    [hit] => Ok(*hit),
                    _ => Err(StoreError::AmbiguousColumn {
                        column: column.name.clone(),
                        tables: hits.iter().map(|(s, _)| s.table_name.clone()).collect(),
                    }),
                }
            }
        }
    }

    fn column_expr(&self, column: &ColumnRef) -> Result<(Expr, &'a ColumnDef), StoreError> {
        let (schema, def) = self.resolve(column)?;
        Ok((Expr::col(qualified(&schema.table_name, &def.name)), def))
    }

    fn lower(&self, predicate: &Predicate) -> Result<Condition, StoreError> {
        Ok(match predicate {
            Predicate::Compare { column, op, value } => {
                let (expr, def) = self.column_expr(column)?;
                Condition::all().add(compare(expr, def, *op, value)?)
            }
            Predicate::Between { column, low, high } => {
                let (expr, def) = self.column_expr(column)?;
                Condition::all().add(expr.between(bind_present(def, low)?, bind_present(def, high)?))
            }
            Predicate::In { column, values } => {
                let (expr, def) = self.column_expr(column)?;
                let bound = values
                    .iter()
                    .map(|v| bind_present(def, v))
                    .collect::<Result<Vec<SqlValue>, _>>()?;
                Condition::all().add(expr.is_in(bound))
            }
            Predicate::Like { column, pattern } => {
                let (expr, def) = self.column_expr(column)?;
                if !is_textual(def.data_type) {
                    return Err(StoreError::TypeMismatch {
                        column: def.name.clone(),
                        expected: "textual column for LIKE".into(),
                    });
                }
                Condition::all().add(expr.like(pattern.as_str()))
            }
            Predicate::IsNull(column) => Condition::all().add(self.column_expr(column)?.0.is_null()),
            Predicate::IsNotNull(column) => Condition::all().add(self.column_expr(column)?.0.is_not_null()),
            Predicate::And(items) => {
                let mut cond = Condition::all();
                for p in items {
                    cond = cond.add(self.lower(p)?);
                }
                cond
            }
            Predicate::Or(items) => {
                let mut cond = Condition::any();
                for p in items {
                    cond = cond.add(self.lower(p)?);
                }
                cond
            }
            Predicate::Not(p) => self.lower(p)?.not(),
        })
    }
}

fn is_textual(data_type: DataType) -> bool {
    matches!(
        data_type,
        DataType::String | DataType::Timestamp | DataType::Uuid | DataType::Reference
    )
}

/// `bind_value`, with NULL rejected as a `TypeMismatch`.
fn bind_present(def: &ColumnDef, value: &Value) -> Result<SqlValue, StoreError> {
    if value.is_null() {
        return Err(StoreError::TypeMismatch {
            column: def.name.clone(),
            expected: "non-null value".into(),
        });
    }
    bind_value(def, value)
}

fn compare(expr: Expr, def: &ColumnDef, op: CompareOp, value: &Value) -> Result<SimpleExpr, StoreError> {
    // `= NULL` never matches in SQL; treat it as IS NULL.
    if value.is_null() {
        return match op {
            CompareOp::Eq => Ok(expr.is_null()),
            CompareOp::Ne => Ok(expr.is_not_null()),
            _ => Err(StoreError::TypeMismatch {
                column: def.name.clone(),
                expected: "non-null value for range comparison".into(),
            }),
        };
    }
    let v = bind_value(def, value)?;
    Ok(match op {
        CompareOp::Eq => expr.eq(v),
        CompareOp::Ne => expr.ne(v),
        CompareOp::Gt => expr.gt(v),
        CompareOp::Gte => expr.gte(v),
        CompareOp::Lt => expr.lt(v),
        CompareOp::Lte => expr.lte(v),
    })
}
