//! In-memory registry mapping record types to validated schemas.

use crate::error::StoreError;
use crate::schema::validator::{build_schema, difference};
use crate::schema::{Record, Relation, Schema, TypeDescriptor};
use std::any::{type_name, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

/// Registrations are additive; `reset` exists for test isolation only.
#[derive(Debug, Default)]
pub struct Registry {
    by_table: HashMap<String, Arc<Schema>>,
    by_type: HashMap<TypeId, Arc<Schema>>,
    /// Registration order, for listing.
    order: Vec<String>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate `descriptor` without registering it.
    pub fn prepare(&self, descriptor: &TypeDescriptor) -> Result<Schema, StoreError> {
        let schema = build_schema(descriptor, |target| {
            self.by_table.get(&target.table_name()).map(|s| s.as_ref())
        })?;
        if let Some(existing) = self.by_table.get(&schema.table_name) {
            if let Some(reason) = difference(existing, &schema) {
                return Err(StoreError::conflict(&schema.table_name, reason));
            }
        }
        Ok(schema)
    }

    /// Register a descriptor. Identical redefinitions return the schema already held.
    pub fn register(&mut self, descriptor: &TypeDescriptor) -> Result<Arc<Schema>, StoreError> {
        let schema = self.prepare(descriptor)?;
        Ok(self.insert(schema))
    }

    pub fn register_type<T: Record>(&mut self) -> Result<Arc<Schema>, StoreError> {
        let schema = self.register(&T::descriptor())?;
        self.by_type.insert(TypeId::of::<T>(), schema.clone());
        Ok(schema)
    }

    pub(crate) fn insert(&mut self, schema: Schema) -> Arc<Schema> {
        if let Some(existing) = self.by_table.get(&schema.table_name) {
            return existing.clone();
        }
        let schema = Arc::new(schema);
        self.order.push(schema.table_name.clone());
        self.by_table.insert(schema.table_name.clone(), schema.clone());
        schema
    }

    pub(crate) fn bind_type<T: Record>(&mut self, schema: Arc<Schema>) {
        self.by_type.insert(TypeId::of::<T>(), schema);
    }

    pub fn resolve<T: Record>(&self) -> Result<Arc<Schema>, StoreError> {
        self.by_type
            .get(&TypeId::of::<T>())
            .cloned()
            .ok_or_else(|| StoreError::UnknownType(type_name::<T>().to_string()))
    }

    pub fn resolve_table(&self, table: &str) -> Result<Arc<Schema>, StoreError> {
        self.by_table
            .get(table)
            .cloned()
            .ok_or_else(|| StoreError::UnknownType(table.to_string()))
    }

    pub fn is_registered<T: Record>(&self) -> bool {
        self.by_type.contains_key(&TypeId::of::<T>())
    }

    /// First foreign key of `from` (declaration order) that references `to`.
    pub fn relation(&self, from: &Schema, to: &Schema) -> Result<Relation, StoreError> {
        from.foreign_keys()
            .find(|(_, fk)| fk.table == to.table_name)
            .map(|(col, fk)| Relation {
                from_table: from.table_name.clone(),
                from_column: col.name.clone(),
                to_table: fk.table.clone(),
                to_column: fk.column.clone(),
            })
            .ok_or_else(|| StoreError::NoSuchRelation {
                from: from.table_name.clone(),
                to: to.table_name.clone(),
            })
    }

    /// The relation carried by `from.column`, which must reference `to`.
    pub fn relation_via(&self, from: &Schema, column: &str, to: &Schema) -> Result<Relation, StoreError> {
        from.foreign_keys()
            .find(|(col, fk)| col.name == column && fk.table == to.table_name)
            .map(|(col, fk)| Relation {
                from_table: from.table_name.clone(),
                from_column: col.name.clone(),
                to_table: fk.table.clone(),
                to_column: fk.column.clone(),
            })
            .ok_or_else(|| StoreError::NoSuchRelation {
                from: format!("{}.{}", from.table_name, column),
                to: to.table_name.clone(),
            })
    }

    pub fn schemas(&self) -> Vec<Arc<Schema>> {
        self.order
            .iter()
            .filter_map(|t| self.by_table.get(t).cloned())
            .collect()
    }

    pub fn reset(&mut self) {
        self.by_table.clear();
        self.by_type.clear();
        self.order.clear();
    }
}
