//! Descriptor validation: column uniqueness, key shape, and reference targets.

use crate::error::StoreError;
use crate::schema::{ColumnDef, DataType, ForeignKeyRef, Schema, TypeDescriptor, TypeName, PRIMARY_KEY};
use std::collections::HashSet;

/// Table prefix reserved for the store's own catalog.
pub const RESERVED_PREFIX: &str = "_sys_";

/// Build the schema for `descriptor`. `lookup` resolves reference targets against what is
/// already registered.
pub fn build_schema<'a>(
    descriptor: &TypeDescriptor,
    lookup: impl Fn(&TypeName) -> Option<&'a Schema>,
) -> Result<Schema, StoreError> {
    let type_name = &descriptor.type_name;
    let table_name = type_name.table_name();
    if type_name.namespace.is_empty() || type_name.name.is_empty() {
        return Err(StoreError::conflict(&table_name, "type needs a namespace and a name"));
    }
    if table_name.starts_with(RESERVED_PREFIX) {
        return Err(StoreError::conflict(&table_name, "table prefix is reserved"));
    }

    let mut columns = vec![ColumnDef {
        name: PRIMARY_KEY.to_string(),
        data_type: DataType::Uuid,
        nullable: false,
        primary_key: true,
        references: None,
    }];
    // SQLite compares column names case-insensitively.
    let mut seen: HashSet<String> = HashSet::from([PRIMARY_KEY.to_ascii_lowercase()]);

    for field in &descriptor.fields {
        if field.name.is_empty() {
            return Err(StoreError::conflict(&table_name, "empty field name"));
        }
        if !seen.insert(field.name.to_ascii_lowercase()) {
            return Err(StoreError::conflict(
                &table_name,
                format!("column '{}' declared more than once", field.name),
            ));
        }
        let references = match (field.data_type, &field.target) {
            (DataType::Reference, Some(target)) => {
                let target_schema = lookup(target).ok_or_else(|| StoreError::UnknownType(target.to_string()))?;
                Some(ForeignKeyRef {
                    table: target_schema.table_name.clone(),
                    column: target_schema.primary_key().to_string(),
                })
            }
            (DataType::Reference, None) => {
                return Err(StoreError::conflict(
                    &table_name,
                    format!("reference '{}' has no target type", field.name),
                ));
            }
            _ => None,
        };
        columns.push(ColumnDef {
            name: field.name.clone(),
            data_type: field.data_type,
            nullable: field.nullable,
            primary_key: false,
            references,
        });
    }

    Ok(Schema {
        type_name: type_name.clone(),
        table_name,
        columns,
    })
}

/// Describe the first structural difference between two schemas for the same table.
pub fn difference(existing: &Schema, candidate: &Schema) -> Option<String> {
    if existing.type_name != candidate.type_name {
        return Some(format!(
            "table belongs to {} not {}",
            existing.type_name, candidate.type_name
        ));
    }
    if existing.columns.len() != candidate.columns.len() {
        return Some(format!(
            "expected {} columns, found {}",
            existing.columns.len(),
            candidate.columns.len()
        ));
    }
    for (a, b) in existing.columns.iter().zip(&candidate.columns) {
        if a != b {
            return Some(format!("column '{}' differs from registered '{}'", b.name, a.name));
        }
    }
    None
}
