//! Convert serde_json values to column-typed statement values, and rows back to JSON.

use crate::error::StoreError;
use crate::ids::parse_id;
use crate::schema::{ColumnDef, DataType};
use sea_query::Value as SqlValue;
use serde_json::{Map, Number, Value};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

fn mismatch(column: &ColumnDef) -> StoreError {
    StoreError::TypeMismatch {
        column: column.name.clone(),
        expected: column.data_type.to_string(),
    }
}

/// Typed NULL for a column; NOT NULL is left for the engine to enforce.
pub fn null_of(data_type: DataType) -> SqlValue {
    match data_type {
        DataType::Int32 | DataType::Uint32 | DataType::Int64 => SqlValue::BigInt(None),
        DataType::Float | DataType::Double => SqlValue::Double(None),
        DataType::Bool => SqlValue::Bool(None),
        DataType::String | DataType::Timestamp | DataType::Uuid | DataType::Reference => {
            SqlValue::String(None)
        }
        DataType::Blob => SqlValue::Bytes(None),
    }
}

/// Value bound for `column`. Fails with `TypeMismatch` when `v` cannot be stored there.
pub fn bind_value(column: &ColumnDef, v: &Value) -> Result<SqlValue, StoreError> {
    if v.is_null() {
        return Ok(null_of(column.data_type));
    }
    Ok(match column.data_type {
        DataType::Int32 => {
            let n = v.as_i64().ok_or_else(|| mismatch(column))?;
            let n = i32::try_from(n).map_err(|_| mismatch(column))?;
            SqlValue::from(n as i64)
        }
        DataType::Uint32 => {
            let n = v.as_u64().ok_or_else(|| mismatch(column))?;
            let n = u32::try_from(n).map_err(|_| mismatch(column))?;
            SqlValue::from(n as i64)
        }
        DataType::Int64 => SqlValue::from(v.as_i64().ok_or_else(|| mismatch(column))?),
        DataType::Float | DataType::Double => SqlValue::from(v.as_f64().ok_or_else(|| mismatch(column))?),
        DataType::Bool => SqlValue::from(v.as_bool().ok_or_else(|| mismatch(column))?),
        DataType::String => SqlValue::from(v.as_str().ok_or_else(|| mismatch(column))?.to_string()),
        DataType::Timestamp => {
            let s = v.as_str().ok_or_else(|| mismatch(column))?;
            chrono::DateTime::parse_from_rfc3339(s).map_err(|_| mismatch(column))?;
            SqlValue::from(s.to_string())
        }
        DataType::Uuid | DataType::Reference => {
            let s = v.as_str().ok_or_else(|| mismatch(column))?;
            SqlValue::from(parse_id(s)?.to_string())
        }
        DataType::Blob => {
            let items = v.as_array().ok_or_else(|| mismatch(column))?;
            let bytes = items
                .iter()
                .map(|b| b.as_u64().and_then(|b| u8::try_from(b).ok()))
                .collect::<Option<Vec<u8>>>()
                .ok_or_else(|| mismatch(column))?;
            SqlValue::from(bytes)
        }
    })
}

/// Decode `columns` from `row`, positionally starting at `offset`.
pub fn row_to_json(row: &SqliteRow, columns: &[ColumnDef], offset: usize) -> Result<Map<String, Value>, StoreError> {
    let mut map = Map::with_capacity(columns.len());
    for (i, column) in columns.iter().enumerate() {
        let v = cell_to_value(row, offset + i, column.data_type)?;
        map.insert(column.name.clone(), v);
    }
    Ok(map)
}

fn cell_to_value(row: &SqliteRow, index: usize, data_type: DataType) -> Result<Value, StoreError> {
    Ok(match data_type {
        DataType::Int32 | DataType::Uint32 | DataType::Int64 => row
            .try_get::<Option<i64>, _>(index)?
            .map(|n| Value::Number(n.into()))
            .unwrap_or(Value::Null),
        DataType::Float | DataType::Double => row
            .try_get::<Option<f64>, _>(index)?
            .and_then(Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        DataType::Bool => row
            .try_get::<Option<bool>, _>(index)?
            .map(Value::Bool)
            .unwrap_or(Value::Null),
        DataType::String | DataType::Timestamp | DataType::Uuid | DataType::Reference => row
            .try_get::<Option<String>, _>(index)?
            .map(Value::String)
            .unwrap_or(Value::Null),
        DataType::Blob => row
            .try_get::<Option<Vec<u8>>, _>(index)?
            .map(|bytes| Value::Array(bytes.into_iter().map(|b| Value::Number(b.into())).collect()))
            .unwrap_or(Value::Null),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn column(data_type: DataType) -> ColumnDef {
        ColumnDef {
            name: "c".into(),
            data_type,
            nullable: true,
            primary_key: false,
            references: None,
        }
    }

    #[test]
    fn int32_range_is_checked() {
        assert!(bind_value(&column(DataType::Int32), &json!(30)).is_ok());
        assert!(matches!(
            bind_value(&column(DataType::Int32), &json!(i64::MAX)),
            Err(StoreError::TypeMismatch { .. })
        ));
        assert!(bind_value(&column(DataType::Uint32), &json!(-1)).is_err());
    }

    #[test]
    fn strings_do_not_bind_to_numbers() {
        assert!(bind_value(&column(DataType::Int64), &json!("30")).is_err());
        assert!(bind_value(&column(DataType::String), &json!(30)).is_err());
    }

    #[test]
    fn references_must_be_uuids() {
        assert!(matches!(
            bind_value(&column(DataType::Reference), &json!("abc")),
            Err(StoreError::MalformedId(_))
        ));
    }

    #[test]
    fn timestamps_must_be_rfc3339() {
        assert!(bind_value(&column(DataType::Timestamp), &json!("2024-05-01T10:00:00Z")).is_ok());
        assert!(bind_value(&column(DataType::Timestamp), &json!("yesterday")).is_err());
    }

    #[test]
    fn blobs_bind_from_byte_arrays() {
        assert_eq!(
            bind_value(&column(DataType::Blob), &json!([1, 2, 255])).unwrap(),
            SqlValue::from(vec![1u8, 2, 255])
        );
        assert!(bind_value(&column(DataType::Blob), &json!([256])).is_err());
    }

    #[test]
    fn null_is_typed_by_column() {
        assert_eq!(bind_value(&column(DataType::Bool), &Value::Null).unwrap(), SqlValue::Bool(None));
    }
}
