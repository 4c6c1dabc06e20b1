//! Declared shape of a record type: data types, fields, and the `Record` binding trait.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    Int32,
    Uint32,
    Int64,
    Float,
    Double,
    Bool,
    String,
    Blob,
    /// RFC 3339 text.
    Timestamp,
    Uuid,
    /// Foreign key holding the referenced row's id.
    Reference,
}

impl DataType {
    /// SQLite storage class used for the column.
    pub fn sqlite_type(self) -> &'static str {
        match self {
            DataType::Int32 | DataType::Uint32 | DataType::Int64 | DataType::Bool => "INTEGER",
            DataType::Float | DataType::Double => "REAL",
            DataType::String | DataType::Timestamp | DataType::Uuid | DataType::Reference => "TEXT",
            DataType::Blob => "BLOB",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DataType::Int32 => "int32",
            DataType::Uint32 => "uint32",
            DataType::Int64 => "int64",
            DataType::Float => "float",
            DataType::Double => "double",
            DataType::Bool => "bool",
            DataType::String => "string",
            DataType::Blob => "blob",
            DataType::Timestamp => "timestamp",
            DataType::Uuid => "uuid",
            DataType::Reference => "reference",
        };
        f.write_str(s)
    }
}

/// Namespace-qualified type name; maps to table `<namespace>_<name>`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeName {
    pub namespace: String,
    pub name: String,
}

impl TypeName {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    pub fn table_name(&self) -> String {
        format!("{}_{}", self.namespace, self.name)
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.namespace, self.name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
    /// Target type, set only for `DataType::Reference`.
    pub target: Option<TypeName>,
}

impl Field {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable: false,
            target: None,
        }
    }

    /// Foreign-key field to `R`'s primary key. Nullable unless `required()` is called.
    pub fn reference<R: Record>(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: DataType::Reference,
            nullable: true,
            target: Some(R::type_name()),
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn required(mut self) -> Self {
        self.nullable = false;
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeDescriptor {
    pub type_name: TypeName,
    pub fields: Vec<Field>,
}

impl TypeDescriptor {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            type_name: TypeName::new(namespace, name),
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }
}

/// Binds an application struct to a table.
///
/// The struct serializes (via serde) to an object whose keys are `id` plus the declared field
/// names; `id` is an `Option<Uuid>` (or `Uuid`) so records can be built before insert.
pub trait Record: Serialize + DeserializeOwned + Send + Unpin + 'static {
    const NAMESPACE: &'static str;
    const NAME: &'static str;

    fn fields() -> Vec<Field>;

    fn type_name() -> TypeName {
        TypeName::new(Self::NAMESPACE, Self::NAME)
    }

    fn table_name() -> String {
        Self::type_name().table_name()
    }

    fn descriptor() -> TypeDescriptor {
        TypeDescriptor {
            type_name: Self::type_name(),
            fields: Self::fields(),
        }
    }
}
