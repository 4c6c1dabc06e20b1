//! Predicate expression tree. Columns are resolved and values typed only when a query is built.

use crate::schema::Record;
use serde_json::Value;

/// Column reference, optionally qualified by table name.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ColumnRef {
    pub table: Option<String>,
    pub name: String,
}

/// Unqualified column. Must be unique across the tables a query has in scope.
pub fn col(name: impl Into<String>) -> ColumnRef {
    ColumnRef {
        table: None,
        name: name.into(),
    }
}

/// Column of `T`'s table.
pub fn col_of<T: Record>(name: impl Into<String>) -> ColumnRef {
    ColumnRef::qualified(T::table_name(), name)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Predicate {
    Compare { column: ColumnRef, op: CompareOp, value: Value },
    Between { column: ColumnRef, low: Value, high: Value },
    In { column: ColumnRef, values: Vec<Value> },
    Like { column: ColumnRef, pattern: String },
    IsNull(ColumnRef),
    IsNotNull(ColumnRef),
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
}

impl ColumnRef {
    pub fn qualified(table: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            table: Some(table.into()),
            name: name.into(),
        }
    }

    fn compare(self, op: CompareOp, value: impl Into<Value>) -> Predicate {
        Predicate::Compare {
            column: self,
            op,
            value: value.into(),
        }
    }

    pub fn eq(self, value: impl Into<Value>) -> Predicate {
        self.compare(CompareOp::Eq, value)
    }

    pub fn ne(self, value: impl Into<Value>) -> Predicate {
        self.compare(CompareOp::Ne, value)
    }

    pub fn gt(self, value: impl Into<Value>) -> Predicate {
        self.compare(CompareOp::Gt, value)
    }

    pub fn gte(self, value: impl Into<Value>) -> Predicate {
        self.compare(CompareOp::Gte, value)
    }

    pub fn lt(self, value: impl Into<Value>) -> Predicate {
        self.compare(CompareOp::Lt, value)
    }

    pub fn lte(self, value: impl Into<Value>) -> Predicate {
        self.compare(CompareOp::Lte, value)
    }

    /// Inclusive range.
    pub fn between(self, low: impl Into<Value>, high: impl Into<Value>) -> Predicate {
        Predicate::Between {
            column: self,
            low: low.into(),
            high: high.into(),
        }
    }

    pub fn is_in<V: Into<Value>>(self, values: impl IntoIterator<Item = V>) -> Predicate {
        Predicate::In {
            column: self,
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// SQL LIKE (`%` and `_` wildcards).
    pub fn like(self, pattern: impl Into<String>) -> Predicate {
        Predicate::Like {
            column: self,
            pattern: pattern.into(),
        }
    }

    pub fn is_null(self) -> Predicate {
        Predicate::IsNull(self)
    }

    pub fn is_not_null(self) -> Predicate {
        Predicate::IsNotNull(self)
    }
}

impl Predicate {
    pub fn and(self, other: Predicate) -> Predicate {
        match self {
            Predicate::And(mut items) => {
                items.push(other);
                Predicate::And(items)
            }
            p => Predicate::And(vec![p, other]),
        }
    }

    pub fn or(self, other: Predicate) -> Predicate {
        match self {
            Predicate::Or(mut items) => {
                items.push(other);
                Predicate::Or(items)
            }
            p => Predicate::Or(vec![p, other]),
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Predicate {
        Predicate::Not(Box::new(self))
    }

    pub fn all(items: impl IntoIterator<Item = Predicate>) -> Predicate {
        Predicate::And(items.into_iter().collect())
    }

    pub fn any(items: impl IntoIterator<Item = Predicate>) -> Predicate {
        Predicate::Or(items.into_iter().collect())
    }
}
