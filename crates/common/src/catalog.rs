use serde::{Deserialize, Serialize};
use std::fmt;

/// Column types understood by the canonical row format.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    Boolean,
    Int8,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    Decimal { precision: u8, scale: i8 },
    Utf8,
    Date,
    Timestamp,
    Binary,
    List(Box<DataType>),
}

impl DataType {
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            DataType::Int8
                | DataType::Int16
                | DataType::Int32
                | DataType::Int64
                | DataType::Float32
                | DataType::Float64
                | DataType::Decimal { .. }
        )
    }

    /// Whether values of this type can be compared in a pushed-down predicate.
    pub fn is_comparable(&self) -> bool {
        !matches!(self, DataType::List(_))
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Boolean => f.write_str("boolean"),
            DataType::Int8 => f.write_str("int8"),
            DataType::Int16 => f.write_str("int16"),
            DataType::Int32 => f.write_str("int32"),
            DataType::Int64 => f.write_str("int64"),
            DataType::Float32 => f.write_str("float32"),
            DataType::Float64 => f.write_str("float64"),
            DataType::Decimal { precision, scale } => write!(f, "decimal({precision},{scale})"),
            DataType::Utf8 => f.write_str("utf8"),
            DataType::Date => f.write_str("date"),
            DataType::Timestamp => f.write_str("timestamp"),
            DataType::Binary => f.write_str("binary"),
            DataType::List(inner) => write!(f, "list<{inner}>"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub data_type: DataType,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self { name: name.into(), data_type }
    }
}

/// How column names are matched against the keys of a backend record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CasePolicy {
    #[default]
    Insensitive,
    Sensitive,
}

impl CasePolicy {
    pub fn from_flag(case_insensitive: bool) -> Self {
        if case_insensitive {
            CasePolicy::Insensitive
        } else {
            CasePolicy::Sensitive
        }
    }

    pub fn normalize(&self, name: &str) -> String {
        match self {
            CasePolicy::Insensitive => name.to_lowercase(),
            CasePolicy::Sensitive => name.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TableName {
    pub schema: String,
    pub table: String,
}

impl TableName {
    pub fn new(schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self { schema: schema.into(), table: table.into() }
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_type_display() {
        assert_eq!(DataType::Decimal { precision: 10, scale: 2 }.to_string(), "decimal(10,2)");
        assert_eq!(DataType::List(Box::new(DataType::Utf8)).to_string(), "list<utf8>");
    }

    #[test]
    fn test_case_policy_normalize() {
        assert_eq!(CasePolicy::Insensitive.normalize("OrderID"), "orderid");
        assert_eq!(CasePolicy::Sensitive.normalize("OrderID"), "OrderID");
        assert_eq!(CasePolicy::default(), CasePolicy::Insensitive);
    }

    #[test]
    fn test_column_deserializes_from_json() {
        let column: Column =
            serde_json::from_str(r#"{"name":"price","data_type":{"decimal":{"precision":12,"scale":2}}}"#)
                .unwrap();
        assert_eq!(column, Column::new("price", DataType::Decimal { precision: 12, scale: 2 }));
    }
}
