//! Driver rows and their conversion to canonical values.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use floe_common::{Column, DataType, Result};
use floe_connector::coerce::{collapse_multi_valued, parse_text};
use floe_connector::{RowMaterializer, Value};
use rust_decimal::Decimal;

/// A value as a row-oriented SQL driver hands it out.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    TinyInt(i8),
    SmallInt(i16),
    Int(i32),
    BigInt(i64),
    Real(f32),
    Double(f64),
    Numeric(Decimal),
    Text(String),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
    TimestampTz(DateTime<Utc>),
    Bytes(Vec<u8>),
    Array(Vec<SqlValue>),
}

/// One result row with its column labels, in select-list order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SqlRow {
    labels: Vec<String>,
    values: Vec<SqlValue>,
}

impl SqlRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, label: impl Into<String>, value: SqlValue) -> Self {
        self.labels.push(label.into());
        self.values.push(value);
        self
    }

    pub fn get(&self, label: &str) -> Option<&SqlValue> {
        self.labels.iter().position(|l| l == label).map(|i| &self.values[i])
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(String::as_str)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SqlRowMaterializer;

impl SqlRowMaterializer {
    fn convert(&self, column: &Column, value: &SqlValue) -> Result<Option<Value>> {
        let converted = match value {
            SqlValue::Null => None,
            SqlValue::Bool(v) => Some(Value::Boolean(*v)),
            SqlValue::TinyInt(v) => Some(Value::Int8(*v)),
            SqlValue::SmallInt(v) => Some(Value::Int16(*v)),
            SqlValue::Int(v) => Some(Value::Int32(*v)),
            SqlValue::BigInt(v) => Some(Value::Int64(*v)),
            SqlValue::Real(v) => Some(Value::Float32(*v)),
            SqlValue::Double(v) => Some(Value::Float64(*v)),
            SqlValue::Numeric(v) => Some(Value::Decimal(*v)),
            SqlValue::Text(text) => return parse_text(column, text),
            SqlValue::Date(date) => Some(Value::from_date(*date)),
            SqlValue::Timestamp(ts) => Some(Value::from_naive_datetime(*ts)),
            SqlValue::TimestampTz(ts) => Some(Value::from_datetime(*ts)),
            SqlValue::Bytes(bytes) => Some(Value::Binary(bytes.clone())),
            SqlValue::Array(items) => {
                let element = match &column.data_type {
                    DataType::List(inner) => Column::new(column.name.clone(), (**inner).clone()),
                    _ => column.clone(),
                };
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    if let Some(value) = self.convert(&element, item)? {
                        values.push(value);
                    }
                }
                return Ok(match &column.data_type {
                    // an empty array is an empty list, not null
                    DataType::List(_) => Some(Value::List(values)),
                    _ => collapse_multi_valued(column, values),
                });
            }
        };
        Ok(converted)
    }
}

impl RowMaterializer for SqlRowMaterializer {
    type Record = SqlRow;

    fn record_keys<'r>(&self, record: &'r SqlRow) -> Vec<&'r str> {
        record.labels().collect()
    }

    fn extract_key(&self, record: &SqlRow, key: &str, column: &Column) -> Result<Option<Value>> {
        match record.get(key) {
            Some(value) => self.convert(column, value),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use floe_common::CasePolicy;

    #[test]
    fn test_materializes_by_label_case_insensitively() {
        let row = SqlRow::new().with("ID", SqlValue::BigInt(1)).with("Name", SqlValue::Text("ada".into()));
        let columns = vec![
            Column::new("id", DataType::Int64),
            Column::new("name", DataType::Utf8),
            Column::new("missing", DataType::Int32),
        ];
        let values = SqlRowMaterializer.materialize(&row, &columns, CasePolicy::Insensitive).unwrap();
        assert_eq!(values, vec![Some(Value::Int64(1)), Some(Value::from("ada")), None]);
    }

    #[test]
    fn test_temporal_values_become_epoch_based() {
        let date = NaiveDate::from_ymd_opt(1970, 1, 2).unwrap();
        let ts = date.and_hms_opt(0, 0, 1).unwrap();
        let row = SqlRow::new().with("d", SqlValue::Date(date)).with("t", SqlValue::Timestamp(ts));
        let columns = vec![Column::new("d", DataType::Date), Column::new("t", DataType::Timestamp)];
        let values = SqlRowMaterializer.materialize(&row, &columns, CasePolicy::Insensitive).unwrap();
        assert_eq!(values, vec![Some(Value::Date(1)), Some(Value::Timestamp(86_401_000))]);
    }

    #[test]
    fn test_blank_text_in_numeric_column_is_null() {
        let row = SqlRow::new().with("n", SqlValue::Text("  ".into())).with("s", SqlValue::Text(String::new()));
        let columns = vec![Column::new("n", DataType::Int32), Column::new("s", DataType::Utf8)];
        let values = SqlRowMaterializer.materialize(&row, &columns, CasePolicy::Insensitive).unwrap();
        assert_eq!(values, vec![None, Some(Value::from(""))]);
    }

    #[test]
    fn test_width_must_match() {
        let row = SqlRow::new().with("n", SqlValue::BigInt(1));
        let err = SqlRowMaterializer
            .materialize(&row, &[Column::new("n", DataType::Int32)], CasePolicy::Insensitive)
            .unwrap_err();
        assert_eq!(err.code(), floe_common::ErrorCode::TypeMismatch);
    }

    #[test]
    fn test_arrays() {
        let array = SqlValue::Array(vec![SqlValue::Text("a".into()), SqlValue::Text("b".into())]);
        let row = SqlRow::new().with("tags", array.clone()).with("tag_list", array);
        let columns = vec![
            Column::new("tags", DataType::Utf8),
            Column::new("tag_list", DataType::List(Box::new(DataType::Utf8))),
        ];
        let values = SqlRowMaterializer.materialize(&row, &columns, CasePolicy::Insensitive).unwrap();
        assert_eq!(
            values,
            vec![Some(Value::from("a;b")), Some(Value::List(vec![Value::from("a"), Value::from("b")]))]
        );
    }
}
