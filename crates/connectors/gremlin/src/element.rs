//! Graph elements as the server returns them, and their materialization.

use crate::keys::SpecialKey;
use crate::traversal::ElementKind;
use chrono::{DateTime, Utc};
use floe_common::{Column, DataType, Error, Result};
use floe_connector::coerce::{collapse_multi_valued, parse_text};
use floe_connector::{KeyIndex, RowMaterializer, Value};
use rust_decimal::Decimal;

/// A value inside a returned element map.
#[derive(Debug, Clone, PartialEq)]
pub enum GraphValue {
    Null,
    Bool(bool),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    BigDecimal(Decimal),
    String(String),
    Date(DateTime<Utc>),
    List(Vec<GraphValue>),
    /// Nested map, e.g. the endpoint vertices of an `elementMap()` edge.
    Map(Vec<(String, GraphValue)>),
}

impl GraphValue {
    fn lookup(&self, key: &str) -> Option<&GraphValue> {
        match self {
            GraphValue::Map(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }
}

impl From<&str> for GraphValue {
    fn from(value: &str) -> Self {
        GraphValue::String(value.to_string())
    }
}

/// One element map: `valueMap().with(WithOptions.tokens)` for vertices,
/// `elementMap()` for edges, or any map a raw traversal returned.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraphElement {
    entries: Vec<(String, GraphValue)>,
}

impl GraphElement {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: GraphValue) -> Self {
        self.entries.push((key.into(), value));
        self
    }

    pub fn get(&self, key: &str) -> Option<&GraphValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GraphElementMaterializer;

impl GraphElementMaterializer {
    fn convert(&self, column: &Column, value: &GraphValue) -> Result<Option<Value>> {
        let converted = match value {
            GraphValue::Null => None,
            GraphValue::Bool(v) => Some(Value::Boolean(*v)),
            GraphValue::Int(v) => Some(Value::Int32(*v)),
            GraphValue::Long(v) => Some(Value::Int64(*v)),
            GraphValue::Float(v) => Some(Value::Float32(*v)),
            GraphValue::Double(v) => Some(Value::Float64(*v)),
            GraphValue::BigDecimal(v) => Some(Value::Decimal(*v)),
            GraphValue::String(text) => return parse_text(column, text),
            GraphValue::Date(v) => match column.data_type {
                DataType::Date => Some(Value::from_date(v.date_naive())),
                _ => Some(Value::from_datetime(*v)),
            },
            GraphValue::List(items) => {
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
                    DataType::List(_) => Some(Value::List(values)),
                    _ => collapse_multi_valued(column, values),
                });
            }
            GraphValue::Map(_) => return Err(Error::type_mismatch(&column.name, &column.data_type, "map")),
        };
        Ok(converted)
    }

    /// Ids come back in the server's native id type; a utf8 column takes
    /// them in their textual form.
    fn convert_structural(&self, column: &Column, value: &GraphValue) -> Result<Option<Value>> {
        let value = match value {
            GraphValue::Map(_) => match value.lookup(SpecialKey::Id.record_key()).or_else(|| value.lookup("id")) {
                Some(id) => id,
                None => return Err(Error::type_mismatch(&column.name, &column.data_type, "map")),
            },
            other => other,
        };
        if column.data_type == DataType::Utf8 {
            let text = match value {
                GraphValue::Int(v) => Some(v.to_string()),
                GraphValue::Long(v) => Some(v.to_string()),
                _ => None,
            };
            if let Some(text) = text {
                return Ok(Some(Value::Utf8(text)));
            }
        }
        self.convert(column, value)
    }
}

impl RowMaterializer for GraphElementMaterializer {
    type Record = GraphElement;

    fn record_keys<'r>(&self, record: &'r GraphElement) -> Vec<&'r str> {
        record.keys().collect()
    }

    fn resolve_key<'r>(&self, index: &KeyIndex<'r>, column: &Column) -> Option<&'r str> {
        // the record shape tells vertices from edges, so endpoints are tried too
        let structural = SpecialKey::for_column(&column.name, ElementKind::Edge);
        match structural.and_then(|special| index.resolve(special.record_key())) {
            Some(key) => Some(key),
            None => index.resolve(&column.name),
        }
    }

    fn extract_key(&self, record: &GraphElement, key: &str, column: &Column) -> Result<Option<Value>> {
        let Some(value) = record.get(key) else {
            return Ok(None);
        };
        match SpecialKey::from_record_key(key) {
            Some(_) => self.convert_structural(column, value),
            None => self.convert(column, value),
        }
    }
}
