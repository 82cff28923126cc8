//! Search hits and their materialization.

use crate::request::ID_FIELD;
use floe_common::{Column, DataType, Error, Result};
use floe_connector::coerce::{collapse_multi_valued, parse_text};
use floe_connector::{RowMaterializer, Value};
use chrono::DateTime;
use rust_decimal::Decimal;
use serde_json::{Map, Value as Json};
use std::str::FromStr;

/// One document returned by a search or scroll page.
///
/// Nested objects are addressable both as a whole and by their dotted path,
/// so `address` and `address.city` both resolve.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub index: String,
    pub id: String,
    fields: Vec<(String, Json)>,
}

impl SearchHit {
    pub fn new(index: impl Into<String>, id: impl Into<String>, source: Json) -> Self {
        let id = id.into();
        let mut fields = vec![(ID_FIELD.to_string(), Json::String(id.clone()))];
        if let Json::Object(map) = source {
            flatten("", map, &mut fields);
        }
        Self { index: index.into(), id, fields }
    }

    pub fn get(&self, key: &str) -> Option<&Json> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }
}

fn flatten(prefix: &str, map: Map<String, Json>, out: &mut Vec<(String, Json)>) {
    for (key, value) in map {
        let path = if prefix.is_empty() { key } else { format!("{prefix}.{key}") };
        if let Json::Object(inner) = &value {
            flatten(&path, inner.clone(), out);
        }
        out.push((path, value));
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SearchHitMaterializer;

impl SearchHitMaterializer {
    fn convert(&self, column: &Column, value: &Json) -> Result<Option<Value>> {
        let mismatch = |found: &str| Error::type_mismatch(&column.name, &column.data_type, found);
        let converted = match value {
            Json::Null => None,
            Json::Bool(v) => match column.data_type {
                DataType::Utf8 => Some(Value::Utf8(v.to_string())),
                _ => Some(Value::Boolean(*v)),
            },
            Json::String(text) => return parse_text(column, text),
            Json::Number(number) => Some(convert_number(column, number).ok_or_else(|| mismatch(&format!("number {number}")))?),
            Json::Array(items) => {
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
            Json::Object(_) => match column.data_type {
                DataType::Utf8 => Some(Value::Utf8(value.to_string())),
                _ => return Err(mismatch("object")),
            },
        };
        Ok(converted)
    }
}

const MILLIS_PER_DAY: i64 = 86_400_000;

/// JSON numbers carry no width, so a number is accepted when it fits the
/// column type without loss. Temporal columns read integral numbers as
/// `epoch_millis`, the numeric date format of search indices.
fn convert_number(column: &Column, number: &serde_json::Number) -> Option<Value> {
    let value = match column.data_type {
        DataType::Int8 => Value::Int8(i8::try_from(number.as_i64()?).ok()?),
        DataType::Int16 => Value::Int16(i16::try_from(number.as_i64()?).ok()?),
        DataType::Int32 => Value::Int32(i32::try_from(number.as_i64()?).ok()?),
        DataType::Int64 => Value::Int64(number.as_i64()?),
        DataType::Float64 => Value::Float64(number.as_f64()?),
        DataType::Float32 => {
            let wide = number.as_f64()?;
            let narrow = wide as f32;
            if f64::from(narrow) != wide {
                return None;
            }
            Value::Float32(narrow)
        }
        DataType::Decimal { .. } => Value::Decimal(Decimal::from_str(&number.to_string()).ok()?),
        DataType::Utf8 => Value::Utf8(number.to_string()),
        DataType::Timestamp => {
            let millis = number.as_i64()?;
            DateTime::from_timestamp_millis(millis)?;
            Value::Timestamp(millis)
        }
        DataType::Date => {
            let days = i32::try_from(number.as_i64()?.div_euclid(MILLIS_PER_DAY)).ok()?;
            Value::Date(days)
        }
        _ => return None,
    };
    Some(value)
}

impl RowMaterializer for SearchHitMaterializer {
    type Record = SearchHit;

    fn record_keys<'r>(&self, record: &'r SearchHit) -> Vec<&'r str> {
        record.keys().collect()
    }

    fn extract_key(&self, record: &SearchHit, key: &str, column: &Column) -> Result<Option<Value>> {
        match record.get(key) {
            Some(value) => self.convert(column, value),
            None => Ok(None),
        }
    }
}
