//! RDF terms: rendering values into SPARQL text and reading bound terms back.

use chrono::SecondsFormat;
use floe_common::{Column, DataType, Error, Result};
use floe_connector::coerce::{is_blank, parse_date, parse_text, parse_timestamp};
use floe_connector::Value;
use rust_decimal::Decimal;
use std::fmt::Write;
use std::str::FromStr;

pub const XSD: &str = "http://www.w3.org/2001/XMLSchema#";

fn xsd(local: &str) -> String {
    format!("<{XSD}{local}>")
}

/// A SPARQL string literal with `\ " \n \r \t` escaped.
pub fn string_literal(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Wraps `text` in `<>`, percent-encoding the characters an IRI reference
/// may not contain.
pub fn iri(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('<');
    for c in text.chars() {
        if c <= ' ' || matches!(c, '<' | '>' | '"' | '{' | '}' | '|' | '^' | '`' | '\\') {
            let mut buf = [0u8; 4];
            for byte in c.encode_utf8(&mut buf).bytes() {
                // writing to a String cannot fail
                let _ = write!(out, "%{byte:02X}");
            }
        } else {
            out.push(c);
        }
    }
    out.push('>');
    out
}

/// Renders a value as a SPARQL literal.
pub fn literal(value: &Value) -> String {
    match value {
        Value::Boolean(v) => v.to_string(),
        Value::Int8(v) => v.to_string(),
        Value::Int16(v) => v.to_string(),
        Value::Int32(v) => v.to_string(),
        Value::Int64(v) => v.to_string(),
        Value::Float32(v) if v.is_finite() => format!("{v:e}"),
        Value::Float64(v) if v.is_finite() => format!("{v:e}"),
        Value::Float32(v) => non_finite(f64::from(*v)),
        Value::Float64(v) => non_finite(*v),
        Value::Decimal(v) => {
            let text = v.to_string();
            if text.contains('.') {
                text
            } else {
                format!("{text}.0")
            }
        }
        Value::Utf8(s) => string_literal(s),
        Value::Date(_) => typed(&value.to_string(), "date"),
        Value::Timestamp(_) => match value.as_datetime() {
            Some(ts) => typed(&ts.to_rfc3339_opts(SecondsFormat::AutoSi, true), "dateTime"),
            None => typed(&value.to_string(), "dateTime"),
        },
        Value::Binary(bytes) => {
            let hex: String = bytes.iter().map(|b| format!("{b:02X}")).collect();
            typed(&hex, "hexBinary")
        }
        Value::List(_) => string_literal(&value.to_string()),
    }
}

fn typed(lexical: &str, datatype: &str) -> String {
    format!("{}^^{}", string_literal(lexical), xsd(datatype))
}

fn non_finite(v: f64) -> String {
    if v.is_nan() {
        typed("NaN", "double")
    } else if v > 0.0 {
        typed("INF", "double")
    } else {
        typed("-INF", "double")
    }
}

/// A term bound to a variable in one solution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RdfTerm {
    Iri(String),
    Literal { lexical: String, datatype: Option<String>, language: Option<String> },
    Blank(String),
}

impl RdfTerm {
    pub fn iri(value: impl Into<String>) -> Self {
        RdfTerm::Iri(value.into())
    }

    pub fn plain(lexical: impl Into<String>) -> Self {
        RdfTerm::Literal { lexical: lexical.into(), datatype: None, language: None }
    }

    /// A literal typed with an `xsd:` local name.
    pub fn typed(lexical: impl Into<String>, xsd_local: &str) -> Self {
        RdfTerm::Literal { lexical: lexical.into(), datatype: Some(format!("{XSD}{xsd_local}")), language: None }
    }

    /// Converts the term for `column`. Sized XSD types keep their width so
    /// the exact type check sees the native type; strings, IRIs and the
    /// unbounded `xsd:integer` are parsed into the column type.
    pub fn to_value(&self, column: &Column) -> Result<Option<Value>> {
        let (lexical, datatype) = match self {
            RdfTerm::Iri(iri) => return parse_text(column, iri),
            RdfTerm::Blank(id) => return parse_text(column, &format!("_:{id}")),
            RdfTerm::Literal { lexical, datatype, .. } => (lexical.as_str(), datatype.as_deref()),
        };
        let Some(local) = datatype.and_then(|dt| dt.strip_prefix(XSD)) else {
            return parse_text(column, lexical);
        };
        if column.data_type == DataType::Utf8 {
            return Ok(Some(Value::Utf8(lexical.to_string())));
        }
        if is_blank(lexical) {
            return Ok(None);
        }
        let trimmed = lexical.trim();
        let mismatch = || Error::type_mismatch(&column.name, &column.data_type, format!("xsd:{local} '{trimmed}'"));
        let value = match local {
            "boolean" => match trimmed {
                "true" | "1" => Value::Boolean(true),
                "false" | "0" => Value::Boolean(false),
                _ => return Err(mismatch()),
            },
            "byte" => Value::Int8(trimmed.parse().map_err(|_| mismatch())?),
            "short" => Value::Int16(trimmed.parse().map_err(|_| mismatch())?),
            "int" => Value::Int32(trimmed.parse().map_err(|_| mismatch())?),
            "long" => Value::Int64(trimmed.parse().map_err(|_| mismatch())?),
            "float" => Value::Float32(parse_float(trimmed).ok_or_else(mismatch)? as f32),
            "double" => Value::Float64(parse_float(trimmed).ok_or_else(mismatch)?),
            "decimal" => Value::Decimal(Decimal::from_str(trimmed).map_err(|_| mismatch())?),
            "date" => Value::from_date(parse_date(trimmed).ok_or_else(mismatch)?),
            "dateTime" => Value::from_datetime(parse_timestamp(trimmed).ok_or_else(mismatch)?),
            _ => return parse_text(column, lexical),
        };
        Ok(Some(value))
    }
}

fn parse_float(text: &str) -> Option<f64> {
    match text {
        "INF" => Some(f64::INFINITY),
        "-INF" => Some(f64::NEG_INFINITY),
        "NaN" => Some(f64::NAN),
        other => other.parse().ok(),
    }
}
