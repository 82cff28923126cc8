//! Exact coercion of native values into canonical column values.
//!
//! Nothing here widens or narrows numbers: a value either already has the
//! column's declared width or the row fails with a type mismatch. Blank text
//! is null for every non-string scalar column.

use crate::value::Value;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use floe_common::{Column, DataType, Error, Result};
use rust_decimal::Decimal;
use std::str::FromStr;

/// Delimiter used when several raw values are joined into one string slot.
pub const MULTI_VALUE_DELIMITER: &str = ";";

pub fn is_blank(text: &str) -> bool {
    text.trim().is_empty()
}

/// Accepts `value` for `column` only if its runtime type matches exactly.
pub fn check_exact(column: &Column, value: Value) -> Result<Value> {
    if let (Value::Decimal(decimal), DataType::Decimal { precision, scale }) = (&value, &column.data_type) {
        return fit_decimal(column, *decimal, *precision, *scale).map(Value::Decimal);
    }
    if value.matches_type(&column.data_type) {
        Ok(value)
    } else {
        Err(Error::type_mismatch(&column.name, &column.data_type, value.type_name()))
    }
}

/// A decimal fits when raising it to the column scale loses nothing and the
/// digit count stays within the column precision.
fn fit_decimal(column: &Column, mut decimal: Decimal, precision: u8, scale: i8) -> Result<Decimal> {
    let target_scale = scale.max(0) as u32;
    if decimal.scale() > target_scale {
        return Err(Error::type_mismatch(
            &column.name,
            &column.data_type,
            format!("decimal with scale {}", decimal.scale()),
        ));
    }
    decimal.rescale(target_scale);
    let digits = decimal.mantissa().unsigned_abs().to_string().len();
    if digits > precision as usize {
        return Err(Error::type_mismatch(
            &column.name,
            &column.data_type,
            format!("decimal with {digits} digits"),
        ));
    }
    Ok(decimal)
}

/// Parses a textual native representation into the column's type.
pub fn parse_text(column: &Column, text: &str) -> Result<Option<Value>> {
    if column.data_type == DataType::Utf8 {
        return Ok(Some(Value::Utf8(text.to_string())));
    }
    if is_blank(text) {
        return Ok(None);
    }
    let trimmed = text.trim();
    let mismatch = || Error::type_mismatch(&column.name, &column.data_type, format!("'{trimmed}'"));
    let value = match &column.data_type {
        DataType::Boolean => match trimmed.to_ascii_lowercase().as_str() {
            "true" | "1" => Value::Boolean(true),
            "false" | "0" => Value::Boolean(false),
            _ => return Err(mismatch()),
        },
        DataType::Int8 => Value::Int8(trimmed.parse().map_err(|_| mismatch())?),
        DataType::Int16 => Value::Int16(trimmed.parse().map_err(|_| mismatch())?),
        DataType::Int32 => Value::Int32(trimmed.parse().map_err(|_| mismatch())?),
        DataType::Int64 => Value::Int64(trimmed.parse().map_err(|_| mismatch())?),
        DataType::Float32 => Value::Float32(trimmed.parse().map_err(|_| mismatch())?),
        DataType::Float64 => Value::Float64(trimmed.parse().map_err(|_| mismatch())?),
        DataType::Decimal { .. } => {
            let decimal = Decimal::from_str(trimmed).map_err(|_| mismatch())?;
            return check_exact(column, Value::Decimal(decimal)).map(Some);
        }
        DataType::Date => Value::from_date(parse_date(trimmed).ok_or_else(mismatch)?),
        DataType::Timestamp => Value::from_datetime(parse_timestamp(trimmed).ok_or_else(mismatch)?),
        DataType::Binary => Value::Binary(text.as_bytes().to_vec()),
        DataType::List(inner) => {
            let element = Column::new(column.name.clone(), (**inner).clone());
            return Ok(parse_text(&element, text)?.map(|v| Value::List(vec![v])));
        }
        DataType::Utf8 => unreachable!("handled above"),
    };
    Ok(Some(value))
}

pub fn parse_date(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .or_else(|| parse_timestamp(text).map(|ts| ts.date_naive()))
}

/// Accepts RFC 3339 and zone-less ISO forms; zone-less values are UTC.
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(datetime) = DateTime::parse_from_rfc3339(text) {
        return Some(datetime.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .map(|naive| naive.and_utc())
}

/// Collapses the raw values of a multi-valued property into one slot.
///
/// Zero values are null and one value is kept as is. Several values are
/// joined with [`MULTI_VALUE_DELIMITER`] for utf8 columns and collected for
/// list columns; any other column keeps the first value.
pub fn collapse_multi_valued(column: &Column, mut values: Vec<Value>) -> Option<Value> {
    match values.len() {
        0 => None,
        1 => values.pop(),
        _ => match &column.data_type {
            DataType::Utf8 => Some(Value::Utf8(
                values.iter().map(ToString::to_string).collect::<Vec<_>>().join(MULTI_VALUE_DELIMITER),
            )),
            DataType::List(_) => Some(Value::List(values)),
            _ => {
                tracing::debug!(
                    column = %column.name,
                    dropped = values.len() - 1,
                    "multi-valued property on a scalar column, keeping the first value"
                );
                values.into_iter().next()
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn col(data_type: DataType) -> Column {
        Column::new("c", data_type)
    }

    #[test]
    fn test_check_exact_rejects_narrowing() {
        let err = check_exact(&col(DataType::Int32), Value::Int64(1)).unwrap_err();
        assert_eq!(err, Error::type_mismatch("c", "int32", "int64"));
        assert_eq!(check_exact(&col(DataType::Int64), Value::Int64(1)).unwrap(), Value::Int64(1));
    }

    #[test]
    fn test_check_exact_rescales_decimals_without_loss() {
        let column = col(DataType::Decimal { precision: 6, scale: 2 });
        let value = check_exact(&column, Value::Decimal(Decimal::new(15, 1))).unwrap();
        assert_eq!(value, Value::Decimal(Decimal::new(150, 2)));
        assert!(check_exact(&column, Value::Decimal(Decimal::new(1555, 3))).is_err());
        assert!(check_exact(&column, Value::Decimal(Decimal::new(12_345_678, 2))).is_err());
    }

    #[test]
    fn test_blank_is_null_except_for_strings() {
        assert_eq!(parse_text(&col(DataType::Int32), "  ").unwrap(), None);
        assert_eq!(parse_text(&col(DataType::Boolean), "").unwrap(), None);
        assert_eq!(parse_text(&col(DataType::Date), " ").unwrap(), None);
        assert_eq!(parse_text(&col(DataType::Utf8), "").unwrap(), Some(Value::Utf8(String::new())));
    }

    #[test]
    fn test_parse_text_is_exact() {
        assert_eq!(parse_text(&col(DataType::Int8), "12").unwrap(), Some(Value::Int8(12)));
        assert!(parse_text(&col(DataType::Int8), "300").is_err());
        assert!(parse_text(&col(DataType::Int32), "1.5").is_err());
        assert_eq!(parse_text(&col(DataType::Boolean), "TRUE").unwrap(), Some(Value::Boolean(true)));
    }

    #[test]
    fn test_parse_temporal_to_epoch() {
        assert_eq!(parse_text(&col(DataType::Date), "1970-01-11").unwrap(), Some(Value::Date(10)));
        assert_eq!(
            parse_text(&col(DataType::Timestamp), "1970-01-01T00:00:01Z").unwrap(),
            Some(Value::Timestamp(1000))
        );
        assert_eq!(
            parse_text(&col(DataType::Timestamp), "1970-01-01 00:00:02").unwrap(),
            Some(Value::Timestamp(2000))
        );
    }

    #[test]
    fn test_collapse_multi_valued() {
        let utf8 = col(DataType::Utf8);
        let values = vec![Value::from("a"), Value::from("b"), Value::from("c")];
        assert_eq!(collapse_multi_valued(&utf8, values), Some(Value::from("a;b;c")));
        assert_eq!(collapse_multi_valued(&utf8, Vec::new()), None);

        let int = col(DataType::Int32);
        assert_eq!(collapse_multi_valued(&int, vec![Value::Int32(1), Value::Int32(2)]), Some(Value::Int32(1)));

        let list = col(DataType::List(Box::new(DataType::Int32)));
        assert_eq!(
            collapse_multi_valued(&list, vec![Value::Int32(1), Value::Int32(2)]),
            Some(Value::List(vec![Value::Int32(1), Value::Int32(2)]))
        );
    }
}
