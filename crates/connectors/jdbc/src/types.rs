use floe_common::DataType;

/// Maps a driver-reported type name to a column type.
///
/// Names are matched case-insensitively. Array types are reported either as
/// `name[]` or with a leading underscore (PostgreSQL's internal names).
/// Unknown names fall back to utf8.
pub fn map_native_type(native: &str) -> DataType {
    let name = native.trim().to_ascii_lowercase();
    if let Some(element) = name.strip_suffix("[]") {
        return DataType::List(Box::new(map_native_type(element)));
    }
    if let Some(element) = name.strip_prefix('_') {
        return DataType::List(Box::new(map_native_type(element)));
    }
    if let Some(decimal) = parse_decimal(&name) {
        return decimal;
    }
    let base = name.split('(').next().unwrap_or_default().trim();
    match base {
        "bool" | "boolean" | "bit" => DataType::Boolean,
        "tinyint" => DataType::Int8,
        "smallint" | "int2" => DataType::Int16,
        "int" | "integer" | "int4" | "mediumint" | "serial" => DataType::Int32,
        "bigint" | "int8" | "bigserial" => DataType::Int64,
        "real" | "float4" | "float" => DataType::Float32,
        "double" | "double precision" | "float8" => DataType::Float64,
        "char" | "character" | "varchar" | "character varying" | "text" | "bpchar" | "nvarchar" | "nchar"
        | "tinytext" | "mediumtext" | "longtext" | "uuid" | "json" | "jsonb" => DataType::Utf8,
        "date" => DataType::Date,
        "timestamp" | "timestamptz" | "datetime" | "timestamp without time zone"
        | "timestamp with time zone" => DataType::Timestamp,
        "bytea" | "blob" | "binary" | "varbinary" | "longblob" | "mediumblob" | "tinyblob" => DataType::Binary,
        other => {
            tracing::warn!(native_type = other, "unsupported native type, widening to utf8");
            DataType::Utf8
        }
    }
}

/// `numeric(p,s)` / `decimal(p,s)` / `numeric(p)`. Unqualified decimals use
/// the widest precision Arrow supports.
fn parse_decimal(name: &str) -> Option<DataType> {
    let rest = name.strip_prefix("numeric").or_else(|| name.strip_prefix("decimal"))?;
    let rest = rest.trim();
    if rest.is_empty() {
        return Some(DataType::Decimal { precision: 38, scale: 10 });
    }
    let inner = rest.strip_prefix('(')?.strip_suffix(')')?;
    let mut parts = inner.split(',').map(str::trim);
    let precision: u8 = parts.next()?.parse().ok()?;
    let scale: i8 = match parts.next() {
        Some(scale) => scale.parse().ok()?,
        None => 0,
    };
    Some(DataType::Decimal { precision, scale })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_names() {
        assert_eq!(map_native_type("INT4"), DataType::Int32);
        assert_eq!(map_native_type("bigint"), DataType::Int64);
        assert_eq!(map_native_type("varchar(255)"), DataType::Utf8);
        assert_eq!(map_native_type("timestamptz"), DataType::Timestamp);
        assert_eq!(map_native_type("bytea"), DataType::Binary);
    }

    #[test]
    fn test_decimals() {
        assert_eq!(map_native_type("numeric(10,2)"), DataType::Decimal { precision: 10, scale: 2 });
        assert_eq!(map_native_type("DECIMAL(5)"), DataType::Decimal { precision: 5, scale: 0 });
        assert_eq!(map_native_type("numeric"), DataType::Decimal { precision: 38, scale: 10 });
    }

    #[test]
    fn test_arrays() {
        assert_eq!(map_native_type("_int4"), DataType::List(Box::new(DataType::Int32)));
        assert_eq!(map_native_type("text[]"), DataType::List(Box::new(DataType::Utf8)));
    }

    #[test]
    fn test_unknown_widens_to_utf8() {
        assert_eq!(map_native_type("geometry"), DataType::Utf8);
    }
}
