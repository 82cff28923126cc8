//! SQL dialect differences: identifier quoting, partition addressing, null
//! ordering and row limits.

use floe_common::{Error, Result, TableName};
use floe_connector::SortOrder;

pub trait SqlDialect: Send + Sync {
    fn name(&self) -> &'static str;

    fn quote_char(&self) -> char;

    /// Quotes an identifier, doubling any embedded quote character.
    fn quote_identifier(&self, identifier: &str) -> String {
        let quote = self.quote_char();
        let doubled: String = [quote, quote].iter().collect();
        format!("{quote}{}{quote}", identifier.replace(quote, &doubled))
    }

    fn quote_table(&self, table: &TableName) -> String {
        if table.schema.is_empty() {
            self.quote_identifier(&table.table)
        } else {
            format!("{}.{}", self.quote_identifier(&table.schema), self.quote_identifier(&table.table))
        }
    }

    /// The FROM target for a scan, restricted to `partition` when one is given.
    fn from_clause(&self, table: &TableName, partition: Option<&str>) -> Result<String>;

    /// Sort keys for one order-by field, most significant first.
    fn order_by_terms(&self, quoted_column: &str, order: SortOrder) -> Vec<String> {
        let direction = if order.is_ascending() { "ASC" } else { "DESC" };
        let nulls = if order.is_nulls_first() { "NULLS FIRST" } else { "NULLS LAST" };
        vec![format!("{quoted_column} {direction} {nulls}")]
    }

    /// Trailing clause restricting the row count, if the dialect has one.
    fn limit_clause(&self, limit: u64) -> Option<String> {
        Some(format!("LIMIT {limit}"))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect;

impl SqlDialect for PostgresDialect {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn quote_char(&self) -> char {
        '"'
    }

    /// Partitions are child tables in the same schema.
    fn from_clause(&self, table: &TableName, partition: Option<&str>) -> Result<String> {
        Ok(match partition {
            Some(child) => self.quote_table(&TableName::new(table.schema.clone(), child)),
            None => self.quote_table(table),
        })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlDialect;

impl SqlDialect for MySqlDialect {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn quote_char(&self) -> char {
        '`'
    }

    fn from_clause(&self, table: &TableName, partition: Option<&str>) -> Result<String> {
        let quoted = self.quote_table(table);
        Ok(match partition {
            Some(partition) => format!("{quoted} PARTITION ({})", self.quote_identifier(partition)),
            None => quoted,
        })
    }

    // No NULLS FIRST/LAST: a boolean null key sorts ahead of the value.
    fn order_by_terms(&self, quoted_column: &str, order: SortOrder) -> Vec<String> {
        let null_key = if order.is_nulls_first() { "IS NOT NULL" } else { "IS NULL" };
        let direction = if order.is_ascending() { "ASC" } else { "DESC" };
        vec![format!("{quoted_column} {null_key}"), format!("{quoted_column} {direction}")]
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AnsiDialect;

impl SqlDialect for AnsiDialect {
    fn name(&self) -> &'static str {
        "ansi"
    }

    fn quote_char(&self) -> char {
        '"'
    }

    fn from_clause(&self, table: &TableName, partition: Option<&str>) -> Result<String> {
        match partition {
            Some(partition) => Err(Error::NotSupported(format!(
                "partition '{partition}' of {table}: the ansi dialect cannot address partitions"
            ))),
            None => Ok(self.quote_table(table)),
        }
    }

    fn limit_clause(&self, limit: u64) -> Option<String> {
        Some(format!("FETCH FIRST {limit} ROWS ONLY"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_doubles_embedded_quotes() {
        assert_eq!(PostgresDialect.quote_identifier("we\"ird"), "\"we\"\"ird\"");
        assert_eq!(MySqlDialect.quote_identifier("we`ird"), "`we``ird`");
    }

    #[test]
    fn test_partition_addressing() {
        let table = TableName::new("sales", "orders");
        assert_eq!(PostgresDialect.from_clause(&table, Some("orders_p0")).unwrap(), "\"sales\".\"orders_p0\"");
        assert_eq!(MySqlDialect.from_clause(&table, Some("p0")).unwrap(), "`sales`.`orders` PARTITION (`p0`)");
        assert_eq!(AnsiDialect.from_clause(&table, None).unwrap(), "\"sales\".\"orders\"");
        assert!(AnsiDialect.from_clause(&table, Some("p0")).is_err());
    }

    #[test]
    fn test_null_ordering() {
        assert_eq!(PostgresDialect.order_by_terms("\"a\"", SortOrder::DescNullsLast), vec!["\"a\" DESC NULLS LAST"]);
        assert_eq!(
            MySqlDialect.order_by_terms("`a`", SortOrder::AscNullsFirst),
            vec!["`a` IS NOT NULL", "`a` ASC"]
        );
        assert_eq!(MySqlDialect.order_by_terms("`a`", SortOrder::DescNullsLast), vec!["`a` IS NULL", "`a` DESC"]);
    }

    #[test]
    fn test_limit_clauses() {
        assert_eq!(PostgresDialect.limit_clause(10).as_deref(), Some("LIMIT 10"));
        assert_eq!(AnsiDialect.limit_clause(10).as_deref(), Some("FETCH FIRST 10 ROWS ONLY"));
    }
}
