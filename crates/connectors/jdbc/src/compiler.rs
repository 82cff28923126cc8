//! Parameterized SQL generation.
//!
//! Values from the engine are always bound as `?` parameters. The only raw
//! values rendered into the text are split restrictions, which come from
//! discovery and are re-parsed as integers before rendering.

use crate::dialect::SqlDialect;
use crate::properties;
use floe_common::{Column, Error, Result, TableName};
use floe_connector::compiler::{compile_pass_through, constrained_columns, range_comparisons, ColumnPredicate};
use floe_connector::planner::PartitionDescriptor;
use floe_connector::{CompiledQuery, Constraints, Param, PassThrough, PredicateCompiler, Split};

const ALWAYS_FALSE: &str = "1 = 0";

pub struct SqlCompiler<D> {
    dialect: D,
}

impl<D: SqlDialect> SqlCompiler<D> {
    pub fn new(dialect: D) -> Self {
        Self { dialect }
    }

    pub fn dialect(&self) -> &D {
        &self.dialect
    }

    fn select_list(&self, columns: &[Column]) -> String {
        if columns.is_empty() {
            return "null".to_string();
        }
        columns.iter().map(|c| self.dialect.quote_identifier(&c.name)).collect::<Vec<_>>().join(", ")
    }

    /// The range bucket a split covers, rendered with raw integer bounds.
    fn range_restriction(&self, split: &Split) -> Result<Option<String>> {
        let Some(column) = split.property(properties::RANGE_COLUMN) else {
            return Ok(None);
        };
        let quoted = self.dialect.quote_identifier(column);
        let low = split.parse::<i64>(properties::RANGE_LOW)?;
        let high = split.parse::<i64>(properties::RANGE_HIGH)?;
        let with_nulls = split.parse::<bool>(properties::RANGE_INCLUDES_NULLS)?.unwrap_or(false);

        let mut bounds = Vec::new();
        if let Some(low) = low {
            bounds.push(format!("{quoted} >= {low}"));
        }
        if let Some(high) = high {
            bounds.push(format!("{quoted} < {high}"));
        }
        let clause = match (bounds.is_empty(), with_nulls) {
            (true, _) => return Ok(None),
            (false, false) => format!("({})", bounds.join(" AND ")),
            (false, true) => format!("(({}) OR {quoted} IS NULL)", bounds.join(" AND ")),
        };
        Ok(Some(clause))
    }

    fn column_clause(&self, column: &Column, predicate: &ColumnPredicate<'_>, params: &mut Vec<Param>) -> String {
        let quoted = self.dialect.quote_identifier(&column.name);
        match predicate {
            ColumnPredicate::IsNull => format!("({quoted} IS NULL)"),
            ColumnPredicate::IsNotNull => format!("({quoted} IS NOT NULL)"),
            ColumnPredicate::AlwaysFalse => format!("({ALWAYS_FALSE})"),
            ColumnPredicate::Disjunction { ranges, values, null_allowed } => {
                let mut terms = Vec::new();
                for range in ranges {
                    let comparisons = range_comparisons(range);
                    let parts: Vec<String> = comparisons
                        .iter()
                        .map(|(op, value)| {
                            params.push(Param::for_column(column, value));
                            format!("{quoted} {op} ?")
                        })
                        .collect();
                    match parts.len() {
                        0 => {}
                        1 => terms.extend(parts),
                        _ => terms.push(format!("({})", parts.join(" AND "))),
                    }
                }
                match values.len() {
                    0 => {}
                    1 => {
                        params.push(Param::for_column(column, values[0]));
                        terms.push(format!("{quoted} = ?"));
                    }
                    n => {
                        params.extend(values.iter().map(|value| Param::for_column(column, value)));
                        terms.push(format!("{quoted} IN ({})", vec!["?"; n].join(",")));
                    }
                }
                if *null_allowed {
                    terms.push(format!("{quoted} IS NULL"));
                }
                match terms.as_slice() {
                    [single] if single.starts_with('(') => single.clone(),
                    _ => format!("({})", terms.join(" OR ")),
                }
            }
        }
    }

    fn order_by(&self, constraints: &Constraints) -> Option<String> {
        if constraints.order_by.is_empty() {
            return None;
        }
        let terms: Vec<String> = constraints
            .order_by
            .iter()
            .flat_map(|field| self.dialect.order_by_terms(&self.dialect.quote_identifier(&field.column), field.order))
            .collect();
        Some(format!("ORDER BY {}", terms.join(", ")))
    }
}

impl<D: SqlDialect> PredicateCompiler for SqlCompiler<D> {
    type Query = String;

    fn compile(
        &self,
        table: &TableName,
        columns: &[Column],
        constraints: &Constraints,
        split: &Split,
    ) -> Result<CompiledQuery<String>> {
        if let Some(pass_through) = &constraints.pass_through {
            return compile_pass_through(pass_through, &[PassThrough::QUERY], |_, query| query.to_string());
        }

        if let Some(object) = split.property(properties::EXPORT_OBJECT) {
            return Err(Error::NotSupported(format!(
                "export object '{object}' of {table} is read by an export reader, not through SQL"
            )));
        }

        let partition =
            split.property(properties::PARTITION_NAME).filter(|name| *name != PartitionDescriptor::ALL_DATA);
        let mut sql = format!("SELECT {} FROM {}", self.select_list(columns), self.dialect.from_clause(table, partition)?);

        let mut params = Vec::new();
        let mut clauses = Vec::new();
        if let Some(restriction) = self.range_restriction(split)? {
            clauses.push(restriction);
        }
        for (column, predicate) in constrained_columns(columns, constraints)? {
            clauses.push(self.column_clause(column, &predicate, &mut params));
        }
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        if let Some(order_by) = self.order_by(constraints) {
            sql.push(' ');
            sql.push_str(&order_by);
        }
        let limit_clause = constraints.limit.and_then(|limit| self.dialect.limit_clause(limit));
        let limit_pushed_down = limit_clause.is_some();
        if let Some(limit_clause) = limit_clause {
            sql.push(' ');
            sql.push_str(&limit_clause);
        }

        tracing::debug!(dialect = self.dialect.name(), %table, %sql, params = params.len(), "compiled sql");
        Ok(CompiledQuery::new(sql, params, limit_pushed_down))
    }
}
