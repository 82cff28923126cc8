//! SPARQL generation for class-mode tables.
//!
//! A class-mode table selects every instance of a class and joins one
//! `OPTIONAL` triple per requested column, so an absent predicate is an
//! unbound variable and IS NULL becomes `!BOUND(..)`. Values are inlined as
//! escaped literals; the subject column is compared as an IRI.

use crate::keys::{self, QueryMode};
use crate::term::{iri, literal, string_literal};
use floe_common::{Column, Error, Result, TableName};
use floe_connector::compiler::{compile_pass_through, constrained_columns, range_comparisons, ColumnPredicate};
use floe_connector::{CompiledQuery, Constraints, Param, PassThrough, PredicateCompiler, Range, Split, Value};
use std::fmt;

const PASS_THROUGH_ARGUMENTS: [&str; 2] = [keys::DATABASE, PassThrough::QUERY];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SparqlQuery {
    pub text: String,
    /// Dataset to run against. Only pass-through queries name one.
    pub database: Option<String>,
}

impl fmt::Display for SparqlQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Class-mode table layout, read from split properties.
struct ClassLayout<'a> {
    class: &'a str,
    prefix: &'a str,
    subject: &'a str,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SparqlCompiler;

impl SparqlCompiler {
    pub fn new() -> Self {
        Self
    }

    fn compile_class(
        &self,
        table: &TableName,
        layout: &ClassLayout<'_>,
        columns: &[Column],
        constraints: &Constraints,
    ) -> Result<CompiledQuery<SparqlQuery>> {
        for column in columns {
            check_variable(&column.name)?;
        }
        check_variable(layout.subject)?;
        let is_subject = |column: &Column| column.name.eq_ignore_ascii_case(layout.subject);
        // the subject column reads the pattern's subject variable whatever its case
        let variable = |column: &Column| {
            if is_subject(column) {
                format!("?{}", layout.subject)
            } else {
                format!("?{}", column.name)
            }
        };

        let projection: Vec<String> = if columns.is_empty() {
            vec![format!("?{}", layout.subject)]
        } else {
            columns
                .iter()
                .map(|c| match variable(c) {
                    bound if bound[1..] == c.name => bound,
                    bound => format!("({bound} AS ?{})", c.name),
                })
                .collect()
        };
        let mut query = format!("SELECT {} WHERE {{ ?{} a {} .", projection.join(" "), layout.subject, iri(layout.class));
        for column in columns.iter().filter(|c| !is_subject(c)) {
            let predicate = iri(&format!("{}{}", layout.prefix, column.name));
            query.push_str(&format!(" OPTIONAL {{ ?{} {predicate} ?{} }}", layout.subject, column.name));
        }

        let mut params = Vec::new();
        let mut filters = Vec::new();
        for (column, predicate) in constrained_columns(columns, constraints)? {
            let clause = if is_subject(column) {
                subject_clause(&variable(column), column, &predicate, &mut params)
            } else {
                column_clause(&variable(column), column, &predicate, &mut params)
            };
            filters.extend(clause);
        }
        if !filters.is_empty() {
            query.push_str(&format!(" FILTER({})", filters.join(" && ")));
        }
        query.push_str(" }");

        if !constraints.order_by.is_empty() {
            let mut keys = Vec::new();
            for field in &constraints.order_by {
                let column = columns.iter().find(|c| c.name == field.column).ok_or_else(|| {
                    Error::malformed(format!("order by references unknown column '{}'", field.column))
                })?;
                let key = variable(column);
                let direction = if field.order.is_ascending() { "ASC" } else { "DESC" };
                // unbound sorts before bound, so BOUND ascending puts nulls first
                let nulls = if field.order.is_nulls_first() { "ASC" } else { "DESC" };
                keys.push(format!("{nulls}(BOUND({key}))"));
                keys.push(format!("{direction}({key})"));
            }
            query.push_str(&format!(" ORDER BY {}", keys.join(" ")));
        }
        if let Some(limit) = constraints.limit {
            query.push_str(&format!(" LIMIT {limit}"));
        }

        tracing::debug!(%table, sparql = %query, literals = params.len(), "compiled sparql");
        Ok(CompiledQuery::new(SparqlQuery { text: query, database: None }, params, constraints.limit.is_some()))
    }
}

/// Column names double as variable names.
fn check_variable(name: &str) -> Result<()> {
    let valid = !name.is_empty() && name.chars().all(|c| c.is_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(Error::malformed(format!("column name '{name}' is not a valid SPARQL variable")))
    }
}

fn bind(column: &Column, value: &Value, params: &mut Vec<Param>) -> String {
    let param = Param::for_column(column, value);
    let rendered = literal(&param.value);
    params.push(param);
    rendered
}

fn range_terms(variable: &str, range: &Range, render: &mut dyn FnMut(&Value) -> String) -> Option<String> {
    let parts: Vec<String> = range_comparisons(range)
        .into_iter()
        .map(|(comparison, value)| format!("{variable} {comparison} {}", render(value)))
        .collect();
    match parts.len() {
        0 => None,
        1 => parts.into_iter().next(),
        _ => Some(format!("({})", parts.join(" && "))),
    }
}

fn disjunction(terms: Vec<String>) -> String {
    match terms.len() {
        1 => terms.into_iter().next().unwrap_or_default(),
        _ => format!("({})", terms.join(" || ")),
    }
}

fn column_clause(
    variable: &str,
    column: &Column,
    predicate: &ColumnPredicate<'_>,
    params: &mut Vec<Param>,
) -> Option<String> {
    Some(match predicate {
        ColumnPredicate::IsNull => format!("!BOUND({variable})"),
        ColumnPredicate::IsNotNull => format!("BOUND({variable})"),
        ColumnPredicate::AlwaysFalse => "false".to_string(),
        ColumnPredicate::Disjunction { ranges, values, null_allowed } => {
            let mut render = |value: &Value| bind(column, value, params);
            let mut terms: Vec<String> =
                ranges.iter().filter_map(|range| range_terms(variable, range, &mut render)).collect();
            match values.as_slice() {
                [] => {}
                [value] => terms.push(format!("{variable} = {}", render(*value))),
                _ => {
                    let rendered: Vec<String> = values.iter().map(|value| render(*value)).collect();
                    terms.push(format!("{variable} IN ({})", rendered.join(", ")));
                }
            }
            if *null_allowed {
                terms.push(format!("!BOUND({variable})"));
            }
            disjunction(terms)
        }
    })
}

/// The subject is always bound. Point values compare as IRIs; ranges compare
/// its string form.
fn subject_clause(
    variable: &str,
    column: &Column,
    predicate: &ColumnPredicate<'_>,
    params: &mut Vec<Param>,
) -> Option<String> {
    match predicate {
        ColumnPredicate::IsNull | ColumnPredicate::AlwaysFalse => Some("false".to_string()),
        ColumnPredicate::IsNotNull => None,
        ColumnPredicate::Disjunction { ranges, values, .. } => {
            let mut terms = Vec::new();
            let mut as_text = |value: &Value| {
                params.push(Param::for_column(column, value));
                string_literal(&value.to_string())
            };
            let text = format!("STR({variable})");
            terms.extend(ranges.iter().filter_map(|range| range_terms(&text, range, &mut as_text)));
            let iris: Vec<String> = values
                .iter()
                .map(|value| {
                    params.push(Param::for_column(column, value));
                    iri(&value.to_string())
                })
                .collect();
            match iris.len() {
                0 => {}
                1 => terms.push(format!("{variable} = {}", iris[0])),
                _ => terms.push(format!("{variable} IN ({})", iris.join(", "))),
            }
            if terms.is_empty() {
                return Some("false".to_string());
            }
            Some(disjunction(terms))
        }
    }
}

impl PredicateCompiler for SparqlCompiler {
    type Query = SparqlQuery;

    fn compile(
        &self,
        table: &TableName,
        columns: &[Column],
        constraints: &Constraints,
        split: &Split,
    ) -> Result<CompiledQuery<SparqlQuery>> {
        if let Some(pass_through) = &constraints.pass_through {
            pass_through.verify(&PASS_THROUGH_ARGUMENTS)?;
            let database = pass_through.require(keys::DATABASE)?.to_string();
            return compile_pass_through(pass_through, &PASS_THROUGH_ARGUMENTS, |_, query| SparqlQuery {
                text: query.to_string(),
                database: Some(database),
            });
        }

        match split.require(keys::QUERY_MODE)?.parse::<QueryMode>()? {
            QueryMode::Sparql => {
                let stored = split.require(keys::STORED_QUERY)?;
                tracing::debug!(%table, "using stored sparql query");
                Ok(CompiledQuery::new(SparqlQuery { text: stored.to_string(), database: None }, Vec::new(), false))
            }
            QueryMode::Class => {
                let layout = ClassLayout {
                    class: split.require(keys::CLASS)?,
                    prefix: split.property(keys::PREDICATE_PREFIX).unwrap_or_default(),
                    subject: split.property(keys::SUBJECT_COLUMN).unwrap_or(keys::DEFAULT_SUBJECT_COLUMN),
                };
                self.compile_class(table, &layout, columns, constraints)
            }
        }
    }
}
