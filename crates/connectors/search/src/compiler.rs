//! Query DSL generation.
//!
//! Values travel as typed JSON, so escaping is left to the serializer. Each
//! constrained column becomes one entry of `bool.filter`.

use crate::request::{SearchRequest, ID_FIELD, INDEX, SHARD};
use chrono::SecondsFormat;
use floe_common::{Column, Error, Result, TableName};
use floe_connector::compiler::{compile_pass_through, constrained_columns, range_comparisons, ColumnPredicate, Comparison};
use floe_connector::{CompiledQuery, Constraints, Param, PassThrough, PredicateCompiler, Range, Split, Value};
use serde_json::{json, Map, Value as Json};

/// Pass-through argument naming the index to search.
pub const INDEX_ARGUMENT: &str = "index";

pub const DEFAULT_PAGE_SIZE: usize = 1000;

/// Converts a value into the JSON the search backend compares against.
pub fn to_json(value: &Value) -> Json {
    match value {
        Value::Boolean(v) => json!(v),
        Value::Int8(v) => json!(v),
        Value::Int16(v) => json!(v),
        Value::Int32(v) => json!(v),
        Value::Int64(v) => json!(v),
        Value::Float32(v) => serde_json::Number::from_f64(f64::from(*v)).map_or(Json::Null, Json::Number),
        Value::Float64(v) => serde_json::Number::from_f64(*v).map_or(Json::Null, Json::Number),
        // decimals keep their digits as a string; numeric fields coerce it
        Value::Decimal(v) => json!(v.to_string()),
        Value::Utf8(v) => json!(v),
        Value::Date(_) => json!(value.to_string()),
        Value::Timestamp(_) => match value.as_datetime() {
            Some(ts) => json!(ts.to_rfc3339_opts(SecondsFormat::Millis, true)),
            None => json!(value.to_string()),
        },
        Value::Binary(_) => json!(value.to_string()),
        Value::List(items) => Json::Array(items.iter().map(to_json).collect()),
    }
}

fn missing(field: &str) -> Json {
    json!({"bool": {"must_not": [{"exists": {"field": field}}]}})
}

fn match_none() -> Json {
    json!({"bool": {"must_not": [{"match_all": {}}]}})
}

fn bind(column: &Column, value: &Value, params: &mut Vec<Param>) -> Json {
    let param = Param::for_column(column, value);
    let json = to_json(&param.value);
    params.push(param);
    json
}

fn range_clause(column: &Column, range: &Range, params: &mut Vec<Param>) -> Option<Json> {
    let mut bounds = Map::new();
    for (comparison, value) in range_comparisons(range) {
        let op = match comparison {
            Comparison::Gt => "gt",
            Comparison::Gte => "gte",
            Comparison::Lt => "lt",
            Comparison::Lte => "lte",
            Comparison::Eq => continue,
        };
        bounds.insert(op.to_string(), bind(column, value, params));
    }
    if bounds.is_empty() {
        return None;
    }
    Some(json!({"range": {column.name.clone(): bounds}}))
}

fn any_of(mut clauses: Vec<Json>) -> Json {
    match clauses.len() {
        1 => clauses.remove(0),
        _ => json!({"bool": {"should": clauses, "minimum_should_match": 1}}),
    }
}

fn column_clause(column: &Column, predicate: &ColumnPredicate<'_>, params: &mut Vec<Param>) -> Option<Json> {
    let field = column.name.as_str();
    let is_id = field == ID_FIELD;
    Some(match predicate {
        // every document has an id
        ColumnPredicate::IsNull if is_id => match_none(),
        ColumnPredicate::IsNotNull if is_id => return None,
        ColumnPredicate::IsNull => missing(field),
        ColumnPredicate::IsNotNull => json!({"exists": {"field": field}}),
        ColumnPredicate::AlwaysFalse => match_none(),
        ColumnPredicate::Disjunction { ranges, values, null_allowed } => {
            let mut clauses: Vec<Json> =
                ranges.iter().filter_map(|range| range_clause(column, range, params)).collect();
            match values.as_slice() {
                [] => {}
                _ if is_id => {
                    let ids: Vec<Json> = values.iter().map(|value| bind(column, value, params)).collect();
                    clauses.push(json!({"ids": {"values": ids}}));
                }
                [value] => clauses.push(json!({"term": {field: bind(column, value, params)}})),
                _ => {
                    let terms: Vec<Json> = values.iter().map(|value| bind(column, value, params)).collect();
                    clauses.push(json!({"terms": {field: terms}}));
                }
            }
            if *null_allowed && !is_id {
                clauses.push(missing(field));
            }
            if clauses.is_empty() {
                match_none()
            } else {
                any_of(clauses)
            }
        }
    })
}

pub struct SearchCompiler {
    page_size: usize,
}

impl SearchCompiler {
    pub fn new(page_size: usize) -> Self {
        Self { page_size: page_size.max(1) }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    fn compile_pass_through(&self, pass_through: &PassThrough) -> Result<CompiledQuery<SearchRequest>> {
        let required = [INDEX_ARGUMENT, PassThrough::QUERY];
        pass_through.verify(&required)?;
        let body: Json = serde_json::from_str(pass_through.query()?)
            .map_err(|e| Error::malformed(format!("pass-through query is not valid JSON: {e}")))?;
        let index = pass_through.require(INDEX_ARGUMENT)?.to_string();
        compile_pass_through(pass_through, &required, |_, _| SearchRequest::new(index, body))
    }
}

impl Default for SearchCompiler {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl PredicateCompiler for SearchCompiler {
    type Query = SearchRequest;

    fn compile(
        &self,
        table: &TableName,
        columns: &[Column],
        constraints: &Constraints,
        split: &Split,
    ) -> Result<CompiledQuery<SearchRequest>> {
        if let Some(pass_through) = &constraints.pass_through {
            return self.compile_pass_through(pass_through);
        }

        let index = split.property(INDEX).unwrap_or(&table.table).to_string();
        let shard = split.parse::<u32>(SHARD)?;

        let mut params = Vec::new();
        let mut filters = Vec::new();
        for (column, predicate) in constrained_columns(columns, constraints)? {
            filters.extend(column_clause(column, &predicate, &mut params));
        }

        let mut body = Map::new();
        body.insert("query".into(), json!({"bool": {"filter": filters}}));
        if !constraints.order_by.is_empty() {
            let sort: Vec<Json> = constraints
                .order_by
                .iter()
                .map(|field| {
                    let order = if field.order.is_ascending() { "asc" } else { "desc" };
                    let missing = if field.order.is_nulls_first() { "_first" } else { "_last" };
                    json!({field.column.clone(): {"order": order, "missing": missing}})
                })
                .collect();
            body.insert("sort".into(), Json::Array(sort));
        }
        // a limit that fits in one page becomes the page size
        let limit_pushed_down = constraints.limit.is_some_and(|limit| limit <= self.page_size as u64);
        let size = match constraints.limit {
            Some(limit) if limit_pushed_down => limit,
            _ => self.page_size as u64,
        };
        body.insert("size".into(), json!(size));
        let source: Vec<&str> =
            columns.iter().map(|c| c.name.as_str()).filter(|name| *name != ID_FIELD).collect();
        body.insert("_source".into(), if source.is_empty() { json!(false) } else { json!(source) });

        let request = SearchRequest::new(index, Json::Object(body)).with_shard(shard);
        tracing::debug!(%table, %request, "compiled search request");
        Ok(CompiledQuery::new(request, params, limit_pushed_down))
    }
}
