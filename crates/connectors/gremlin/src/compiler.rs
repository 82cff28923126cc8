//! Constraint compilation into Gremlin traversals.
//!
//! Gremlin has no parameter binding over the text protocol, so every value is
//! rendered as an escaped [`Literal`]. The rendered values are still reported
//! as [`Param`]s, one per literal, so tooling sees what was inlined.

use crate::keys::{self, ComponentType, SpecialKey};
use crate::traversal::{ElementKind, Literal, OrderKey, OrderTerm, Predicate, Step, Traversal};
use floe_common::{Column, Result, TableName};
use floe_connector::compiler::{compile_pass_through, constrained_columns, range_comparisons, ColumnPredicate, Comparison};
use floe_connector::{CompiledQuery, Constraints, Param, PassThrough, PredicateCompiler, Range, Split, Value};
use std::fmt;

const PASS_THROUGH_ARGUMENTS: [&str; 3] = [keys::DATABASE, PassThrough::QUERY, keys::COMPONENT_TYPE];

/// A compiled traversal, or a raw script handed over by the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum GremlinQuery {
    Traversal(Traversal),
    Script { text: String, database: String, component: ComponentType },
}

impl GremlinQuery {
    pub fn component_type(&self) -> ComponentType {
        match self {
            GremlinQuery::Traversal(traversal) => traversal.kind.into(),
            GremlinQuery::Script { component, .. } => *component,
        }
    }
}

impl fmt::Display for GremlinQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GremlinQuery::Traversal(traversal) => write!(f, "{traversal}"),
            GremlinQuery::Script { text, .. } => f.write_str(text),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GremlinCompiler;

impl GremlinCompiler {
    pub fn new() -> Self {
        Self
    }

    fn compile_script(&self, pass_through: &PassThrough) -> Result<CompiledQuery<GremlinQuery>> {
        pass_through.verify(&PASS_THROUGH_ARGUMENTS)?;
        let component = pass_through.require(keys::COMPONENT_TYPE)?.parse::<ComponentType>()?;
        let database = pass_through.require(keys::DATABASE)?.to_string();
        compile_pass_through(pass_through, &PASS_THROUGH_ARGUMENTS, |_, query| GremlinQuery::Script {
            text: query.to_string(),
            database,
            component,
        })
    }

    fn property_filter(&self, column: &Column, predicate: &ColumnPredicate<'_>, params: &mut Vec<Param>) -> Step {
        let key = column.name.clone();
        match predicate {
            ColumnPredicate::IsNull => Step::HasNot(key),
            ColumnPredicate::IsNotNull => Step::Has(key),
            ColumnPredicate::AlwaysFalse => Step::Nothing,
            ColumnPredicate::Disjunction { ranges, values, null_allowed } => {
                let mut alternatives: Vec<Vec<Step>> = Vec::new();
                for range in ranges {
                    let step = match range_predicate(column, range, params) {
                        Some(predicate) => Step::HasValue(key.clone(), predicate),
                        None => Step::Has(key.clone()),
                    };
                    alternatives.push(vec![step]);
                }
                if let Some(predicate) = values_predicate(column, values, params) {
                    alternatives.push(vec![Step::HasValue(key.clone(), predicate)]);
                }
                if *null_allowed {
                    alternatives.push(vec![Step::HasNot(key)]);
                }
                match alternatives.len() {
                    1 => alternatives.remove(0).remove(0),
                    _ => Step::Or(alternatives),
                }
            }
        }
    }

    /// Structural keys are never absent, so IS NULL matches nothing and
    /// IS NOT NULL is dropped.
    fn special_filter(
        &self,
        special: SpecialKey,
        column: &Column,
        predicate: &ColumnPredicate<'_>,
        params: &mut Vec<Param>,
    ) -> Option<Step> {
        let predicate = match predicate {
            ColumnPredicate::IsNull | ColumnPredicate::AlwaysFalse => return Some(Step::Nothing),
            ColumnPredicate::IsNotNull => return None,
            ColumnPredicate::Disjunction { ranges, values, .. } => {
                let mut alternatives: Vec<Predicate> =
                    ranges.iter().filter_map(|range| range_predicate(column, range, params)).collect();
                alternatives.extend(values_predicate(column, values, params));
                match Predicate::any_of(alternatives) {
                    Some(predicate) => predicate,
                    None => return Some(Step::Nothing),
                }
            }
        };
        Some(match special {
            SpecialKey::Id => Step::HasId(predicate),
            SpecialKey::Label => Step::HasLabel(predicate),
            SpecialKey::In | SpecialKey::Out => {
                let direction = special.direction()?;
                Step::EndpointId(direction, predicate)
            }
        })
    }

    /// Nulls are ordered with a presence key ahead of the value key.
    fn order(&self, kind: ElementKind, constraints: &Constraints) -> Option<Step> {
        if constraints.order_by.is_empty() {
            return None;
        }
        let mut terms = Vec::new();
        for field in &constraints.order_by {
            let ascending = field.order.is_ascending();
            match SpecialKey::for_column(&field.column, kind) {
                Some(SpecialKey::Id) => terms.push(OrderTerm { key: OrderKey::Id, ascending }),
                Some(SpecialKey::Label) => terms.push(OrderTerm { key: OrderKey::Label, ascending }),
                Some(special) => {
                    if let Some(direction) = special.direction() {
                        terms.push(OrderTerm { key: OrderKey::Endpoint(direction), ascending });
                    }
                }
                None => {
                    terms.push(OrderTerm {
                        key: OrderKey::Presence(field.column.clone()),
                        ascending: field.order.is_nulls_first(),
                    });
                    terms.push(OrderTerm { key: OrderKey::Property(field.column.clone()), ascending });
                }
            }
        }
        Some(Step::Order(terms))
    }
}

fn literal(column: &Column, value: &Value, params: &mut Vec<Param>) -> Literal {
    let param = Param::for_column(column, value);
    let literal = Literal::render(&param.value);
    params.push(param);
    literal
}

fn range_predicate(column: &Column, range: &Range, params: &mut Vec<Param>) -> Option<Predicate> {
    let mut predicates = range_comparisons(range).into_iter().map(|(comparison, value)| {
        let literal = literal(column, value, params);
        match comparison {
            Comparison::Eq => Predicate::Eq(literal),
            Comparison::Gt => Predicate::Gt(literal),
            Comparison::Gte => Predicate::Gte(literal),
            Comparison::Lt => Predicate::Lt(literal),
            Comparison::Lte => Predicate::Lte(literal),
        }
    });
    let first = predicates.next()?;
    Some(predicates.fold(first, |left, right| Predicate::And(Box::new(left), Box::new(right))))
}

fn values_predicate(column: &Column, values: &[&Value], params: &mut Vec<Param>) -> Option<Predicate> {
    match values {
        [] => None,
        [value] => Some(Predicate::Eq(literal(column, value, params))),
        _ => Some(Predicate::Within(values.iter().map(|value| literal(column, value, params)).collect())),
    }
}

impl PredicateCompiler for GremlinCompiler {
    type Query = GremlinQuery;

    fn compile(
        &self,
        table: &TableName,
        columns: &[Column],
        constraints: &Constraints,
        split: &Split,
    ) -> Result<CompiledQuery<GremlinQuery>> {
        if let Some(pass_through) = &constraints.pass_through {
            return self.compile_script(pass_through);
        }

        let kind = split.require(keys::GRAPH_TYPE)?.parse::<ElementKind>()?;
        let label = split.property(keys::LABEL).unwrap_or(&table.table);

        let mut traversal = Traversal::new(kind);
        traversal.push(Step::HasLabel(Predicate::Eq(Literal::string(label))));

        let mut params = Vec::new();
        for (column, predicate) in constrained_columns(columns, constraints)? {
            let step = match SpecialKey::for_column(&column.name, kind) {
                Some(special) => self.special_filter(special, column, &predicate, &mut params),
                None => Some(self.property_filter(column, &predicate, &mut params)),
            };
            traversal.steps.extend(step);
        }
        traversal.steps.extend(self.order(kind, constraints));
        if let Some(limit) = constraints.limit {
            traversal.push(Step::Limit(limit));
        }
        traversal.push(match kind {
            ElementKind::Vertex => Step::ValueMapWithTokens,
            ElementKind::Edge => Step::ElementMap,
        });

        tracing::debug!(%table, %traversal, literals = params.len(), "compiled traversal");
        Ok(CompiledQuery::new(GremlinQuery::Traversal(traversal), params, constraints.limit.is_some()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use floe_common::{DataType, ErrorCode};
    use floe_connector::split::SpillLocation;
    use floe_connector::{OrderByField, SortOrder, ValueSet};

    fn split(kind: &str, label: &str) -> Split {
        Split::builder(SpillLocation::default()).add(keys::GRAPH_TYPE, kind).add(keys::LABEL, label).build()
    }

    fn compile(kind: &str, columns: &[Column], constraints: &Constraints) -> CompiledQuery<GremlinQuery> {
        GremlinCompiler.compile(&TableName::new("graph", "person"), columns, constraints, &split(kind, "person")).unwrap()
    }

    #[test]
    fn test_vertex_filters_and_projection() {
        let columns = vec![Column::new("age", DataType::Int32), Column::new("name", DataType::Utf8)];
        let constraints = Constraints::new()
            .with_constraint("age", ValueSet::of_ranges(vec![Range::greater_than(Value::Int32(18))]))
            .with_constraint("name", ValueSet::of_values([Value::from("ada"), Value::from("alan")]));
        let compiled = compile("vertex", &columns, &constraints);
        assert_eq!(
            compiled.query.to_string(),
            "g.V().hasLabel('person').has('age', gt(18)).has('name', within('ada', 'alan'))\
             .valueMap().with(WithOptions.tokens)"
        );
        assert_eq!(compiled.params.len(), 3);
        assert!(!compiled.limit_pushed_down);
    }

    #[test]
    fn test_null_shapes() {
        let columns = vec![Column::new("a", DataType::Utf8), Column::new("b", DataType::Utf8)];
        let constraints =
            Constraints::new().with_constraint("a", ValueSet::only_null()).with_constraint("b", ValueSet::not_null());
        let compiled = compile("vertex", &columns, &constraints);
        assert!(compiled.query.to_string().contains(".hasNot('a').has('b')."));
        assert!(compiled.params.is_empty());

        let either = ValueSet::of_values([Value::from("x")]).with_nulls();
        let compiled = compile("vertex", &columns, &Constraints::new().with_constraint("a", either));
        assert!(compiled.query.to_string().contains(".or(__.has('a', 'x'), __.hasNot('a'))."));
    }

    #[test]
    fn test_bounded_range_uses_and() {
        let columns = vec![Column::new("age", DataType::Int64)];
        let range = Range::between(Value::Int64(10), true, Value::Int64(20), false);
        let compiled = compile("vertex", &columns, &Constraints::new().with_constraint("age", ValueSet::of_ranges(vec![range])));
        assert!(compiled.query.to_string().contains(".has('age', gte(10L).and(lt(20L)))."));
        assert_eq!(compiled.params.iter().map(|p| p.value.clone()).collect::<Vec<_>>(), vec![Value::Int64(10), Value::Int64(20)]);
    }

    #[test]
    fn test_edge_special_keys() {
        let columns = vec![
            Column::new("id", DataType::Utf8),
            Column::new("out", DataType::Utf8),
            Column::new("label", DataType::Utf8),
        ];
        let constraints = Constraints::new()
            .with_constraint("id", ValueSet::of_values([Value::from("e1")]))
            .with_constraint("out", ValueSet::of_values([Value::from("v1"), Value::from("v2")]))
            .with_constraint("label", ValueSet::not_null());
        let compiled = compile("edge", &columns, &constraints);
        assert_eq!(
            compiled.query.to_string(),
            "g.E().hasLabel('person').hasId('e1').where(__.outV().hasId(within('v1', 'v2'))).elementMap()"
        );
    }

    #[test]
    fn test_special_key_is_null_matches_nothing() {
        let columns = vec![Column::new("id", DataType::Utf8)];
        let compiled = compile("vertex", &columns, &Constraints::new().with_constraint("id", ValueSet::only_null()));
        assert!(compiled.query.to_string().contains(".not(identity())."));
    }

    #[test]
    fn test_order_and_limit() {
        let columns = vec![Column::new("age", DataType::Int32)];
        let constraints = Constraints::new()
            .with_order_by(OrderByField::new("age", SortOrder::DescNullsLast))
            .with_order_by(OrderByField::new("id", SortOrder::AscNullsFirst))
            .with_limit(5);
        let compiled = compile("vertex", &columns, &constraints);
        assert!(compiled.query.to_string().ends_with(
            ".order().by(coalesce(values('age').constant(1), constant(0)), desc)\
             .by(coalesce(values('age'), constant('')), desc).by(T.id, asc)\
             .limit(5).valueMap().with(WithOptions.tokens)"
        ));
        assert!(compiled.limit_pushed_down);
    }

    #[test]
    fn test_hostile_strings_stay_quoted() {
        let columns = vec![Column::new("name", DataType::Utf8)];
        let constraints = Constraints::new().with_constraint("name", ValueSet::of_values([Value::from("x').drop()//")]));
        let compiled = compile("vertex", &columns, &constraints);
        assert!(compiled.query.to_string().contains(r"has('name', 'x\').drop()//')"));
    }

    #[test]
    fn test_unknown_graph_type_is_malformed() {
        let err = GremlinCompiler
            .compile(&TableName::new("g", "t"), &[], &Constraints::new(), &split("hyperedge", "t"))
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::MalformedRequest);
    }

    #[test]
    fn test_pass_through_requires_all_arguments() {
        let complete = PassThrough::default()
            .with_argument("database", "social")
            .with_argument("query", "g.V().limit(1)")
            .with_argument("component_type", "valuemap");
        let compiled = GremlinCompiler
            .compile(&TableName::new("g", "t"), &[], &Constraints::new().with_pass_through(complete), &Split::empty())
            .unwrap();
        assert!(compiled.pass_through);
        assert_eq!(compiled.query.to_string(), "g.V().limit(1)");
        assert_eq!(compiled.query.component_type(), ComponentType::ValueMap);

        let missing = PassThrough::default().with_argument("query", "g.V()");
        let err = GremlinCompiler
            .compile(&TableName::new("g", "t"), &[], &Constraints::new().with_pass_through(missing), &Split::empty())
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::MalformedRequest);
    }
}
