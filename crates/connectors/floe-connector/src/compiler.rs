//! Predicate compilation seam.
//!
//! Every dialect implements [`PredicateCompiler`]. The shape analysis of a
//! [`ValueSet`] is dialect neutral and lives here as [`ColumnPredicate`], so
//! each dialect only decides how to render it.

use crate::constraints::{Constraints, PassThrough, Range, ValueSet};
use crate::split::Split;
use crate::value::Value;
use floe_common::{Column, DataType, Error, Result, TableName};
use serde::Serialize;
use std::fmt;

/// One bound parameter, in binding order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Param {
    pub column: String,
    pub data_type: DataType,
    pub value: Value,
}

impl Param {
    /// Binds `value` for `column`, widening to utf8 when the column type
    /// cannot be compared natively.
    pub fn for_column(column: &Column, value: &Value) -> Self {
        let (data_type, value) = widen_for_comparison(column, value);
        Self { column: column.name.clone(), data_type, value }
    }
}

/// Returns the type and value to use when comparing `value` against `column`.
///
/// Columns whose type has no comparison semantics in pushed-down predicates
/// are compared as strings. This never fails the compile.
pub fn widen_for_comparison(column: &Column, value: &Value) -> (DataType, Value) {
    if column.data_type.is_comparable() {
        (column.data_type.clone(), value.clone())
    } else {
        tracing::warn!(
            column = %column.name,
            data_type = %column.data_type,
            "unsupported predicate type, widening to utf8"
        );
        (DataType::Utf8, Value::Utf8(value.to_string()))
    }
}

/// A native query plus the parameters to bind to it.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery<Q = String> {
    pub query: Q,
    pub params: Vec<Param>,
    /// Whether the row limit was pushed into the native query. When it was
    /// not, the orchestrator enforces it after materialization.
    pub limit_pushed_down: bool,
    pub pass_through: bool,
}

impl<Q> CompiledQuery<Q> {
    pub fn new(query: Q, params: Vec<Param>, limit_pushed_down: bool) -> Self {
        Self { query, params, limit_pushed_down, pass_through: false }
    }

    pub fn pass_through(query: Q) -> Self {
        Self { query, params: Vec::new(), limit_pushed_down: false, pass_through: true }
    }
}

pub trait PredicateCompiler: Send + Sync {
    type Query: Send + Sync;

    fn compile(
        &self,
        table: &TableName,
        columns: &[Column],
        constraints: &Constraints,
        split: &Split,
    ) -> Result<CompiledQuery<Self::Query>>;
}

/// Verifies the required pass-through arguments and hands the raw query text
/// to `build`. Used by every dialect so the short-circuit behaves the same.
pub fn compile_pass_through<Q>(
    pass_through: &PassThrough,
    required: &[&str],
    build: impl FnOnce(&PassThrough, &str) -> Q,
) -> Result<CompiledQuery<Q>> {
    pass_through.verify(required)?;
    let query = pass_through.query()?;
    tracing::debug!(query, "compiling pass-through query");
    Ok(CompiledQuery::pass_through(build(pass_through, query)))
}

/// Comparison operators a range bound can turn into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl Comparison {
    pub fn lower(inclusive: bool) -> Self {
        if inclusive {
            Comparison::Gte
        } else {
            Comparison::Gt
        }
    }

    pub fn upper(inclusive: bool) -> Self {
        if inclusive {
            Comparison::Lte
        } else {
            Comparison::Lt
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Comparison::Eq => "=",
            Comparison::Gt => ">",
            Comparison::Gte => ">=",
            Comparison::Lt => "<",
            Comparison::Lte => "<=",
        }
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// The comparisons a non-point range turns into, lower bound first.
pub fn range_comparisons(range: &Range) -> Vec<(Comparison, &Value)> {
    let mut comparisons = Vec::with_capacity(2);
    if let Some((value, inclusive)) = range.lower_bound() {
        comparisons.push((Comparison::lower(inclusive), value));
    }
    if let Some((value, inclusive)) = range.upper_bound() {
        comparisons.push((Comparison::upper(inclusive), value));
    }
    comparisons
}

/// Dialect-neutral shape of one column's value set.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnPredicate<'a> {
    IsNull,
    IsNotNull,
    AlwaysFalse,
    /// OR of `ranges` (non-point ranges, in order), then the point `values`
    /// (equality or IN list, in order), then `IS NULL` when `null_allowed`.
    Disjunction { ranges: Vec<&'a Range>, values: Vec<&'a Value>, null_allowed: bool },
}

impl<'a> ColumnPredicate<'a> {
    /// Classifies a value set. Returns `None` when it does not restrict the
    /// column at all.
    pub fn classify(value_set: &'a ValueSet) -> Option<Self> {
        if value_set.is_all() {
            return None;
        }
        if value_set.is_none() {
            return Some(ColumnPredicate::AlwaysFalse);
        }
        if value_set.is_only_null() {
            return Some(ColumnPredicate::IsNull);
        }
        if value_set.is_not_null() {
            return Some(ColumnPredicate::IsNotNull);
        }

        let mut ranges = Vec::new();
        let mut values = Vec::new();
        for range in value_set.ranges() {
            match range.single_value() {
                Some(value) => values.push(value),
                None => ranges.push(range),
            }
        }
        Some(ColumnPredicate::Disjunction { ranges, values, null_allowed: value_set.null_allowed() })
    }
}

/// Pairs each constrained column with its predicate, in requested-column
/// order. A constraint on a column that was not requested is rejected, since
/// its type would be unknown.
pub fn constrained_columns<'a>(
    columns: &'a [Column],
    constraints: &'a Constraints,
) -> Result<Vec<(&'a Column, ColumnPredicate<'a>)>> {
    if let Some(unknown) =
        constraints.summary.keys().find(|name| !columns.iter().any(|column| &column.name == *name))
    {
        return Err(Error::malformed(format!("constraint references unknown column '{unknown}'")));
    }
    Ok(columns
        .iter()
        .filter_map(|column| {
            constraints
                .value_set(&column.name)
                .and_then(ColumnPredicate::classify)
                .map(|predicate| (column, predicate))
        })
        .collect())
}

/// A dialect-independent rendering of a compiled query, for tooling.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Explained {
    pub query: String,
    pub params: Vec<Param>,
    pub limit_pushed_down: bool,
    pub pass_through: bool,
}

/// Compiles a request and renders the native query as text.
pub trait Explain: Send + Sync {
    fn explain(
        &self,
        table: &TableName,
        columns: &[Column],
        constraints: &Constraints,
        split: &Split,
    ) -> Result<Explained>;
}

impl<C> Explain for C
where
    C: PredicateCompiler,
    C::Query: fmt::Display,
{
    fn explain(
        &self,
        table: &TableName,
        columns: &[Column],
        constraints: &Constraints,
        split: &Split,
    ) -> Result<Explained> {
        let compiled = self.compile(table, columns, constraints, split)?;
        Ok(Explained {
            query: compiled.query.to_string(),
            params: compiled.params,
            limit_pushed_down: compiled.limit_pushed_down,
            pass_through: compiled.pass_through,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_null_shapes() {
        assert_eq!(ColumnPredicate::classify(&ValueSet::only_null()), Some(ColumnPredicate::IsNull));
        assert_eq!(ColumnPredicate::classify(&ValueSet::not_null()), Some(ColumnPredicate::IsNotNull));
        assert_eq!(ColumnPredicate::classify(&ValueSet::none()), Some(ColumnPredicate::AlwaysFalse));
        assert_eq!(ColumnPredicate::classify(&ValueSet::all()), None);
    }

    #[test]
    fn test_classify_separates_points_from_ranges() {
        let value_set = ValueSet::of_ranges(vec![
            Range::less_than(Value::Int32(0)),
            Range::equal(Value::Int32(5)),
            Range::equal(Value::Int32(7)),
        ])
        .with_nulls();
        match ColumnPredicate::classify(&value_set) {
            Some(ColumnPredicate::Disjunction { ranges, values, null_allowed }) => {
                assert_eq!(ranges.len(), 1);
                assert_eq!(values, vec![&Value::Int32(5), &Value::Int32(7)]);
                assert!(null_allowed);
            }
            other => panic!("unexpected predicate {other:?}"),
        }
    }

    #[test]
    fn test_range_comparisons_follow_marker_kinds() {
        let range = Range::between(Value::Int32(10), true, Value::Int32(20), false);
        let comparisons = range_comparisons(&range);
        assert_eq!(comparisons, vec![(Comparison::Gte, &Value::Int32(10)), (Comparison::Lt, &Value::Int32(20))]);

        let open = Range::greater_than(Value::Int32(18));
        assert_eq!(range_comparisons(&open), vec![(Comparison::Gt, &Value::Int32(18))]);
    }

    #[test]
    fn test_list_columns_widen_to_utf8() {
        let column = Column::new("tags", DataType::List(Box::new(DataType::Utf8)));
        let param = Param::for_column(&column, &Value::List(vec![Value::from("a")]));
        assert_eq!(param.data_type, DataType::Utf8);
        assert_eq!(param.value, Value::Utf8("[a]".to_string()));
    }

    #[test]
    fn test_constrained_columns_follow_column_order() {
        let columns = vec![Column::new("b", DataType::Int32), Column::new("a", DataType::Int32)];
        let constraints = Constraints::new()
            .with_constraint("a", ValueSet::not_null())
            .with_constraint("b", ValueSet::only_null());
        let names: Vec<_> = constrained_columns(&columns, &constraints)
            .unwrap()
            .into_iter()
            .map(|(c, _)| c.name.as_str())
            .collect();
        assert_eq!(names, vec!["b", "a"]);
    }

    #[test]
    fn test_constraint_on_unknown_column_is_malformed() {
        let columns = vec![Column::new("a", DataType::Int32)];
        let constraints = Constraints::new().with_constraint("c", ValueSet::only_null());
        let err = constrained_columns(&columns, &constraints).unwrap_err();
        assert_eq!(err, Error::malformed("constraint references unknown column 'c'"));
    }
}
