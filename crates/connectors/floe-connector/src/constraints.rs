//! The engine-issued, backend-agnostic scan constraint.
//!
//! A [`Constraints`] carries one [`ValueSet`] per constrained column, an
//! order-by list, an optional row limit and an optional [`PassThrough`]
//! query. Ranges inside a value set are expected to be sorted and already
//! merged by the engine; nothing here re-normalizes them.

use crate::value::Value;
use floe_common::{Column, Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Bound {
    /// Inclusive at the marker value.
    Exactly,
    /// Exclusive, just above the marker value.
    Above,
    /// Exclusive, just below the marker value.
    Below,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    /// `None` marks an unbounded side of a range.
    #[serde(default)]
    pub value: Option<Value>,
    pub bound: Bound,
}

impl Marker {
    pub fn exactly(value: Value) -> Self {
        Self { value: Some(value), bound: Bound::Exactly }
    }

    pub fn above(value: Value) -> Self {
        Self { value: Some(value), bound: Bound::Above }
    }

    pub fn below(value: Value) -> Self {
        Self { value: Some(value), bound: Bound::Below }
    }

    pub fn lower_unbounded() -> Self {
        Self { value: None, bound: Bound::Above }
    }

    pub fn upper_unbounded() -> Self {
        Self { value: None, bound: Bound::Below }
    }

    pub fn is_unbounded(&self) -> bool {
        self.value.is_none()
    }

    pub fn is_inclusive(&self) -> bool {
        self.bound == Bound::Exactly
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Range {
    pub low: Marker,
    pub high: Marker,
}

impl Range {
    pub fn new(low: Marker, high: Marker) -> Self {
        Self { low, high }
    }

    pub fn equal(value: Value) -> Self {
        Self::new(Marker::exactly(value.clone()), Marker::exactly(value))
    }

    pub fn greater_than(value: Value) -> Self {
        Self::new(Marker::above(value), Marker::upper_unbounded())
    }

    pub fn greater_than_or_equal(value: Value) -> Self {
        Self::new(Marker::exactly(value), Marker::upper_unbounded())
    }

    pub fn less_than(value: Value) -> Self {
        Self::new(Marker::lower_unbounded(), Marker::below(value))
    }

    pub fn less_than_or_equal(value: Value) -> Self {
        Self::new(Marker::lower_unbounded(), Marker::exactly(value))
    }

    pub fn between(low: Value, low_inclusive: bool, high: Value, high_inclusive: bool) -> Self {
        let low = if low_inclusive { Marker::exactly(low) } else { Marker::above(low) };
        let high = if high_inclusive { Marker::exactly(high) } else { Marker::below(high) };
        Self::new(low, high)
    }

    pub fn all() -> Self {
        Self::new(Marker::lower_unbounded(), Marker::upper_unbounded())
    }

    pub fn is_single_value(&self) -> bool {
        self.low.bound == Bound::Exactly
            && self.high.bound == Bound::Exactly
            && self.low.value.is_some()
            && self.low.value == self.high.value
    }

    pub fn single_value(&self) -> Option<&Value> {
        if self.is_single_value() {
            self.low.value.as_ref()
        } else {
            None
        }
    }

    pub fn is_all(&self) -> bool {
        self.low.is_unbounded() && self.high.is_unbounded()
    }

    /// Lower bound value and whether it is inclusive.
    pub fn lower_bound(&self) -> Option<(&Value, bool)> {
        self.low.value.as_ref().map(|v| (v, self.low.is_inclusive()))
    }

    /// Upper bound value and whether it is inclusive.
    pub fn upper_bound(&self) -> Option<(&Value, bool)> {
        self.high.value.as_ref().map(|v| (v, self.high.is_inclusive()))
    }
}

/// The allowed values of one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueSet {
    #[serde(default)]
    ranges: Vec<Range>,
    #[serde(default)]
    null_allowed: bool,
}

impl ValueSet {
    pub fn new(ranges: Vec<Range>, null_allowed: bool) -> Self {
        Self { ranges, null_allowed }
    }

    /// `col IS NULL`
    pub fn only_null() -> Self {
        Self::new(Vec::new(), true)
    }

    /// `col IS NOT NULL`
    pub fn not_null() -> Self {
        Self::new(vec![Range::all()], false)
    }

    /// No restriction at all.
    pub fn all() -> Self {
        Self::new(vec![Range::all()], true)
    }

    /// Matches nothing, not even null.
    pub fn none() -> Self {
        Self::new(Vec::new(), false)
    }

    pub fn of_values(values: impl IntoIterator<Item = Value>) -> Self {
        Self::new(values.into_iter().map(Range::equal).collect(), false)
    }

    pub fn of_ranges(ranges: Vec<Range>) -> Self {
        Self::new(ranges, false)
    }

    pub fn with_nulls(mut self) -> Self {
        self.null_allowed = true;
        self
    }

    pub fn ranges(&self) -> &[Range] {
        &self.ranges
    }

    pub fn null_allowed(&self) -> bool {
        self.null_allowed
    }

    pub fn is_only_null(&self) -> bool {
        self.ranges.is_empty() && self.null_allowed
    }

    pub fn is_not_null(&self) -> bool {
        !self.null_allowed && self.ranges.len() == 1 && self.ranges[0].is_all()
    }

    pub fn is_all(&self) -> bool {
        self.null_allowed && self.ranges.len() == 1 && self.ranges[0].is_all()
    }

    pub fn is_none(&self) -> bool {
        self.ranges.is_empty() && !self.null_allowed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SortOrder {
    AscNullsFirst,
    AscNullsLast,
    DescNullsFirst,
    DescNullsLast,
}

impl SortOrder {
    pub fn is_ascending(&self) -> bool {
        matches!(self, SortOrder::AscNullsFirst | SortOrder::AscNullsLast)
    }

    pub fn is_nulls_first(&self) -> bool {
        matches!(self, SortOrder::AscNullsFirst | SortOrder::DescNullsFirst)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderByField {
    pub column: String,
    pub order: SortOrder,
}

impl OrderByField {
    pub fn new(column: impl Into<String>, order: SortOrder) -> Self {
        Self { column: column.into(), order }
    }
}

/// A raw backend query supplied by the caller in place of compiled predicates.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PassThrough {
    pub arguments: BTreeMap<String, String>,
    #[serde(default)]
    pub output_columns: Vec<Column>,
}

impl PassThrough {
    /// Reserved argument carrying the raw query text.
    pub const QUERY: &'static str = "query";

    pub fn new(arguments: BTreeMap<String, String>) -> Self {
        Self { arguments, output_columns: Vec::new() }
    }

    pub fn with_argument(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.arguments.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.arguments.get(key).map(String::as_str)
    }

    pub fn require(&self, key: &str) -> Result<&str> {
        match self.get(key) {
            Some(value) if !value.trim().is_empty() => Ok(value),
            _ => Err(Error::malformed(format!("pass-through argument '{key}' is required"))),
        }
    }

    /// Checks that every key in `required` is present and non-blank.
    pub fn verify(&self, required: &[&str]) -> Result<()> {
        for key in required {
            self.require(key)?;
        }
        Ok(())
    }

    pub fn query(&self) -> Result<&str> {
        self.require(Self::QUERY)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Constraints {
    #[serde(default)]
    pub summary: BTreeMap<String, ValueSet>,
    #[serde(default)]
    pub order_by: Vec<OrderByField>,
    /// `None` means unlimited.
    #[serde(default)]
    pub limit: Option<u64>,
    #[serde(default)]
    pub pass_through: Option<PassThrough>,
}

impl Constraints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_constraint(mut self, column: impl Into<String>, value_set: ValueSet) -> Self {
        self.summary.insert(column.into(), value_set);
        self
    }

    pub fn with_order_by(mut self, field: OrderByField) -> Self {
        self.order_by.push(field);
        self
    }

    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_pass_through(mut self, pass_through: PassThrough) -> Self {
        self.pass_through = Some(pass_through);
        self
    }

    pub fn value_set(&self, column: &str) -> Option<&ValueSet> {
        self.summary.get(column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_value_range() {
        let range = Range::equal(Value::Int32(5));
        assert!(range.is_single_value());
        assert_eq!(range.single_value(), Some(&Value::Int32(5)));
        assert!(!Range::greater_than(Value::Int32(5)).is_single_value());
        assert!(!Range::between(Value::Int32(5), true, Value::Int32(5), false).is_single_value());
    }

    #[test]
    fn test_value_set_shapes() {
        assert!(ValueSet::only_null().is_only_null());
        assert!(ValueSet::not_null().is_not_null());
        assert!(!ValueSet::not_null().is_all());
        assert!(ValueSet::all().is_all());
        assert!(ValueSet::none().is_none());
        assert!(!ValueSet::of_values([Value::Int32(1)]).is_not_null());
    }

    #[test]
    fn test_range_bounds() {
        let range = Range::between(Value::Int32(10), true, Value::Int32(20), false);
        assert_eq!(range.lower_bound(), Some((&Value::Int32(10), true)));
        assert_eq!(range.upper_bound(), Some((&Value::Int32(20), false)));
        assert_eq!(Range::less_than(Value::Int32(3)).lower_bound(), None);
    }

    #[test]
    fn test_sort_order_flags() {
        assert!(SortOrder::AscNullsFirst.is_ascending());
        assert!(SortOrder::AscNullsFirst.is_nulls_first());
        assert!(!SortOrder::DescNullsLast.is_ascending());
        assert!(!SortOrder::DescNullsLast.is_nulls_first());
    }

    #[test]
    fn test_pass_through_requires_arguments() {
        let pass_through = PassThrough::default().with_argument("query", "SELECT 1");
        assert_eq!(pass_through.query().unwrap(), "SELECT 1");

        let err = pass_through.verify(&["query", "database"]).unwrap_err();
        assert_eq!(err, Error::malformed("pass-through argument 'database' is required"));

        let blank = PassThrough::default().with_argument("query", "  ");
        assert!(blank.query().is_err());
    }

    #[test]
    fn test_constraints_from_json() {
        let json = r#"{
            "summary": {
                "age": {"ranges": [{"low": {"value": {"type": "int32", "value": 18}, "bound": "ABOVE"},
                                    "high": {"bound": "BELOW"}}]}
            },
            "order_by": [{"column": "age", "order": "DESC_NULLS_LAST"}],
            "limit": 10
        }"#;
        let constraints: Constraints = serde_json::from_str(json).unwrap();
        assert_eq!(
            constraints.value_set("age"),
            Some(&ValueSet::of_ranges(vec![Range::greater_than(Value::Int32(18))]))
        );
        assert_eq!(constraints.order_by[0].order, SortOrder::DescNullsLast);
        assert_eq!(constraints.limit, Some(10));
        assert!(constraints.pass_through.is_none());
    }
}
