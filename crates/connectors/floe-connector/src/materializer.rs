//! Conversion of backend records into canonical rows.
//!
//! A backend implements [`RowMaterializer`] by listing a record's keys and
//! extracting the native value under one key. Name resolution, missing
//! columns and the exact type check are shared and live in
//! [`materialize_row`].

use crate::coerce::check_exact;
use crate::value::Value;
use floe_common::{CasePolicy, Column, Result};
use std::collections::HashMap;

/// One slot per requested column, in request order.
pub type CanonicalRow = Vec<Option<Value>>;

/// Lookup table from column names to the keys of one record.
///
/// Built once per record so that case-insensitive matching costs one pass
/// over the record keys instead of one pass per column. An exact match always
/// wins over a case-folded one.
#[derive(Debug)]
pub struct KeyIndex<'r> {
    policy: CasePolicy,
    exact: HashMap<&'r str, &'r str>,
    folded: HashMap<String, &'r str>,
}

impl<'r> KeyIndex<'r> {
    pub fn build(keys: impl IntoIterator<Item = &'r str>, policy: CasePolicy) -> Self {
        let mut exact = HashMap::new();
        let mut folded = HashMap::new();
        for key in keys {
            exact.insert(key, key);
            if policy == CasePolicy::Insensitive {
                // first key wins when two keys fold to the same name
                folded.entry(policy.normalize(key)).or_insert(key);
            }
        }
        Self { policy, exact, folded }
    }

    pub fn resolve(&self, name: &str) -> Option<&'r str> {
        if let Some(key) = self.exact.get(name) {
            return Some(*key);
        }
        match self.policy {
            CasePolicy::Insensitive => self.folded.get(&self.policy.normalize(name)).copied(),
            CasePolicy::Sensitive => None,
        }
    }

    pub fn len(&self) -> usize {
        self.exact.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exact.is_empty()
    }
}

pub trait RowMaterializer: Send + Sync {
    type Record: Send;

    /// Every key present in `record`.
    fn record_keys<'r>(&self, record: &'r Self::Record) -> Vec<&'r str>;

    /// Maps a column to the record key holding its value. Backends with
    /// structural keys override this to rename them first.
    fn resolve_key<'r>(&self, index: &KeyIndex<'r>, column: &Column) -> Option<&'r str> {
        index.resolve(&column.name)
    }

    /// Converts the native value under `key` for `column`. Multi-valued
    /// properties are collapsed here.
    fn extract_key(&self, record: &Self::Record, key: &str, column: &Column) -> Result<Option<Value>>;

    fn extract(&self, record: &Self::Record, column: &Column, policy: CasePolicy) -> Result<Option<Value>> {
        let mut row = materialize_row(self, record, std::slice::from_ref(column), policy)?;
        Ok(row.pop().flatten())
    }

    fn materialize(&self, record: &Self::Record, columns: &[Column], policy: CasePolicy) -> Result<CanonicalRow> {
        materialize_row(self, record, columns, policy)
    }
}

/// Materializes `record` into one slot per column.
///
/// A column with no matching key is null. Every extracted value must match
/// the declared column type exactly.
pub fn materialize_row<M>(
    materializer: &M,
    record: &M::Record,
    columns: &[Column],
    policy: CasePolicy,
) -> Result<CanonicalRow>
where
    M: RowMaterializer + ?Sized,
{
    let index = KeyIndex::build(materializer.record_keys(record), policy);
    columns
        .iter()
        .map(|column| match materializer.resolve_key(&index, column) {
            None => Ok(None),
            Some(key) => match materializer.extract_key(record, key, column)? {
                Some(value) => check_exact(column, value).map(Some),
                None => Ok(None),
            },
        })
        .collect()
}
