//! Split planning seam and the offset pagination shared by planners.

use crate::constraints::Constraints;
use crate::split::{ContinuationToken, SpillLocation, SplitBatch};
use async_trait::async_trait;
use floe_common::{Column, Error, Result, TableName};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Hard ceiling on the number of splits returned by one planning call.
pub const DEFAULT_MAX_SPLITS_PER_REQUEST: usize = 1_000_000;

/// A physical segment of a table found during discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionDescriptor {
    pub name: String,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

impl PartitionDescriptor {
    /// Name of the sentinel partition standing for the whole table.
    pub const ALL_DATA: &'static str = "*";

    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), properties: BTreeMap::new() }
    }

    pub fn all_data() -> Self {
        Self::new(Self::ALL_DATA)
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.properties.insert(key.into(), value.to_string());
        self
    }

    pub fn is_all_data(&self) -> bool {
        self.name == Self::ALL_DATA
    }
}

/// Replaces an empty discovery result with the single sentinel partition.
pub fn sentinel_if_empty(partitions: Vec<PartitionDescriptor>) -> Vec<PartitionDescriptor> {
    if partitions.is_empty() {
        vec![PartitionDescriptor::all_data()]
    } else {
        partitions
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlanRequest {
    pub table: TableName,
    /// Requested columns. Only planners that run the query while planning
    /// (bulk export) need them.
    pub columns: Vec<Column>,
    pub constraints: Constraints,
    pub spill: SpillLocation,
    /// `None` starts the enumeration.
    pub continuation: Option<ContinuationToken>,
}

impl PlanRequest {
    pub fn new(table: TableName, constraints: Constraints, spill: SpillLocation) -> Self {
        Self { table, columns: Vec::new(), constraints, spill, continuation: None }
    }

    pub fn with_columns(mut self, columns: Vec<Column>) -> Self {
        self.columns = columns;
        self
    }

    pub fn with_continuation(mut self, token: Option<ContinuationToken>) -> Self {
        self.continuation = token;
        self
    }
}

#[async_trait]
pub trait SplitPlanner: Send + Sync {
    async fn discover_partitions(&self, table: &TableName) -> Result<Vec<PartitionDescriptor>>;

    async fn plan_splits(&self, request: &PlanRequest) -> Result<SplitBatch>;
}

/// Returns the page of `items` starting at the token's offset, holding at
/// most `max_per_page` entries, and the token for the following page.
///
/// The same token always yields the same page for the same `items`, which is
/// what makes planning idempotent.
pub fn paginate<'a, T>(
    items: &'a [T],
    token: Option<&ContinuationToken>,
    max_per_page: usize,
) -> Result<(&'a [T], Option<ContinuationToken>)> {
    let offset = match token {
        Some(token) => token.to_offset()?,
        None => 0,
    };
    if offset > items.len() {
        return Err(Error::malformed(format!(
            "continuation token {offset} is past the end of {} entries",
            items.len()
        )));
    }
    let end = offset.saturating_add(max_per_page.max(1)).min(items.len());
    let next = (end < items.len()).then(|| ContinuationToken::from_offset(end));
    Ok((&items[offset..end], next))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinel_if_empty() {
        let partitions = sentinel_if_empty(Vec::new());
        assert_eq!(partitions.len(), 1);
        assert!(partitions[0].is_all_data());

        let partitions = sentinel_if_empty(vec![PartitionDescriptor::new("p0")]);
        assert_eq!(partitions[0].name, "p0");
    }

    #[test]
    fn test_paginate_single_page() {
        let items = [1, 2, 3];
        let (page, next) = paginate(&items, None, 10).unwrap();
        assert_eq!(page, &[1, 2, 3]);
        assert!(next.is_none());
    }

    #[test]
    fn test_paginate_walks_to_the_end() {
        let items: Vec<u32> = (0..5).collect();
        let mut token = None;
        let mut seen = Vec::new();
        loop {
            let (page, next) = paginate(&items, token.as_ref(), 2).unwrap();
            seen.extend_from_slice(page);
            match next {
                Some(next) => token = Some(next),
                None => break,
            }
        }
        assert_eq!(seen, items);
    }

    #[test]
    fn test_paginate_is_idempotent_for_a_token() {
        let items: Vec<u32> = (0..7).collect();
        let token = ContinuationToken::from_offset(3);
        let first = paginate(&items, Some(&token), 2).unwrap();
        let second = paginate(&items, Some(&token), 2).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.0, &[3, 4]);
        assert_eq!(first.1, Some(ContinuationToken::from_offset(5)));
    }

    #[test]
    fn test_paginate_rejects_bad_tokens() {
        let items = [1, 2];
        assert!(paginate(&items, Some(&ContinuationToken::new("x")), 1).is_err());
        assert!(paginate(&items, Some(&ContinuationToken::from_offset(3)), 1).is_err());
    }
}
