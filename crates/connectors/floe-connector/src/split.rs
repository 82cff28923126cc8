//! A Split is an opaque handle to a unit of work for a connector.
//!
//! For a partitioned table it names the partition, for a search index the
//! shard, for a bulk export the exported object. Everything in it must be
//! representable as strings because the host may serialize it between the
//! planning and the read phase.

use floe_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Where a split may spill its output, supplied by the host runtime.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SpillLocation {
    pub bucket: String,
    pub prefix: String,
    #[serde(default)]
    pub encryption_key_ref: Option<String>,
}

impl SpillLocation {
    pub fn new(bucket: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self { bucket: bucket.into(), prefix: prefix.into(), encryption_key_ref: None }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Split {
    properties: BTreeMap<String, String>,
    #[serde(default)]
    spill: SpillLocation,
}

impl Split {
    pub fn builder(spill: SpillLocation) -> SplitBuilder {
        SplitBuilder { properties: BTreeMap::new(), spill }
    }

    /// A split with no properties, used when the scan is not partitioned.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub fn require(&self, key: &str) -> Result<&str> {
        self.property(key)
            .ok_or_else(|| Error::malformed(format!("split property '{key}' is missing")))
    }

    /// Parses an optional property, failing if it is present but malformed.
    pub fn parse<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        match self.property(key) {
            None => Ok(None),
            Some(raw) => raw.parse::<T>().map(Some).map_err(|e| {
                Error::malformed(format!("split property '{key}' has invalid value '{raw}': {e}"))
            }),
        }
    }

    pub fn spill(&self) -> &SpillLocation {
        &self.spill
    }
}

pub struct SplitBuilder {
    properties: BTreeMap<String, String>,
    spill: SpillLocation,
}

impl SplitBuilder {
    pub fn add(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.properties.insert(key.into(), value.to_string());
        self
    }

    pub fn add_all<'a>(mut self, properties: impl IntoIterator<Item = (&'a String, &'a String)>) -> Self {
        for (key, value) in properties {
            self.properties.insert(key.clone(), value.clone());
        }
        self
    }

    pub fn build(self) -> Split {
        Split { properties: self.properties, spill: self.spill }
    }
}

/// Opaque resume position for a paged enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContinuationToken(String);

impl ContinuationToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn from_offset(offset: usize) -> Self {
        Self(offset.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn to_offset(&self) -> Result<usize> {
        self.0
            .parse::<usize>()
            .map_err(|_| Error::malformed(format!("invalid continuation token '{}'", self.0)))
    }
}

impl fmt::Display for ContinuationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The splits produced by one planning call.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SplitBatch {
    pub splits: Vec<Split>,
    /// `None` once enumeration is complete.
    pub continuation: Option<ContinuationToken>,
}

impl SplitBatch {
    pub fn new(splits: Vec<Split>, continuation: Option<ContinuationToken>) -> Self {
        Self { splits, continuation }
    }

    pub fn is_last(&self) -> bool {
        self.continuation.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_builder_and_lookup() {
        let split = Split::builder(SpillLocation::new("bucket", "query-1"))
            .add("partition_name", "p0")
            .add("range_low", 10)
            .build();
        assert_eq!(split.property("partition_name"), Some("p0"));
        assert_eq!(split.parse::<i64>("range_low").unwrap(), Some(10));
        assert_eq!(split.parse::<i64>("range_high").unwrap(), None);
        assert_eq!(split.spill().prefix, "query-1");
        assert!(split.require("shard").is_err());
    }

    #[test]
    fn test_split_parse_rejects_garbage() {
        let split = Split::builder(SpillLocation::default()).add("range_low", "10; DROP").build();
        let err = split.parse::<i64>("range_low").unwrap_err();
        assert_eq!(err.code(), floe_common::ErrorCode::MalformedRequest);
    }

    #[test]
    fn test_split_survives_serialization() {
        let split = Split::builder(SpillLocation::new("b", "p")).add("shard", 3).build();
        let json = serde_json::to_string(&split).unwrap();
        let back: Split = serde_json::from_str(&json).unwrap();
        assert_eq!(back, split);
    }

    #[test]
    fn test_continuation_token_offsets() {
        assert_eq!(ContinuationToken::from_offset(42).to_offset().unwrap(), 42);
        assert!(ContinuationToken::new("abc").to_offset().is_err());
    }
}
