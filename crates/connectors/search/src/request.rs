//! Search requests and split keys.

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use std::fmt;

/// Split property holding the physical index.
pub const INDEX: &str = "index";
/// Split property holding the shard number within [`INDEX`].
pub const SHARD: &str = "shard";
/// Column addressing the document id.
pub const ID_FIELD: &str = "_id";

/// A search body aimed at an index, optionally pinned to one shard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub index: String,
    pub body: Json,
    pub shard: Option<u32>,
}

impl SearchRequest {
    pub fn new(index: impl Into<String>, body: Json) -> Self {
        Self { index: index.into(), body, shard: None }
    }

    pub fn with_shard(mut self, shard: Option<u32>) -> Self {
        self.shard = shard;
        self
    }

    /// `preference` value routing the request to its shard.
    pub fn preference(&self) -> Option<String> {
        self.shard.map(|shard| format!("_shards:{shard}"))
    }
}

impl fmt::Display for SearchRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "POST /{}/_search", self.index)?;
        if let Some(preference) = self.preference() {
            write!(f, "?preference={preference}")?;
        }
        write!(f, " {}", self.body)
    }
}
