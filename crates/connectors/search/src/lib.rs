//! Search-index connector for Floe.
//!
//! A table name resolves to concrete indices (aliases and `*` patterns
//! included) and every shard of those indices becomes one split. Constraints
//! compile into a JSON query DSL body pinned to the split's shard, and the
//! result is read page by page through a scroll context.

pub mod client;
pub mod compiler;
pub mod document;
pub mod planner;
pub mod request;

pub use client::{ScrollCursor, SearchClient, SearchExecutor, SearchPage, DEFAULT_SCROLL_TTL};
pub use compiler::{SearchCompiler, DEFAULT_PAGE_SIZE};
pub use document::{SearchHit, SearchHitMaterializer};
pub use planner::{resolve_indices, IndexCatalog, ShardSplitPlanner};
pub use request::SearchRequest;

use floe_connector::{QueryOrchestrator, ReadOptions, ScanConnector, DEFAULT_MAX_SPLITS_PER_REQUEST};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Tuning for search reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchOptions {
    /// Hits requested per search or scroll page.
    pub page_size: usize,
    /// How long the cluster keeps a scroll context between pages.
    pub scroll_ttl: String,
    pub max_splits_per_request: usize,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            scroll_ttl: DEFAULT_SCROLL_TTL.to_string(),
            max_splits_per_request: DEFAULT_MAX_SPLITS_PER_REQUEST,
        }
    }
}

pub type SearchConnector<C, S> =
    ScanConnector<ShardSplitPlanner<C>, SearchCompiler, SearchExecutor<S>, SearchHitMaterializer>;

pub fn search_connector<C, S>(
    catalog: C,
    client: Arc<S>,
    search: &SearchOptions,
    options: ReadOptions,
) -> SearchConnector<C, S>
where
    C: IndexCatalog,
    S: SearchClient + 'static,
{
    let planner = ShardSplitPlanner::new(catalog).with_max_splits_per_request(search.max_splits_per_request);
    let executor = SearchExecutor::new(client, search.scroll_ttl.clone());
    let orchestrator =
        QueryOrchestrator::new(SearchCompiler::new(search.page_size), executor, SearchHitMaterializer, options);
    ScanConnector::new("search", planner, orchestrator)
}
