//! Index resolution and shard-level splits.

use crate::request::{INDEX, SHARD};
use async_trait::async_trait;
use floe_cache::Cache;
use floe_common::{Error, Result, TableName};
use floe_connector::planner::{paginate, sentinel_if_empty};
use floe_connector::{
    PartitionDescriptor, PlanRequest, Split, SplitBatch, SplitPlanner, DEFAULT_MAX_SPLITS_PER_REQUEST,
};
use regex::Regex;

/// Cluster metadata needed to turn a table name into physical shards.
#[async_trait]
pub trait IndexCatalog: Send + Sync {
    /// Indices behind `alias`, empty when `alias` is not an alias.
    async fn resolve_alias(&self, alias: &str) -> Result<Vec<String>>;
    async fn list_indices(&self) -> Result<Vec<String>>;
    /// Shard numbers of `index`.
    async fn shards(&self, index: &str) -> Result<Vec<u32>>;
}

/// Compiles a table name with `*` wildcards into an anchored pattern.
fn wildcard(pattern: &str) -> Result<Regex> {
    let body = pattern.split('*').map(regex::escape).collect::<Vec<_>>().join(".*");
    Regex::new(&format!("^{body}$")).map_err(|e| Error::malformed(format!("invalid index pattern '{pattern}': {e}")))
}

/// Resolves a table name to concrete indices: alias targets, plus every
/// index matching the name when it holds a wildcard. A plain name that is
/// neither stands for itself.
pub async fn resolve_indices<C: IndexCatalog + ?Sized>(catalog: &C, name: &str) -> Result<Vec<String>> {
    let mut indices = catalog.resolve_alias(name).await?;
    if name.contains('*') {
        let pattern = wildcard(name)?;
        indices.extend(catalog.list_indices().await?.into_iter().filter(|index| pattern.is_match(index)));
    } else if indices.is_empty() {
        indices.push(name.to_string());
    }
    indices.sort();
    indices.dedup();
    Ok(indices)
}

pub struct ShardSplitPlanner<C> {
    catalog: C,
    cache: Cache<Vec<PartitionDescriptor>>,
    max_splits_per_request: usize,
}

impl<C: IndexCatalog> ShardSplitPlanner<C> {
    pub fn new(catalog: C) -> Self {
        Self { catalog, cache: Cache::new(), max_splits_per_request: DEFAULT_MAX_SPLITS_PER_REQUEST }
    }

    pub fn with_max_splits_per_request(mut self, max: usize) -> Self {
        self.max_splits_per_request = max;
        self
    }

    pub async fn refresh(&self, table: &TableName) -> Result<Vec<PartitionDescriptor>> {
        self.cache.refresh(&table.to_string(), || self.load(table)).await
    }

    async fn load(&self, table: &TableName) -> Result<Vec<PartitionDescriptor>> {
        let indices = resolve_indices(&self.catalog, &table.table).await?;
        let mut partitions = Vec::new();
        for index in &indices {
            let shards = self.catalog.shards(index).await?;
            if shards.is_empty() {
                partitions.push(PartitionDescriptor::new(index.as_str()).with_property(INDEX, index));
                continue;
            }
            partitions.extend(shards.into_iter().map(|shard| {
                PartitionDescriptor::new(format!("{index}/{shard}")).with_property(INDEX, index).with_property(SHARD, shard)
            }));
        }
        tracing::debug!(%table, indices = indices.len(), partitions = partitions.len(), "resolved search shards");
        Ok(sentinel_if_empty(partitions))
    }
}

#[async_trait]
impl<C: IndexCatalog> SplitPlanner for ShardSplitPlanner<C> {
    async fn discover_partitions(&self, table: &TableName) -> Result<Vec<PartitionDescriptor>> {
        self.cache.get_or_refresh(&table.to_string(), || self.load(table)).await
    }

    async fn plan_splits(&self, request: &PlanRequest) -> Result<SplitBatch> {
        // a raw search names its own index
        if request.constraints.pass_through.is_some() {
            let splits = [Split::builder(request.spill.clone()).build()];
            let (page, continuation) = paginate(&splits, request.continuation.as_ref(), 1)?;
            return Ok(SplitBatch::new(page.to_vec(), continuation));
        }

        let partitions = self.discover_partitions(&request.table).await?;
        let (page, continuation) =
            paginate(&partitions, request.continuation.as_ref(), self.max_splits_per_request)?;
        let splits = page
            .iter()
            .map(|partition| Split::builder(request.spill.clone()).add_all(&partition.properties).build())
            .collect();
        Ok(SplitBatch::new(splits, continuation))
    }
}
