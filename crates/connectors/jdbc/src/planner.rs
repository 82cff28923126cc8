//! Split planning for relational sources.
//!
//! Three strategies: one split per catalog partition, one split per
//! range bucket of a numeric key, and one split per object produced by a bulk
//! export of the filtered query.

use crate::compiler::SqlCompiler;
use crate::dialect::SqlDialect;
use crate::properties;
use async_trait::async_trait;
use floe_cache::Cache;
use floe_common::{Error, Result, TableName};
use floe_connector::planner::{paginate, sentinel_if_empty};
use floe_connector::{
    CompiledQuery, ContinuationToken, PartitionDescriptor, PlanRequest, PredicateCompiler, SpillLocation, Split,
    SplitBatch, SplitPlanner, DEFAULT_MAX_SPLITS_PER_REQUEST,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Source of a table's physical partitions.
#[async_trait]
pub trait PartitionCatalog: Send + Sync {
    async fn list_partitions(&self, table: &TableName) -> Result<Vec<PartitionDescriptor>>;
}

pub struct PartitionSplitPlanner<C> {
    catalog: C,
    cache: Cache<Vec<PartitionDescriptor>>,
    max_splits_per_request: usize,
}

impl<C: PartitionCatalog> PartitionSplitPlanner<C> {
    pub fn new(catalog: C) -> Self {
        Self { catalog, cache: Cache::new(), max_splits_per_request: DEFAULT_MAX_SPLITS_PER_REQUEST }
    }

    pub fn with_max_splits_per_request(mut self, max: usize) -> Self {
        self.max_splits_per_request = max;
        self
    }

    /// Re-reads the partitions of `table` from the catalog.
    pub async fn refresh(&self, table: &TableName) -> Result<Vec<PartitionDescriptor>> {
        let partitions = self.cache.refresh(&table.to_string(), || self.load(table)).await?;
        info!(%table, partitions = partitions.len(), "refreshed partitions");
        Ok(partitions)
    }

    async fn load(&self, table: &TableName) -> Result<Vec<PartitionDescriptor>> {
        let partitions = self.catalog.list_partitions(table).await?;
        Ok(sentinel_if_empty(partitions))
    }
}

#[async_trait]
impl<C: PartitionCatalog> SplitPlanner for PartitionSplitPlanner<C> {
    async fn discover_partitions(&self, table: &TableName) -> Result<Vec<PartitionDescriptor>> {
        self.cache.get_or_refresh(&table.to_string(), || self.load(table)).await
    }

    async fn plan_splits(&self, request: &PlanRequest) -> Result<SplitBatch> {
        let partitions = self.discover_partitions(&request.table).await?;
        let (page, continuation) =
            paginate(&partitions, request.continuation.as_ref(), self.max_splits_per_request)?;
        let splits = page
            .iter()
            .map(|partition| {
                Split::builder(request.spill.clone())
                    .add_all(&partition.properties)
                    .add(properties::PARTITION_NAME, &partition.name)
                    .build()
            })
            .collect();
        Ok(SplitBatch::new(splits, continuation))
    }
}

/// Summary statistics of an integral key column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyStats {
    pub column: String,
    pub min: i64,
    pub max: i64,
    pub row_count: u64,
}

#[async_trait]
pub trait KeyStatistics: Send + Sync {
    /// Statistics of the table's split key, or `None` when the table has no
    /// usable key or no statistics.
    async fn key_stats(&self, table: &TableName) -> Result<Option<KeyStats>>;
}

/// One bucket of a key range: `[low, high)`, or `[low, ..)` for the last.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyRange {
    pub low: i64,
    pub high: Option<i64>,
}

impl KeyStats {
    /// Statistics whose minimum exceeds the maximum are stale and cannot be
    /// bucketed.
    pub fn is_consistent(&self) -> bool {
        self.min <= self.max
    }
}

/// Cuts `[min, max]` into at most `max_buckets` contiguous buckets sized by
/// the row estimate. The last bucket is open-ended so keys at or beyond
/// `max` are never lost; inconsistent statistics give one bucket covering
/// every key.
pub fn bucket_key_range(stats: &KeyStats, target_rows_per_split: u64, max_buckets: usize) -> Vec<KeyRange> {
    if !stats.is_consistent() {
        return vec![KeyRange { low: i64::MIN, high: None }];
    }
    let target = target_rows_per_split.max(1);
    let wanted = stats.row_count.div_ceil(target).max(1);
    let span = stats.max as i128 - stats.min as i128 + 1;
    let buckets = (wanted as i128).min(max_buckets.max(1) as i128).min(span);
    let width = (span + buckets - 1) / buckets;

    let end = stats.max as i128 + 1;
    let mut ranges = Vec::with_capacity(buckets as usize);
    let mut low = stats.min as i128;
    while low < end {
        let high = low + width;
        // bounds below `end` always fit an i64
        let high = (high < end).then_some(high as i64);
        ranges.push(KeyRange { low: low as i64, high });
        match high {
            Some(high) => low = high as i128,
            None => break,
        }
    }
    ranges
}

pub struct RangeSplitPlanner<S> {
    statistics: S,
    target_rows_per_split: u64,
    max_splits: usize,
    max_splits_per_request: usize,
}

impl<S: KeyStatistics> RangeSplitPlanner<S> {
    pub fn new(statistics: S, target_rows_per_split: u64, max_splits: usize) -> Self {
        Self {
            statistics,
            target_rows_per_split,
            max_splits,
            max_splits_per_request: DEFAULT_MAX_SPLITS_PER_REQUEST,
        }
    }

    pub fn with_max_splits_per_request(mut self, max: usize) -> Self {
        self.max_splits_per_request = max;
        self
    }
}

#[async_trait]
impl<S: KeyStatistics> SplitPlanner for RangeSplitPlanner<S> {
    async fn discover_partitions(&self, table: &TableName) -> Result<Vec<PartitionDescriptor>> {
        let Some(stats) = self.statistics.key_stats(table).await? else {
            debug!(%table, "no key statistics, scanning as one split");
            return Ok(vec![PartitionDescriptor::all_data()]);
        };
        if !stats.is_consistent() {
            warn!(%table, min = stats.min, max = stats.max, "inconsistent key statistics, scanning as one split");
            return Ok(vec![PartitionDescriptor::all_data()]);
        }
        let ranges = bucket_key_range(&stats, self.target_rows_per_split, self.max_splits);
        Ok(ranges
            .iter()
            .enumerate()
            .map(|(i, range)| {
                let partition = PartitionDescriptor::new(format!("{}_{i}", stats.column))
                    .with_property(properties::RANGE_COLUMN, &stats.column)
                    .with_property(properties::RANGE_LOW, range.low)
                    .with_property(properties::RANGE_INCLUDES_NULLS, i == 0);
                match range.high {
                    Some(high) => partition.with_property(properties::RANGE_HIGH, high),
                    None => partition,
                }
            })
            .collect())
    }

    async fn plan_splits(&self, request: &PlanRequest) -> Result<SplitBatch> {
        let partitions = self.discover_partitions(&request.table).await?;
        let (page, continuation) =
            paginate(&partitions, request.continuation.as_ref(), self.max_splits_per_request)?;
        let splits = page
            .iter()
            .map(|partition| {
                if partition.is_all_data() {
                    return Split::builder(request.spill.clone()).build();
                }
                Split::builder(request.spill.clone()).add_all(&partition.properties).build()
            })
            .collect();
        Ok(SplitBatch::new(splits, continuation))
    }
}

/// Location of one finished export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportHandle {
    pub location: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ObjectPage {
    pub objects: Vec<String>,
    pub next_cursor: Option<String>,
}

/// Intermediate storage a query can be exported into.
#[async_trait]
pub trait ExportStore: Send + Sync {
    async fn export(&self, query: &CompiledQuery<String>, spill: &SpillLocation) -> Result<ExportHandle>;

    async fn list_objects(&self, location: &str, cursor: Option<&str>, max_objects: usize) -> Result<ObjectPage>;
}

/// Resume position of an export listing: the export is never re-issued once
/// a token exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct ExportCursor {
    location: String,
    cursor: Option<String>,
}

impl ExportCursor {
    fn encode(&self) -> Result<ContinuationToken> {
        serde_json::to_string(self)
            .map(ContinuationToken::new)
            .map_err(|e| Error::Internal(format!("failed to encode export token: {e}")))
    }

    fn decode(token: &ContinuationToken) -> Result<Self> {
        serde_json::from_str(token.as_str())
            .map_err(|_| Error::malformed(format!("invalid export continuation token '{token}'")))
    }
}

pub struct ExportSplitPlanner<S, D> {
    store: S,
    compiler: SqlCompiler<D>,
    max_splits_per_request: usize,
}

impl<S: ExportStore, D: SqlDialect> ExportSplitPlanner<S, D> {
    pub fn new(store: S, compiler: SqlCompiler<D>) -> Self {
        Self { store, compiler, max_splits_per_request: DEFAULT_MAX_SPLITS_PER_REQUEST }
    }

    pub fn with_max_splits_per_request(mut self, max: usize) -> Self {
        self.max_splits_per_request = max;
        self
    }

    async fn start_export(&self, request: &PlanRequest) -> Result<ExportCursor> {
        if request.columns.is_empty() {
            return Err(Error::malformed(format!("export of {} needs the requested columns", request.table)));
        }
        let query = self.compiler.compile(&request.table, &request.columns, &request.constraints, &Split::empty())?;
        let handle = self.store.export(&query, &request.spill).await?;
        info!(table = %request.table, location = %handle.location, "exported query");
        Ok(ExportCursor { location: handle.location, cursor: None })
    }
}

#[async_trait]
impl<S: ExportStore, D: SqlDialect> SplitPlanner for ExportSplitPlanner<S, D> {
    /// Exports are created per query, so there is nothing to discover ahead
    /// of planning.
    async fn discover_partitions(&self, _table: &TableName) -> Result<Vec<PartitionDescriptor>> {
        Ok(vec![PartitionDescriptor::all_data()])
    }

    async fn plan_splits(&self, request: &PlanRequest) -> Result<SplitBatch> {
        let position = match &request.continuation {
            Some(token) => ExportCursor::decode(token)?,
            None => self.start_export(request).await?,
        };
        let page = self
            .store
            .list_objects(&position.location, position.cursor.as_deref(), self.max_splits_per_request.max(1))
            .await?;
        let splits = page
            .objects
            .iter()
            .map(|object| {
                Split::builder(request.spill.clone())
                    .add(properties::EXPORT_LOCATION, &position.location)
                    .add(properties::EXPORT_OBJECT, object)
                    .build()
            })
            .collect();
        let continuation = match page.next_cursor {
            Some(cursor) => Some(ExportCursor { location: position.location.clone(), cursor: Some(cursor) }.encode()?),
            None => None,
        };
        Ok(SplitBatch::new(splits, continuation))
    }
}
