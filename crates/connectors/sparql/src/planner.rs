//! One split per RDF table, carrying the table's query layout.

use crate::keys::{self, QueryMode};
use async_trait::async_trait;
use floe_cache::Cache;
use floe_common::{Error, Result, TableName};
use floe_connector::planner::paginate;
use floe_connector::{PartitionDescriptor, PlanRequest, Split, SplitBatch, SplitPlanner};

/// Table metadata as the catalog stores it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RdfTable {
    /// `class` or `sparql`.
    pub query_mode: String,
    pub class: Option<String>,
    pub predicate_prefix: Option<String>,
    pub subject_column: Option<String>,
    pub stored_query: Option<String>,
}

#[async_trait]
pub trait RdfCatalog: Send + Sync {
    async fn describe(&self, table: &TableName) -> Result<RdfTable>;
}

pub struct RdfSplitPlanner<C> {
    catalog: C,
    cache: Cache<Vec<PartitionDescriptor>>,
}

impl<C: RdfCatalog> RdfSplitPlanner<C> {
    pub fn new(catalog: C) -> Self {
        Self { catalog, cache: Cache::new() }
    }

    pub async fn refresh(&self, table: &TableName) -> Result<Vec<PartitionDescriptor>> {
        self.cache.refresh(&table.to_string(), || self.load(table)).await
    }

    async fn load(&self, table: &TableName) -> Result<Vec<PartitionDescriptor>> {
        let described = self.catalog.describe(table).await?;
        let mode = described.query_mode.parse::<QueryMode>()?;
        let mut partition = PartitionDescriptor::all_data().with_property(keys::QUERY_MODE, mode);
        match mode {
            QueryMode::Class => {
                let class = described
                    .class
                    .ok_or_else(|| Error::malformed(format!("class-mode table {table} has no class IRI")))?;
                partition = partition
                    .with_property(keys::CLASS, class)
                    .with_property(keys::PREDICATE_PREFIX, described.predicate_prefix.unwrap_or_default())
                    .with_property(
                        keys::SUBJECT_COLUMN,
                        described.subject_column.as_deref().unwrap_or(keys::DEFAULT_SUBJECT_COLUMN),
                    );
            }
            QueryMode::Sparql => {
                let query = described
                    .stored_query
                    .ok_or_else(|| Error::malformed(format!("sparql-mode table {table} has no stored query")))?;
                partition = partition.with_property(keys::STORED_QUERY, query);
            }
        }
        tracing::debug!(%table, %mode, "described rdf table");
        Ok(vec![partition])
    }
}

#[async_trait]
impl<C: RdfCatalog> SplitPlanner for RdfSplitPlanner<C> {
    async fn discover_partitions(&self, table: &TableName) -> Result<Vec<PartitionDescriptor>> {
        self.cache.get_or_refresh(&table.to_string(), || self.load(table)).await
    }

    async fn plan_splits(&self, request: &PlanRequest) -> Result<SplitBatch> {
        if request.constraints.pass_through.is_some() {
            let splits = [Split::builder(request.spill.clone()).build()];
            let (page, continuation) = paginate(&splits, request.continuation.as_ref(), 1)?;
            return Ok(SplitBatch::new(page.to_vec(), continuation));
        }
        let partitions = self.discover_partitions(&request.table).await?;
        let (page, continuation) = paginate(&partitions, request.continuation.as_ref(), partitions.len())?;
        let splits = page
            .iter()
            .map(|partition| Split::builder(request.spill.clone()).add_all(&partition.properties).build())
            .collect();
        Ok(SplitBatch::new(splits, continuation))
    }
}
