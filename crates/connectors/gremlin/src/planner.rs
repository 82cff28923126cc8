//! One split per graph table.

use crate::keys;
use crate::traversal::ElementKind;
use async_trait::async_trait;
use floe_cache::Cache;
use floe_common::{Result, TableName};
use floe_connector::planner::paginate;
use floe_connector::{PartitionDescriptor, PlanRequest, Split, SplitBatch, SplitPlanner};

/// How a table maps onto the graph, as the catalog stores it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphTable {
    /// `vertex` or `edge`; anything else is rejected at planning time.
    pub graph_type: String,
    /// Element label. Defaults to the table name.
    pub label: Option<String>,
}

#[async_trait]
pub trait GraphCatalog: Send + Sync {
    async fn describe(&self, table: &TableName) -> Result<GraphTable>;
}

pub struct GraphSplitPlanner<C> {
    catalog: C,
    cache: Cache<Vec<PartitionDescriptor>>,
}

impl<C: GraphCatalog> GraphSplitPlanner<C> {
    pub fn new(catalog: C) -> Self {
        Self { catalog, cache: Cache::new() }
    }

    pub async fn refresh(&self, table: &TableName) -> Result<Vec<PartitionDescriptor>> {
        self.cache.refresh(&table.to_string(), || self.load(table)).await
    }

    async fn load(&self, table: &TableName) -> Result<Vec<PartitionDescriptor>> {
        let described = self.catalog.describe(table).await?;
        let kind = described.graph_type.parse::<ElementKind>()?;
        let label = described.label.unwrap_or_else(|| table.table.clone());
        tracing::debug!(%table, %kind, %label, "described graph table");
        Ok(vec![PartitionDescriptor::all_data().with_property(keys::GRAPH_TYPE, kind).with_property(keys::LABEL, label)])
    }
}

#[async_trait]
impl<C: GraphCatalog> SplitPlanner for GraphSplitPlanner<C> {
    async fn discover_partitions(&self, table: &TableName) -> Result<Vec<PartitionDescriptor>> {
        self.cache.get_or_refresh(&table.to_string(), || self.load(table)).await
    }

    async fn plan_splits(&self, request: &PlanRequest) -> Result<SplitBatch> {
        // a raw traversal does not need the table mapping
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
