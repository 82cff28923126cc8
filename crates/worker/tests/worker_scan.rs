use async_trait::async_trait;
use floe_common::{Column, DataType, Result, TableName};
use floe_connector::{Connector, Constraints, PlanRequest, ReadRequest, ScanState, SpillLocation};
use floe_connector_gremlin::{gremlin_connector, ComponentType, GraphCatalog, GraphElement, GraphTable, GraphValue, GremlinClient};
use floe_worker::{ConnectorKind, Settings, SplitWorker};
use std::sync::Arc;

const DEFAULT_CONFIG: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../../config/default.toml");

struct People;

#[async_trait]
impl GraphCatalog for People {
    async fn describe(&self, _table: &TableName) -> Result<GraphTable> {
        Ok(GraphTable { graph_type: "vertex".to_string(), label: None })
    }
}

struct ManyVertices(usize);

#[async_trait]
impl GremlinClient for ManyVertices {
    async fn submit(&self, _script: &str, _database: Option<&str>, _shape: ComponentType) -> Result<Vec<GraphElement>> {
        Ok((0..self.0)
            .map(|n| GraphElement::new().with("T.id", GraphValue::Long(n as i64)).with("T.label", GraphValue::from("people")))
            .collect())
    }
}

#[test]
fn test_shipped_default_config_loads() {
    let settings = Settings::from_path(DEFAULT_CONFIG).unwrap();
    assert_eq!(settings.connector, ConnectorKind::Postgres);
    assert_eq!(settings.batch_size, 1024);
    assert_eq!(settings.channel_capacity, 8);
    assert_eq!(settings.range.max_splits, 64);
    assert_eq!(settings.search.scroll_ttl, "1m");
}

#[tokio::test]
async fn test_split_runs_through_the_worker_in_batches() {
    let mut settings = Settings::from_path(DEFAULT_CONFIG).unwrap();
    settings.batch_size = 4;
    settings.channel_capacity = 1;
    let connector: Arc<dyn Connector> = Arc::new(gremlin_connector(People, ManyVertices(10), settings.read_options()));

    let table = TableName::new("social", "people");
    let plan = PlanRequest::new(table.clone(), Constraints::new(), SpillLocation::new("spill", "q-1"));
    let split = connector.get_splits(&plan).await.unwrap().splits.remove(0);

    let columns = vec![Column::new("id", DataType::Int64), Column::new("label", DataType::Utf8)];
    let worker = SplitWorker::new(Arc::clone(&connector), &settings);
    let (batches, outcome) = worker.spawn(ReadRequest::new(table, columns, Constraints::new(), split)).collect().await.unwrap();

    assert_eq!(outcome.state, ScanState::Done);
    assert_eq!(outcome.rows_emitted, 10);
    let sizes: Vec<usize> = batches.iter().map(|batch| batch.num_rows()).collect();
    assert_eq!(sizes, vec![4, 4, 2]);
}
