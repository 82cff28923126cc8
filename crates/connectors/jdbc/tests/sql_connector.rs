use arrow::array::Int64Array;
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use floe_common::{Column, DataType, ErrorCode, Result, TableName};
use floe_connector::{
    CompiledQuery, Connector, Constraints, ContinuationToken, PartitionDescriptor, PlanRequest, PredicateCompiler,
    QueryExecutor, ReadOptions, ReadRequest, RecordCursor, ScanState, SpillLocation, Split, SplitPlanner, Value,
    ValueSet, VecCursor,
};
use floe_connector_jdbc::{
    export_connector, properties, sql_connector, ExportHandle, ExportSplitPlanner, ExportStore, KeyStatistics,
    KeyStats, ObjectPage, ObjectReader, PartitionCatalog, PartitionSplitPlanner, PostgresDialect, RangeSplitPlanner,
    SqlCompiler, SqlRow, SqlValue,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

struct StaticCatalog {
    partitions: Vec<PartitionDescriptor>,
    calls: Arc<AtomicUsize>,
}

impl StaticCatalog {
    fn new(names: &[&str]) -> Self {
        Self {
            partitions: names.iter().map(|n| PartitionDescriptor::new(*n)).collect(),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl PartitionCatalog for StaticCatalog {
    async fn list_partitions(&self, _table: &TableName) -> Result<Vec<PartitionDescriptor>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.partitions.clone())
    }
}

fn orders() -> TableName {
    TableName::new("sales", "orders")
}

fn plan_request(table: TableName) -> PlanRequest {
    PlanRequest::new(table, Constraints::new(), SpillLocation::new("spill", "q-1"))
}

#[tokio::test]
async fn test_partitions_become_splits() {
    let planner = PartitionSplitPlanner::new(StaticCatalog::new(&["p0", "p1"]));

    let partitions = planner.discover_partitions(&orders()).await.unwrap();
    assert_eq!(partitions.len(), 2);

    let batch = planner.plan_splits(&plan_request(orders())).await.unwrap();
    let names: Vec<_> = batch.splits.iter().map(|s| s.property(properties::PARTITION_NAME).unwrap()).collect();
    assert_eq!(names, vec!["p0", "p1"]);
    assert!(batch.continuation.is_none());
    assert_eq!(batch.splits[0].spill().prefix, "q-1");
}

#[tokio::test]
async fn test_no_partitions_degrades_to_sentinel() {
    let planner = PartitionSplitPlanner::new(StaticCatalog::new(&[]));
    let batch = planner.plan_splits(&plan_request(orders())).await.unwrap();
    assert_eq!(batch.splits.len(), 1);
    assert_eq!(batch.splits[0].property(properties::PARTITION_NAME), Some(PartitionDescriptor::ALL_DATA));
}

#[tokio::test]
async fn test_partition_discovery_is_cached_until_refresh() {
    let catalog = StaticCatalog::new(&["p0"]);
    let calls = catalog.calls.clone();
    let planner = PartitionSplitPlanner::new(catalog);

    planner.discover_partitions(&orders()).await.unwrap();
    planner.plan_splits(&plan_request(orders())).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    planner.refresh(&orders()).await.unwrap();
    planner.discover_partitions(&orders()).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_pagination_is_capped_and_idempotent() {
    let names: Vec<String> = (0..5).map(|i| format!("p{i}")).collect();
    let refs: Vec<&str> = names.iter().map(String::as_str).collect();
    let planner = PartitionSplitPlanner::new(StaticCatalog::new(&refs)).with_max_splits_per_request(2);

    let first = planner.plan_splits(&plan_request(orders())).await.unwrap();
    assert_eq!(first.splits.len(), 2);
    let token = first.continuation.clone().unwrap();

    let request = plan_request(orders()).with_continuation(Some(token));
    let second = planner.plan_splits(&request).await.unwrap();
    let again = planner.plan_splits(&request).await.unwrap();
    assert_eq!(second, again);
    assert_eq!(second.splits[0].property(properties::PARTITION_NAME), Some("p2"));

    let last = planner
        .plan_splits(&plan_request(orders()).with_continuation(second.continuation.clone()))
        .await
        .unwrap();
    assert_eq!(last.splits.len(), 1);
    assert!(last.is_last());

    let bad = plan_request(orders()).with_continuation(Some(ContinuationToken::new("not-a-number")));
    assert_eq!(planner.plan_splits(&bad).await.unwrap_err().code(), ErrorCode::MalformedRequest);
}

struct FixedStats(Option<KeyStats>);

#[async_trait]
impl KeyStatistics for FixedStats {
    async fn key_stats(&self, _table: &TableName) -> Result<Option<KeyStats>> {
        Ok(self.0.clone())
    }
}

#[tokio::test]
async fn test_range_splits_compile_to_bucket_restrictions() {
    let stats = KeyStats { column: "id".to_string(), min: 0, max: 199, row_count: 2000 };
    let planner = RangeSplitPlanner::new(FixedStats(Some(stats)), 1000, 64);
    let batch = planner.plan_splits(&plan_request(orders())).await.unwrap();
    assert_eq!(batch.splits.len(), 2);

    let compiler = SqlCompiler::new(PostgresDialect);
    let columns = vec![Column::new("id", DataType::Int64)];
    let first = compiler.compile(&orders(), &columns, &Constraints::new(), &batch.splits[0]).unwrap();
    let second = compiler.compile(&orders(), &columns, &Constraints::new(), &batch.splits[1]).unwrap();
    assert!(first.query.ends_with("WHERE ((\"id\" >= 0 AND \"id\" < 100) OR \"id\" IS NULL)"));
    assert!(second.query.ends_with("WHERE (\"id\" >= 100 AND \"id\" < 200)"));
    assert!(first.params.is_empty());
}

#[tokio::test]
async fn test_range_planner_without_statistics_scans_once() {
    let planner = RangeSplitPlanner::new(FixedStats(None), 1000, 64);
    let batch = planner.plan_splits(&plan_request(orders())).await.unwrap();
    assert_eq!(batch.splits.len(), 1);
    assert!(batch.splits[0].properties().is_empty());
}

#[derive(Default)]
struct MemoryExportStore {
    exports: Arc<Mutex<Vec<String>>>,
    objects: Vec<String>,
}

#[async_trait]
impl ExportStore for MemoryExportStore {
    async fn export(&self, query: &CompiledQuery<String>, spill: &SpillLocation) -> Result<ExportHandle> {
        self.exports.lock().unwrap().push(query.query.clone());
        Ok(ExportHandle { location: format!("{}/{}/export", spill.bucket, spill.prefix) })
    }

    async fn list_objects(&self, _location: &str, cursor: Option<&str>, max_objects: usize) -> Result<ObjectPage> {
        let start: usize = cursor.map(|c| c.parse().unwrap()).unwrap_or(0);
        let end = (start + max_objects).min(self.objects.len());
        Ok(ObjectPage {
            objects: self.objects[start..end].to_vec(),
            next_cursor: (end < self.objects.len()).then(|| end.to_string()),
        })
    }
}

#[tokio::test]
async fn test_export_runs_once_across_continuations() {
    let store = MemoryExportStore {
        objects: (0..3).map(|i| format!("part-{i}.csv")).collect(),
        ..Default::default()
    };
    let exports = store.exports.clone();
    let planner = ExportSplitPlanner::new(store, SqlCompiler::new(PostgresDialect)).with_max_splits_per_request(2);
    let request = plan_request(orders()).with_columns(vec![Column::new("id", DataType::Int64)]);

    let first = planner.plan_splits(&request).await.unwrap();
    assert_eq!(first.splits.len(), 2);
    assert_eq!(first.splits[0].property(properties::EXPORT_OBJECT), Some("part-0.csv"));
    assert_eq!(first.splits[0].property(properties::EXPORT_LOCATION), Some("spill/q-1/export"));

    let second = planner.plan_splits(&request.clone().with_continuation(first.continuation.clone())).await.unwrap();
    assert_eq!(second.splits.len(), 1);
    assert!(second.is_last());

    let exported = exports.lock().unwrap().clone();
    assert_eq!(exported, vec!["SELECT \"id\" FROM \"sales\".\"orders\"".to_string()]);
}

/// Each exported object holds the ids `object_index * 10 ..+ 2`.
struct NumberedObjects {
    reads: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl ObjectReader for NumberedObjects {
    async fn read_object(&self, location: &str, object: &str) -> Result<Vec<SqlRow>> {
        self.reads.lock().unwrap().push(format!("{location}/{object}"));
        let index: i64 = object.trim_start_matches("part-").trim_end_matches(".csv").parse().unwrap();
        Ok((0..2).map(|i| SqlRow::new().with("id", SqlValue::BigInt(index * 10 + i))).collect())
    }
}

#[tokio::test]
async fn test_export_splits_read_disjoint_objects() {
    let store = MemoryExportStore { objects: vec!["part-0.csv".to_string(), "part-1.csv".to_string()], ..Default::default() };
    let reads = Arc::new(Mutex::new(Vec::new()));
    let connector = export_connector(
        store,
        PostgresDialect,
        NumberedObjects { reads: reads.clone() },
        ReadOptions::default(),
    );
    let columns = vec![Column::new("id", DataType::Int64)];
    let batch = connector.get_splits(&plan_request(orders()).with_columns(columns.clone())).await.unwrap();
    assert_eq!(batch.splits.len(), 2);

    let mut sink: Vec<RecordBatch> = Vec::new();
    for split in &batch.splits {
        let request = ReadRequest::new(orders(), columns.clone(), Constraints::new(), split.clone());
        let outcome = connector.read_split(&request, &|| true, &mut sink).await.unwrap();
        assert_eq!(outcome.rows_emitted, 2);
    }

    assert_eq!(
        reads.lock().unwrap().clone(),
        vec!["spill/q-1/export/part-0.csv".to_string(), "spill/q-1/export/part-1.csv".to_string()]
    );
    let ids: Vec<i64> = sink
        .iter()
        .flat_map(|b| b.column(0).as_any().downcast_ref::<Int64Array>().unwrap().values().to_vec())
        .collect();
    assert_eq!(ids, vec![0, 1, 10, 11]);
    assert_eq!(connector.name(), "postgres-export");
}

#[tokio::test]
async fn test_export_split_through_sql_is_rejected() {
    let store = MemoryExportStore { objects: vec!["part-0.csv".to_string()], ..Default::default() };
    let planner = ExportSplitPlanner::new(store, SqlCompiler::new(PostgresDialect));
    let columns = vec![Column::new("id", DataType::Int64)];
    let batch = planner.plan_splits(&plan_request(orders()).with_columns(columns.clone())).await.unwrap();

    let err = SqlCompiler::new(PostgresDialect)
        .compile(&orders(), &columns, &Constraints::new(), &batch.splits[0])
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::NotSupported);
}

#[tokio::test]
async fn test_export_requires_columns() {
    let planner = ExportSplitPlanner::new(MemoryExportStore::default(), SqlCompiler::new(PostgresDialect));
    let err = planner.plan_splits(&plan_request(orders())).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::MalformedRequest);
}

struct RecordingDriver {
    rows: Vec<SqlRow>,
    queries: Arc<Mutex<Vec<(String, usize)>>>,
}

#[async_trait]
impl QueryExecutor for RecordingDriver {
    type Query = String;
    type Record = SqlRow;

    async fn execute(
        &self,
        query: &CompiledQuery<String>,
        _split: &Split,
    ) -> Result<Box<dyn RecordCursor<Record = SqlRow>>> {
        self.queries.lock().unwrap().push((query.query.clone(), query.params.len()));
        Ok(Box::new(VecCursor::new(self.rows.clone(), 2)))
    }
}

#[tokio::test]
async fn test_end_to_end_read() {
    let queries = Arc::new(Mutex::new(Vec::new()));
    let driver = RecordingDriver {
        rows: (1..=3)
            .map(|i| SqlRow::new().with("status", SqlValue::Text("active".into())).with("age", SqlValue::Int(20 + i)))
            .collect(),
        queries: queries.clone(),
    };
    let connector = sql_connector(
        PartitionSplitPlanner::new(StaticCatalog::new(&[])),
        PostgresDialect,
        driver,
        ReadOptions::default(),
    );
    let columns = vec![Column::new("status", DataType::Utf8), Column::new("age", DataType::Int32)];
    let constraints = Constraints::new()
        .with_constraint("status", ValueSet::of_values([Value::from("active"), Value::from("pending")]));

    let splits = connector.get_splits(&plan_request(orders())).await.unwrap();
    let request = ReadRequest::new(orders(), columns, constraints, splits.splits[0].clone());
    let mut sink: Vec<RecordBatch> = Vec::new();
    let outcome = connector.read_split(&request, &|| true, &mut sink).await.unwrap();

    assert_eq!(outcome.state, ScanState::Done);
    assert_eq!(outcome.rows_emitted, 3);
    assert_eq!(sink.len(), 1);
    let recorded = queries.lock().unwrap().clone();
    assert_eq!(
        recorded,
        vec![("SELECT \"status\", \"age\" FROM \"sales\".\"orders\" WHERE (\"status\" IN (?,?))".to_string(), 2)]
    );

    let explained = connector.explain(&request).unwrap();
    assert_eq!(explained.query, recorded[0].0);
    assert_eq!(connector.name(), "postgres");
}
