use arrow::array::{Array, Int64Array, StringArray};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use floe_common::{Column, DataType, Result, TableName};
use floe_connector::{
    Connector, Constraints, PassThrough, PlanRequest, ReadOptions, ReadRequest, ScanState, SpillLocation, Value,
    ValueSet,
};
use floe_connector_search::request::{INDEX, SHARD};
use floe_connector_search::{
    search_connector, IndexCatalog, SearchClient, SearchHit, SearchOptions, SearchPage, SearchRequest,
};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct Cluster {
    lookups: Arc<AtomicUsize>,
}

#[async_trait]
impl IndexCatalog for Cluster {
    async fn resolve_alias(&self, alias: &str) -> Result<Vec<String>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(match alias {
            "orders" => vec!["orders-2024".to_string()],
            _ => Vec::new(),
        })
    }

    async fn list_indices(&self) -> Result<Vec<String>> {
        Ok(vec!["orders-2024".to_string()])
    }

    async fn shards(&self, _index: &str) -> Result<Vec<u32>> {
        Ok(vec![0, 1])
    }
}

/// Serves `hits` in pages of `page` hits and records every request.
struct Backend {
    hits: Vec<SearchHit>,
    page: usize,
    served: Mutex<usize>,
    requests: Mutex<Vec<SearchRequest>>,
    cleared: Mutex<Vec<String>>,
}

impl Backend {
    fn new(hits: Vec<SearchHit>, page: usize) -> Self {
        Self { hits, page, served: Mutex::new(0), requests: Mutex::default(), cleared: Mutex::default() }
    }

    fn next_page(&self) -> SearchPage {
        let mut served = self.served.lock().unwrap();
        let end = (*served + self.page).min(self.hits.len());
        let hits = self.hits[*served..end].to_vec();
        *served = end;
        SearchPage::new(hits, Some("scroll-1".to_string()))
    }
}

#[async_trait]
impl SearchClient for Backend {
    async fn search(&self, request: &SearchRequest, _scroll_ttl: &str) -> Result<SearchPage> {
        self.requests.lock().unwrap().push(request.clone());
        Ok(self.next_page())
    }

    async fn scroll(&self, _scroll_id: &str, _scroll_ttl: &str) -> Result<SearchPage> {
        Ok(self.next_page())
    }

    async fn clear_scroll(&self, scroll_id: &str) -> Result<()> {
        self.cleared.lock().unwrap().push(scroll_id.to_string());
        Ok(())
    }
}

fn order(id: &str, qty: i64, status: &str) -> SearchHit {
    SearchHit::new("orders-2024", id, json!({"qty": qty, "status": status, "customer": {"name": "ada"}}))
}

fn orders() -> TableName {
    TableName::new("default", "orders")
}

fn options(page_size: usize) -> SearchOptions {
    SearchOptions { page_size, ..SearchOptions::default() }
}

#[tokio::test]
async fn test_shard_scan_end_to_end() {
    let backend = Arc::new(Backend::new(
        vec![order("o-1", 3, "shipped"), order("o-2", 5, "shipped"), order("o-3", 1, "open")],
        2,
    ));
    let cluster = Cluster::default();
    let lookups = Arc::clone(&cluster.lookups);
    let connector = search_connector(cluster, Arc::clone(&backend), &options(100), ReadOptions::default());

    let plan = PlanRequest::new(orders(), Constraints::new(), SpillLocation::new("spill", "q-1"));
    let batch = connector.get_splits(&plan).await.unwrap();
    assert_eq!(batch.splits.len(), 2);
    assert_eq!(batch.splits[1].property(INDEX), Some("orders-2024"));
    assert_eq!(batch.splits[1].property(SHARD), Some("1"));
    connector.get_splits(&plan).await.unwrap();
    assert_eq!(lookups.load(Ordering::SeqCst), 1);

    let columns = vec![
        Column::new("_id", DataType::Utf8),
        Column::new("qty", DataType::Int64),
        Column::new("customer.name", DataType::Utf8),
    ];
    let wanted = [Value::Int64(3), Value::Int64(5), Value::Int64(1)];
    let constraints = Constraints::new().with_constraint("qty", ValueSet::of_values(wanted));
    let request = ReadRequest::new(orders(), columns, constraints, batch.splits[1].clone());
    let mut sink: Vec<RecordBatch> = Vec::new();
    let outcome = connector.read_split(&request, &|| true, &mut sink).await.unwrap();

    assert_eq!(outcome.state, ScanState::Done);
    assert_eq!(outcome.rows_emitted, 3);
    let sent = backend.requests.lock().unwrap()[0].clone();
    assert_eq!(sent.preference().as_deref(), Some("_shards:1"));
    assert_eq!(sent.body["query"]["bool"]["filter"], json!([{"terms": {"qty": [3, 5, 1]}}]));
    assert_eq!(*backend.cleared.lock().unwrap(), vec!["scroll-1".to_string()]);

    let ids = sink[0].column(0).as_any().downcast_ref::<StringArray>().unwrap();
    assert_eq!(ids.value(0), "o-1");
    let qty = sink[0].column(1).as_any().downcast_ref::<Int64Array>().unwrap();
    assert_eq!(qty.value(1), 5);
    let names = sink[0].column(2).as_any().downcast_ref::<StringArray>().unwrap();
    assert!(!names.is_null(2));
}

#[tokio::test]
async fn test_limit_larger_than_page_is_applied_after_reading() {
    let hits = (0..5).map(|n| order(&format!("o-{n}"), n, "open")).collect();
    let backend = Arc::new(Backend::new(hits, 2));
    let connector = search_connector(Cluster::default(), Arc::clone(&backend), &options(2), ReadOptions::default());

    let columns = vec![Column::new("qty", DataType::Int64)];
    let constraints = Constraints::new().with_limit(3);
    let plan = PlanRequest::new(orders(), Constraints::new(), SpillLocation::default());
    let split = connector.get_splits(&plan).await.unwrap().splits[0].clone();
    let request = ReadRequest::new(orders(), columns, constraints, split);

    let explained = connector.explain(&request).unwrap();
    assert!(!explained.limit_pushed_down);

    let mut sink: Vec<RecordBatch> = Vec::new();
    let outcome = connector.read_split(&request, &|| true, &mut sink).await.unwrap();
    assert_eq!(outcome.rows_emitted, 3);
    assert_eq!(backend.requests.lock().unwrap()[0].body["size"], json!(2));
    assert_eq!(backend.cleared.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_pass_through_searches_named_index() {
    let backend = Arc::new(Backend::new(vec![order("o-9", 9, "open")], 10));
    let cluster = Cluster::default();
    let connector = search_connector(cluster, Arc::clone(&backend), &options(100), ReadOptions::default());

    let pass_through = PassThrough::default()
        .with_argument("index", "orders-*")
        .with_argument("query", r#"{"query": {"match_all": {}}}"#);
    let constraints = Constraints::new().with_pass_through(pass_through);
    let batch = connector
        .get_splits(&PlanRequest::new(orders(), constraints.clone(), SpillLocation::default()))
        .await
        .unwrap();
    assert_eq!(batch.splits.len(), 1);
    assert_eq!(batch.splits[0].property(INDEX), None);

    let columns = vec![Column::new("status", DataType::Utf8)];
    let read = ReadRequest::new(orders(), columns, constraints, batch.splits[0].clone());
    let mut sink: Vec<RecordBatch> = Vec::new();
    let outcome = connector.read_split(&read, &|| true, &mut sink).await.unwrap();
    assert_eq!(outcome.rows_emitted, 1);
    let sent = backend.requests.lock().unwrap()[0].clone();
    assert_eq!(sent.index, "orders-*");
    assert_eq!(sent.to_string(), r#"POST /orders-*/_search {"query":{"match_all":{}}}"#);
}
