//! Script submission to a Gremlin server.

use crate::compiler::GremlinQuery;
use crate::element::GraphElement;
use crate::keys::ComponentType;
use async_trait::async_trait;
use floe_common::Result;
use floe_connector::{CompiledQuery, QueryExecutor, RecordCursor, Split, VecCursor};

/// Submits a Groovy script and returns the result as element maps.
///
/// The server answers a script with its whole result, so the client is
/// one-shot; paging happens locally.
#[async_trait]
pub trait GremlinClient: Send + Sync {
    async fn submit(&self, script: &str, database: Option<&str>, shape: ComponentType) -> Result<Vec<GraphElement>>;
}

pub struct GremlinExecutor<C> {
    client: C,
    page_size: usize,
}

impl<C: GremlinClient> GremlinExecutor<C> {
    pub fn new(client: C, page_size: usize) -> Self {
        Self { client, page_size }
    }
}

#[async_trait]
impl<C: GremlinClient> QueryExecutor for GremlinExecutor<C> {
    type Query = GremlinQuery;
    type Record = GraphElement;

    async fn execute(
        &self,
        query: &CompiledQuery<GremlinQuery>,
        _split: &Split,
    ) -> Result<Box<dyn RecordCursor<Record = GraphElement>>> {
        let script = query.query.to_string();
        let database = match &query.query {
            GremlinQuery::Script { database, .. } => Some(database.as_str()),
            GremlinQuery::Traversal(_) => None,
        };
        let elements = self.client.submit(&script, database, query.query.component_type()).await?;
        tracing::debug!(elements = elements.len(), "gremlin script returned");
        Ok(Box::new(VecCursor::new(elements, self.page_size)))
    }
}
