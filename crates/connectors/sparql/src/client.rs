//! SELECT execution against a SPARQL endpoint.

use crate::binding::BindingSet;
use crate::compiler::SparqlQuery;
use async_trait::async_trait;
use floe_common::Result;
use floe_connector::{CompiledQuery, QueryExecutor, RecordCursor, Split, VecCursor};

/// Runs a query and returns every solution. Endpoints answer in one response,
/// so paging happens locally.
#[async_trait]
pub trait SparqlClient: Send + Sync {
    async fn select(&self, query: &str, database: Option<&str>) -> Result<Vec<BindingSet>>;
}

pub struct SparqlExecutor<C> {
    client: C,
    page_size: usize,
}

impl<C: SparqlClient> SparqlExecutor<C> {
    pub fn new(client: C, page_size: usize) -> Self {
        Self { client, page_size }
    }
}

#[async_trait]
impl<C: SparqlClient> QueryExecutor for SparqlExecutor<C> {
    type Query = SparqlQuery;
    type Record = BindingSet;

    async fn execute(
        &self,
        query: &CompiledQuery<SparqlQuery>,
        _split: &Split,
    ) -> Result<Box<dyn RecordCursor<Record = BindingSet>>> {
        let solutions = self.client.select(&query.query.text, query.query.database.as_deref()).await?;
        tracing::debug!(solutions = solutions.len(), "sparql select returned");
        Ok(Box::new(VecCursor::new(solutions, self.page_size)))
    }
}
