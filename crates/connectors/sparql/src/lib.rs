//! RDF connector for Floe.
//!
//! A table is either a class (instances of one class, one optional triple
//! per column) or a stored SPARQL query. Class-mode tables get filters,
//! ordering and limits pushed into the generated query.

pub mod binding;
pub mod client;
pub mod compiler;
pub mod keys;
pub mod planner;
pub mod term;

pub use binding::{BindingMaterializer, BindingSet};
pub use client::{SparqlClient, SparqlExecutor};
pub use compiler::{SparqlCompiler, SparqlQuery};
pub use keys::QueryMode;
pub use planner::{RdfCatalog, RdfSplitPlanner, RdfTable};
pub use term::RdfTerm;

use floe_connector::{QueryOrchestrator, ReadOptions, ScanConnector};

pub type SparqlConnector<C, S> =
    ScanConnector<RdfSplitPlanner<C>, SparqlCompiler, SparqlExecutor<S>, BindingMaterializer>;

pub fn sparql_connector<C, S>(catalog: C, client: S, options: ReadOptions) -> SparqlConnector<C, S>
where
    C: RdfCatalog,
    S: SparqlClient,
{
    let executor = SparqlExecutor::new(client, options.batch_size);
    let orchestrator = QueryOrchestrator::new(SparqlCompiler::new(), executor, BindingMaterializer, options);
    ScanConnector::new("sparql", RdfSplitPlanner::new(catalog), orchestrator)
}
