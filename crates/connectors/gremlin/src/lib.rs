//! Property-graph connector for Floe.
//!
//! Tables map onto a vertex or edge label. Constraints compile into a
//! Gremlin [`Traversal`] rendered as Groovy text with escaped literals, and
//! the returned element maps are materialized with structural keys (`id`,
//! `label`, `in`, `out`) resolved to their tokens.

pub mod client;
pub mod compiler;
pub mod element;
pub mod keys;
pub mod planner;
pub mod traversal;

pub use client::{GremlinClient, GremlinExecutor};
pub use compiler::{GremlinCompiler, GremlinQuery};
pub use element::{GraphElement, GraphElementMaterializer, GraphValue};
pub use keys::{ComponentType, SpecialKey};
pub use planner::{GraphCatalog, GraphSplitPlanner, GraphTable};
pub use traversal::{ElementKind, Traversal};

use floe_connector::{QueryOrchestrator, ReadOptions, ScanConnector};

pub type GremlinConnector<C, G> =
    ScanConnector<GraphSplitPlanner<C>, GremlinCompiler, GremlinExecutor<G>, GraphElementMaterializer>;

pub fn gremlin_connector<C, G>(catalog: C, client: G, options: ReadOptions) -> GremlinConnector<C, G>
where
    C: GraphCatalog,
    G: GremlinClient,
{
    let executor = GremlinExecutor::new(client, options.batch_size);
    let orchestrator = QueryOrchestrator::new(GremlinCompiler::new(), executor, GraphElementMaterializer, options);
    ScanConnector::new("gremlin", GraphSplitPlanner::new(catalog), orchestrator)
}
