//! Connector SPI for Floe.
//!
//! A connector turns an engine-issued [`Constraints`] into a backend-native
//! query, partitions the scan into [`Split`]s, and converts backend records
//! into Arrow batches. The backend-specific pieces plug in through
//! [`PredicateCompiler`], [`SplitPlanner`], [`QueryExecutor`] and
//! [`RowMaterializer`]; [`ScanConnector`] wires them together.

pub mod batch;
pub mod coerce;
pub mod compiler;
pub mod constraints;
pub mod executor;
pub mod materializer;
pub mod orchestrator;
pub mod planner;
pub mod split;
pub mod value;

pub use compiler::{CompiledQuery, Explain, Explained, Param, PredicateCompiler};
pub use constraints::{Bound, Constraints, Marker, OrderByField, PassThrough, Range, SortOrder, ValueSet};
pub use executor::{QueryExecutor, RecordCursor, VecCursor};
pub use materializer::{CanonicalRow, KeyIndex, RowMaterializer};
pub use orchestrator::{
    MismatchPolicy, QueryOrchestrator, QueryStatusChecker, ReadOptions, ReadRequest, RowSink, ScanOutcome, ScanState,
};
pub use planner::{PartitionDescriptor, PlanRequest, SplitPlanner, DEFAULT_MAX_SPLITS_PER_REQUEST};
pub use split::{ContinuationToken, SpillLocation, Split, SplitBatch};
pub use value::Value;

use async_trait::async_trait;
use floe_common::Result;
use std::fmt;

/// The core trait for any Floe data source connector.
#[async_trait]
pub trait Connector: Send + Sync {
    fn name(&self) -> &str;

    /// Returns the next batch of splits for a table.
    async fn get_splits(&self, request: &PlanRequest) -> Result<SplitBatch>;

    /// Reads one split, emitting Arrow batches into `sink`.
    async fn read_split(
        &self,
        request: &ReadRequest,
        status: &dyn QueryStatusChecker,
        sink: &mut dyn RowSink,
    ) -> Result<ScanOutcome>;

    /// Compiles a read request without executing it.
    fn explain(&self, request: &ReadRequest) -> Result<Explained>;
}

/// A [`Connector`] assembled from a planner and the read-side pieces.
pub struct ScanConnector<P, C, E, M> {
    name: String,
    planner: P,
    orchestrator: QueryOrchestrator<C, E, M>,
}

impl<P, C, E, M> ScanConnector<P, C, E, M>
where
    P: SplitPlanner,
    C: PredicateCompiler,
    E: QueryExecutor<Query = C::Query, Record = M::Record>,
    M: RowMaterializer,
{
    pub fn new(name: impl Into<String>, planner: P, orchestrator: QueryOrchestrator<C, E, M>) -> Self {
        Self { name: name.into(), planner, orchestrator }
    }

    pub fn planner(&self) -> &P {
        &self.planner
    }
}

#[async_trait]
impl<P, C, E, M> Connector for ScanConnector<P, C, E, M>
where
    P: SplitPlanner,
    C: PredicateCompiler,
    C::Query: fmt::Display,
    E: QueryExecutor<Query = C::Query, Record = M::Record>,
    M: RowMaterializer,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn get_splits(&self, request: &PlanRequest) -> Result<SplitBatch> {
        orchestrator::plan_splits(&self.planner, request).await
    }

    async fn read_split(
        &self,
        request: &ReadRequest,
        status: &dyn QueryStatusChecker,
        sink: &mut dyn RowSink,
    ) -> Result<ScanOutcome> {
        self.orchestrator.read_split(request, status, sink).await
    }

    fn explain(&self, request: &ReadRequest) -> Result<Explained> {
        self.orchestrator.compiler().explain(&request.table, &request.columns, &request.constraints, &request.split)
    }
}
