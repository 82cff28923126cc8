//! Relational connector for Floe.
//!
//! Compiles constraints into parameterized SQL for PostgreSQL, MySQL or ANSI
//! dialects, plans splits from catalog partitions, key ranges or bulk exports,
//! and materializes [`SqlRow`]s returned by a row-oriented driver.

pub mod compiler;
pub mod dialect;
pub mod export;
pub mod planner;
pub mod properties;
pub mod row;
pub mod types;

pub use compiler::SqlCompiler;
pub use dialect::{AnsiDialect, MySqlDialect, PostgresDialect, SqlDialect};
pub use export::{ExportExecutor, ExportObject, ExportReadCompiler, ObjectReader};
pub use planner::{
    bucket_key_range, ExportHandle, ExportSplitPlanner, ExportStore, KeyRange, KeyStatistics, KeyStats,
    ObjectPage, PartitionCatalog, PartitionSplitPlanner, RangeSplitPlanner,
};
pub use row::{SqlRow, SqlRowMaterializer, SqlValue};
pub use types::map_native_type;

use floe_connector::{QueryExecutor, QueryOrchestrator, ReadOptions, ScanConnector, SplitPlanner};

/// A relational connector over driver `E` speaking dialect `D`.
pub type SqlConnector<P, D, E> = ScanConnector<P, SqlCompiler<D>, E, SqlRowMaterializer>;

pub fn sql_connector<P, D, E>(planner: P, dialect: D, driver: E, options: ReadOptions) -> SqlConnector<P, D, E>
where
    P: SplitPlanner,
    D: SqlDialect,
    E: QueryExecutor<Query = String, Record = SqlRow>,
{
    let name = dialect.name();
    let orchestrator = QueryOrchestrator::new(SqlCompiler::new(dialect), driver, SqlRowMaterializer, options);
    ScanConnector::new(name, planner, orchestrator)
}

/// A relational connector that scans through a bulk export: planning runs
/// the filtered query once into `store`, and each split streams one
/// exported object back through `reader`.
pub type ExportConnector<S, D, R> =
    ScanConnector<ExportSplitPlanner<S, D>, ExportReadCompiler, ExportExecutor<R>, SqlRowMaterializer>;

pub fn export_connector<S, D, R>(store: S, dialect: D, reader: R, options: ReadOptions) -> ExportConnector<S, D, R>
where
    S: ExportStore,
    D: SqlDialect,
    R: ObjectReader,
{
    let name = format!("{}-export", dialect.name());
    let planner = ExportSplitPlanner::new(store, SqlCompiler::new(dialect));
    let executor = ExportExecutor::new(reader, options.batch_size);
    let orchestrator = QueryOrchestrator::new(ExportReadCompiler, executor, SqlRowMaterializer, options);
    ScanConnector::new(name, planner, orchestrator)
}
