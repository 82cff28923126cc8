//! Sequencing of one planning call or one split read.
//!
//! A read compiles the constraints, opens a cursor, and alternates between
//! fetching a page and materializing it into Arrow batches handed to a
//! [`RowSink`]. Cancellation is cooperative: the injected
//! [`QueryStatusChecker`] is polled once per page and before every emitted
//! batch. The cursor is closed on every exit path.

use crate::batch::RowBatchBuilder;
use crate::compiler::{CompiledQuery, PredicateCompiler};
use crate::constraints::Constraints;
use crate::executor::{QueryExecutor, RecordCursor};
use crate::materializer::RowMaterializer;
use crate::planner::{PlanRequest, SplitPlanner};
use crate::split::{Split, SplitBatch};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use floe_common::{CasePolicy, Column, Error, Result, TableName};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanState {
    #[default]
    NotStarted,
    Planning,
    Compiling,
    Executing,
    Materializing,
    Done,
    Cancelled,
    Failed,
}

impl ScanState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ScanState::Done | ScanState::Cancelled | ScanState::Failed)
    }

    pub fn can_transition_to(&self, next: ScanState) -> bool {
        use ScanState::*;
        matches!(
            (self, next),
            (NotStarted, Planning)
                | (NotStarted, Compiling)
                | (Planning, Done)
                | (Planning, Failed)
                | (Compiling, Executing)
                | (Compiling, Failed)
                | (Executing, Materializing)
                | (Executing, Done)
                | (Executing, Cancelled)
                | (Executing, Failed)
                | (Materializing, Executing)
                | (Materializing, Done)
                | (Materializing, Cancelled)
                | (Materializing, Failed)
        )
    }
}

impl fmt::Display for ScanState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScanState::NotStarted => "not_started",
            ScanState::Planning => "planning",
            ScanState::Compiling => "compiling",
            ScanState::Executing => "executing",
            ScanState::Materializing => "materializing",
            ScanState::Done => "done",
            ScanState::Cancelled => "cancelled",
            ScanState::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Default)]
pub struct ScanStateMachine {
    state: ScanState,
}

impl ScanStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    pub fn transition(&mut self, next: ScanState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(Error::Internal(format!("illegal scan transition {} -> {}", self.state, next)));
        }
        debug!(from = %self.state, to = %next, "scan state transition");
        self.state = next;
        Ok(())
    }

    /// Moves to `Failed` when that is legal from the current state.
    pub fn fail(&mut self) {
        if self.state.can_transition_to(ScanState::Failed) {
            debug!(from = %self.state, "scan failed");
            self.state = ScanState::Failed;
        }
    }
}

/// Liveness check for the query a scan belongs to.
pub trait QueryStatusChecker: Send + Sync {
    fn is_query_running(&self) -> bool;
}

impl<F> QueryStatusChecker for F
where
    F: Fn() -> bool + Send + Sync,
{
    fn is_query_running(&self) -> bool {
        self()
    }
}

/// Output buffer owned by the host runtime.
#[async_trait]
pub trait RowSink: Send {
    async fn emit(&mut self, batch: RecordBatch) -> Result<()>;
}

#[async_trait]
impl RowSink for Vec<RecordBatch> {
    async fn emit(&mut self, batch: RecordBatch) -> Result<()> {
        self.push(batch);
        Ok(())
    }
}

/// What to do with a row whose value does not match its column type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MismatchPolicy {
    #[default]
    Fail,
    SkipRow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadOptions {
    pub batch_size: usize,
    pub case_policy: CasePolicy,
    pub mismatch_policy: MismatchPolicy,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self { batch_size: 1024, case_policy: CasePolicy::default(), mismatch_policy: MismatchPolicy::default() }
    }
}

/// Everything needed to read one split.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadRequest {
    pub table: TableName,
    pub columns: Vec<Column>,
    #[serde(default)]
    pub constraints: Constraints,
    #[serde(default)]
    pub split: Split,
}

impl ReadRequest {
    pub fn new(table: TableName, columns: Vec<Column>, constraints: Constraints, split: Split) -> Self {
        Self { table, columns, constraints, split }
    }

    /// Columns the rows are materialized into. A pass-through query that
    /// declares its own output columns replaces the requested ones.
    pub fn output_columns(&self) -> &[Column] {
        match &self.constraints.pass_through {
            Some(pass_through) if !pass_through.output_columns.is_empty() => &pass_through.output_columns,
            _ => &self.columns,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScanOutcome {
    pub state: ScanState,
    pub rows_emitted: u64,
    pub rows_skipped: u64,
}

/// Runs a planner inside the planning states.
pub async fn plan_splits<P>(planner: &P, request: &PlanRequest) -> Result<SplitBatch>
where
    P: SplitPlanner + ?Sized,
{
    let mut machine = ScanStateMachine::new();
    machine.transition(ScanState::Planning)?;
    match planner.plan_splits(request).await {
        Ok(batch) => {
            machine.transition(ScanState::Done)?;
            debug!(
                table = %request.table,
                splits = batch.splits.len(),
                last = batch.is_last(),
                "planned splits"
            );
            Ok(batch)
        }
        Err(e) => {
            machine.fail();
            Err(e)
        }
    }
}

pub struct QueryOrchestrator<C, E, M> {
    compiler: C,
    executor: E,
    materializer: M,
    options: ReadOptions,
}

impl<C, E, M> QueryOrchestrator<C, E, M>
where
    C: PredicateCompiler,
    E: QueryExecutor<Query = C::Query, Record = M::Record>,
    M: RowMaterializer,
{
    pub fn new(compiler: C, executor: E, materializer: M, options: ReadOptions) -> Self {
        Self { compiler, executor, materializer, options }
    }

    pub fn compiler(&self) -> &C {
        &self.compiler
    }

    pub fn options(&self) -> &ReadOptions {
        &self.options
    }

    pub async fn read_split(
        &self,
        request: &ReadRequest,
        status: &dyn QueryStatusChecker,
        sink: &mut dyn RowSink,
    ) -> Result<ScanOutcome> {
        let mut machine = ScanStateMachine::new();
        machine.transition(ScanState::Compiling)?;
        let compiled = match self.compiler.compile(
            &request.table,
            &request.columns,
            &request.constraints,
            &request.split,
        ) {
            Ok(compiled) => compiled,
            Err(e) => {
                machine.fail();
                return Err(e);
            }
        };
        debug!(
            table = %request.table,
            params = compiled.params.len(),
            limit_pushed_down = compiled.limit_pushed_down,
            pass_through = compiled.pass_through,
            "compiled split query"
        );

        machine.transition(ScanState::Executing)?;
        let mut cursor = match self.executor.execute(&compiled, &request.split).await {
            Ok(cursor) => cursor,
            Err(e) => {
                machine.fail();
                return Err(e);
            }
        };

        let result = self.drain(&mut machine, cursor.as_mut(), &compiled, request, status, sink).await;
        let closed = cursor.close().await;

        match (result, closed) {
            (Ok(outcome), Ok(())) => Ok(outcome),
            (Ok(outcome), Err(e)) => {
                warn!(table = %request.table, error = %e, "failed to release cursor after scan");
                Ok(outcome)
            }
            (Err(e), closed) => {
                if let Err(close_err) = closed {
                    warn!(table = %request.table, error = %close_err, "failed to release cursor after error");
                }
                machine.fail();
                Err(e)
            }
        }
    }

    async fn drain(
        &self,
        machine: &mut ScanStateMachine,
        cursor: &mut dyn RecordCursor<Record = M::Record>,
        compiled: &CompiledQuery<C::Query>,
        request: &ReadRequest,
        status: &dyn QueryStatusChecker,
        sink: &mut dyn RowSink,
    ) -> Result<ScanOutcome> {
        let columns = request.output_columns();
        let limit = request.constraints.limit;
        let batch_size = self.options.batch_size.max(1);
        let mut builder = RowBatchBuilder::new(columns.to_vec());
        let mut outcome = ScanOutcome { state: ScanState::Executing, rows_emitted: 0, rows_skipped: 0 };
        let limit_reached = |outcome: &ScanOutcome, buffered: usize| {
            limit.is_some_and(|limit| outcome.rows_emitted + buffered as u64 >= limit)
        };
        if !compiled.limit_pushed_down && limit.is_some() {
            debug!(table = %request.table, limit, "enforcing limit after materialization");
        }

        'pages: while !limit_reached(&outcome, builder.len()) {
            if !status.is_query_running() {
                return self.cancel(machine, &mut builder, outcome);
            }
            let Some(records) = cursor.next_page().await? else {
                break;
            };
            machine.transition(ScanState::Materializing)?;

            for record in records {
                if limit_reached(&outcome, builder.len()) {
                    break 'pages;
                }
                match self.materializer.materialize(&record, columns, self.options.case_policy) {
                    Ok(row) => builder.push(row)?,
                    Err(e @ Error::TypeMismatch { .. }) if self.options.mismatch_policy == MismatchPolicy::SkipRow => {
                        warn!(table = %request.table, error = %e, "skipping row");
                        outcome.rows_skipped += 1;
                        continue;
                    }
                    Err(e) => return Err(e),
                }
                if builder.len() >= batch_size {
                    if !status.is_query_running() {
                        return self.cancel(machine, &mut builder, outcome);
                    }
                    outcome.rows_emitted += builder.len() as u64;
                    sink.emit(builder.finish()?).await?;
                }
            }
            machine.transition(ScanState::Executing)?;
        }

        if !builder.is_empty() {
            if !status.is_query_running() {
                return self.cancel(machine, &mut builder, outcome);
            }
            outcome.rows_emitted += builder.len() as u64;
            sink.emit(builder.finish()?).await?;
        }
        machine.transition(ScanState::Done)?;
        outcome.state = ScanState::Done;
        debug!(
            table = %request.table,
            rows_emitted = outcome.rows_emitted,
            rows_skipped = outcome.rows_skipped,
            "split read complete"
        );
        Ok(outcome)
    }

    fn cancel(
        &self,
        machine: &mut ScanStateMachine,
        builder: &mut RowBatchBuilder,
        mut outcome: ScanOutcome,
    ) -> Result<ScanOutcome> {
        debug!(discarded = builder.len(), "query no longer running, stopping scan");
        builder.clear();
        machine.transition(ScanState::Cancelled)?;
        outcome.state = ScanState::Cancelled;
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_table() {
        assert!(ScanState::NotStarted.can_transition_to(ScanState::Planning));
        assert!(ScanState::Executing.can_transition_to(ScanState::Materializing));
        assert!(ScanState::Materializing.can_transition_to(ScanState::Executing));
        assert!(ScanState::Materializing.can_transition_to(ScanState::Cancelled));
        assert!(!ScanState::Compiling.can_transition_to(ScanState::Cancelled));
        assert!(!ScanState::Done.can_transition_to(ScanState::Executing));
        assert!(!ScanState::NotStarted.can_transition_to(ScanState::Failed));
    }

    #[test]
    fn test_illegal_transition_is_internal() {
        let mut machine = ScanStateMachine::new();
        let err = machine.transition(ScanState::Done).unwrap_err();
        assert_eq!(err.code(), floe_common::ErrorCode::Internal);
        assert_eq!(machine.state(), ScanState::NotStarted);
    }

    #[test]
    fn test_fail_only_from_active_states() {
        let mut machine = ScanStateMachine::new();
        machine.fail();
        assert_eq!(machine.state(), ScanState::NotStarted);
        machine.transition(ScanState::Compiling).unwrap();
        machine.fail();
        assert_eq!(machine.state(), ScanState::Failed);
    }

    #[test]
    fn test_closure_status_checker() {
        let checker = || false;
        assert!(!checker.is_query_running());
    }

    #[test]
    fn test_pass_through_output_columns_replace_requested() {
        let mut pass_through = crate::constraints::PassThrough::default().with_argument("query", "SELECT 1");
        pass_through.output_columns = vec![Column::new("one", floe_common::DataType::Int32)];
        let request = ReadRequest::new(
            TableName::new("s", "t"),
            vec![Column::new("a", floe_common::DataType::Utf8)],
            Constraints::new().with_pass_through(pass_through),
            Split::empty(),
        );
        assert_eq!(request.output_columns()[0].name, "one");
    }
}
