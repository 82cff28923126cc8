//! Split execution: one task per split, batches handed over through a
//! bounded channel.

use crate::config::Settings;
use crate::error::WorkerError;
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use floe_common::{Error, Result};
use floe_connector::{Connector, QueryStatusChecker, ReadRequest, RowSink, ScanOutcome};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::Instrument;

/// Shared cancellation switch for one split. Cloning shares the switch.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

impl QueryStatusChecker for CancellationFlag {
    fn is_query_running(&self) -> bool {
        !self.is_cancelled()
    }
}

/// A [`RowSink`] over a bounded channel. A full channel suspends the scan
/// until the consumer catches up.
pub struct ChannelSink {
    sender: mpsc::Sender<RecordBatch>,
}

impl ChannelSink {
    pub fn new(sender: mpsc::Sender<RecordBatch>) -> Self {
        Self { sender }
    }
}

#[async_trait]
impl RowSink for ChannelSink {
    async fn emit(&mut self, batch: RecordBatch) -> Result<()> {
        self.sender.send(batch).await.map_err(|_| Error::Internal("split consumer went away".to_string()))
    }
}

pub struct SplitWorker {
    connector: Arc<dyn Connector>,
    channel_capacity: usize,
}

impl SplitWorker {
    pub fn new(connector: Arc<dyn Connector>, settings: &Settings) -> Self {
        Self::with_capacity(connector, settings.channel_capacity)
    }

    pub fn with_capacity(connector: Arc<dyn Connector>, channel_capacity: usize) -> Self {
        Self { connector, channel_capacity: channel_capacity.max(1) }
    }

    /// Starts reading `request` in its own task.
    pub fn spawn(&self, request: ReadRequest) -> SplitHandle {
        let (sender, receiver) = mpsc::channel(self.channel_capacity);
        let cancel = CancellationFlag::new();
        let connector = Arc::clone(&self.connector);
        let status = cancel.clone();
        let span = tracing::debug_span!("split", connector = connector.name(), table = %request.table);
        let task = tokio::spawn(
            async move {
                let mut sink = ChannelSink::new(sender);
                let outcome = connector.read_split(&request, &status, &mut sink).await;
                match &outcome {
                    Ok(outcome) => tracing::debug!(state = %outcome.state, rows = outcome.rows_emitted, "split finished"),
                    Err(e) => tracing::debug!(error = %e, "split failed"),
                }
                outcome
            }
            .instrument(span),
        );
        SplitHandle { batches: receiver, cancel, task }
    }
}

/// The consumer side of a running split.
pub struct SplitHandle {
    batches: mpsc::Receiver<RecordBatch>,
    cancel: CancellationFlag,
    task: JoinHandle<Result<ScanOutcome>>,
}

impl SplitHandle {
    /// The next batch, or `None` once the split stopped emitting.
    pub async fn next_batch(&mut self) -> Option<RecordBatch> {
        self.batches.recv().await
    }

    /// Asks the scan to stop at its next batch boundary.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation(&self) -> CancellationFlag {
        self.cancel.clone()
    }

    /// Receives every remaining batch, then waits for the outcome.
    pub async fn collect(mut self) -> std::result::Result<(Vec<RecordBatch>, ScanOutcome), WorkerError> {
        let mut batches = Vec::new();
        while let Some(batch) = self.batches.recv().await {
            batches.push(batch);
        }
        let outcome = self.task.await??;
        Ok((batches, outcome))
    }

    /// Waits for the outcome, dropping batches nobody received.
    pub async fn join(mut self) -> std::result::Result<ScanOutcome, WorkerError> {
        while self.batches.recv().await.is_some() {}
        Ok(self.task.await??)
    }
}
