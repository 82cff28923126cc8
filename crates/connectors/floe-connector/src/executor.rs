use crate::compiler::CompiledQuery;
use crate::split::Split;
use async_trait::async_trait;
use floe_common::Result;
use std::collections::VecDeque;

/// A backend result set read one page at a time.
///
/// `close` must be called exactly once whatever happened to the scan; the
/// orchestrator guarantees it.
#[async_trait]
pub trait RecordCursor: Send {
    type Record: Send;

    /// The next page of records, or `None` once the result is exhausted.
    async fn next_page(&mut self) -> Result<Option<Vec<Self::Record>>>;

    async fn close(&mut self) -> Result<()>;
}

/// The backend driver.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    type Query: Send + Sync;
    type Record: Send;

    async fn execute(
        &self,
        query: &CompiledQuery<Self::Query>,
        split: &Split,
    ) -> Result<Box<dyn RecordCursor<Record = Self::Record>>>;
}

/// Cursor over a result the backend returned in one response, handed out in
/// pages of `page_size` records.
pub struct VecCursor<R> {
    records: VecDeque<R>,
    page_size: usize,
    closed: bool,
}

impl<R> VecCursor<R> {
    pub fn new(records: Vec<R>, page_size: usize) -> Self {
        Self { records: records.into(), page_size: page_size.max(1), closed: false }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

#[async_trait]
impl<R: Send> RecordCursor for VecCursor<R> {
    type Record = R;

    async fn next_page(&mut self) -> Result<Option<Vec<R>>> {
        if self.closed || self.records.is_empty() {
            return Ok(None);
        }
        let take = self.page_size.min(self.records.len());
        Ok(Some(self.records.drain(..take).collect()))
    }

    async fn close(&mut self) -> Result<()> {
        self.closed = true;
        self.records.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_vec_cursor_pages() {
        let mut cursor = VecCursor::new(vec![1, 2, 3, 4, 5], 2);
        assert_eq!(cursor.next_page().await.unwrap(), Some(vec![1, 2]));
        assert_eq!(cursor.next_page().await.unwrap(), Some(vec![3, 4]));
        assert_eq!(cursor.next_page().await.unwrap(), Some(vec![5]));
        assert_eq!(cursor.next_page().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_vec_cursor_stops_after_close() {
        let mut cursor = VecCursor::new(vec![1, 2, 3], 1);
        cursor.close().await.unwrap();
        assert!(cursor.is_closed());
        assert_eq!(cursor.next_page().await.unwrap(), None);
    }
}
