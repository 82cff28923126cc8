//! Scroll-based reads against a search cluster.

use crate::document::SearchHit;
use crate::request::SearchRequest;
use async_trait::async_trait;
use floe_common::Result;
use floe_connector::{CompiledQuery, QueryExecutor, RecordCursor, Split};
use std::sync::Arc;

pub const DEFAULT_SCROLL_TTL: &str = "1m";

/// One page of hits plus the scroll context to continue from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchPage {
    pub hits: Vec<SearchHit>,
    pub scroll_id: Option<String>,
}

impl SearchPage {
    pub fn new(hits: Vec<SearchHit>, scroll_id: Option<String>) -> Self {
        Self { hits, scroll_id }
    }
}

#[async_trait]
pub trait SearchClient: Send + Sync {
    /// Runs `request`, keeping a scroll context alive for `scroll_ttl`.
    async fn search(&self, request: &SearchRequest, scroll_ttl: &str) -> Result<SearchPage>;
    async fn scroll(&self, scroll_id: &str, scroll_ttl: &str) -> Result<SearchPage>;
    async fn clear_scroll(&self, scroll_id: &str) -> Result<()>;
}

enum ScrollState {
    Pending(SearchRequest),
    Scrolling,
    Exhausted,
}

/// Hands out the first search page, then scrolls until an empty page. The
/// scroll context is released on close.
pub struct ScrollCursor<C> {
    client: Arc<C>,
    state: ScrollState,
    scroll_id: Option<String>,
    scroll_ttl: String,
    /// The request size already holds the whole pushed-down limit.
    single_page: bool,
}

impl<C: SearchClient> ScrollCursor<C> {
    pub fn new(client: Arc<C>, request: SearchRequest, scroll_ttl: impl Into<String>, single_page: bool) -> Self {
        Self { client, state: ScrollState::Pending(request), scroll_id: None, scroll_ttl: scroll_ttl.into(), single_page }
    }

    fn accept(&mut self, page: SearchPage) -> Option<Vec<SearchHit>> {
        if page.scroll_id.is_some() {
            self.scroll_id = page.scroll_id;
        }
        if page.hits.is_empty() {
            self.state = ScrollState::Exhausted;
            return None;
        }
        self.state = if self.single_page || self.scroll_id.is_none() {
            ScrollState::Exhausted
        } else {
            ScrollState::Scrolling
        };
        Some(page.hits)
    }
}

#[async_trait]
impl<C: SearchClient + 'static> RecordCursor for ScrollCursor<C> {
    type Record = SearchHit;

    async fn next_page(&mut self) -> Result<Option<Vec<SearchHit>>> {
        match std::mem::replace(&mut self.state, ScrollState::Exhausted) {
            ScrollState::Pending(request) => {
                let page = self.client.search(&request, &self.scroll_ttl).await?;
                Ok(self.accept(page))
            }
            ScrollState::Scrolling => {
                let Some(scroll_id) = self.scroll_id.clone() else {
                    return Ok(None);
                };
                let page = self.client.scroll(&scroll_id, &self.scroll_ttl).await?;
                Ok(self.accept(page))
            }
            ScrollState::Exhausted => Ok(None),
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.state = ScrollState::Exhausted;
        match self.scroll_id.take() {
            Some(scroll_id) => {
                tracing::debug!(%scroll_id, "clearing scroll context");
                self.client.clear_scroll(&scroll_id).await
            }
            None => Ok(()),
        }
    }
}

pub struct SearchExecutor<C> {
    client: Arc<C>,
    scroll_ttl: String,
}

impl<C: SearchClient> SearchExecutor<C> {
    pub fn new(client: Arc<C>, scroll_ttl: impl Into<String>) -> Self {
        Self { client, scroll_ttl: scroll_ttl.into() }
    }
}

#[async_trait]
impl<C: SearchClient + 'static> QueryExecutor for SearchExecutor<C> {
    type Query = SearchRequest;
    type Record = SearchHit;

    async fn execute(
        &self,
        query: &CompiledQuery<SearchRequest>,
        _split: &Split,
    ) -> Result<Box<dyn RecordCursor<Record = SearchHit>>> {
        tracing::debug!(request = %query.query, "opening scroll");
        Ok(Box::new(ScrollCursor::new(
            Arc::clone(&self.client),
            query.query.clone(),
            self.scroll_ttl.clone(),
            query.limit_pushed_down,
        )))
    }
}
