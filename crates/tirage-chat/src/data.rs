//! Draw-history collaborators consumed by the pipeline.
//!
//! The traits keep the chat core independent of the storage engine; the
//! `Store*` adapters run the blocking rusqlite calls on the blocking pool.

use std::sync::Arc;

use async_trait::async_trait;

use tirage_core::types::{
    CategoryKind, Comparison, Draw, DrawRef, NumberKind, NumberStats, QueryRows, RankOrder,
    SortKey,
};
use tirage_storage::{ReadOnlyQueries, StatsService};

use crate::error::ChatError;

/// Structured statistics over the draw history.
#[async_trait]
pub trait DrawStats: Send + Sync {
    async fn lookup_number(
        &self,
        number: u32,
        kind: NumberKind,
    ) -> Result<Option<NumberStats>, ChatError>;

    async fn lookup_draw(&self, draw: DrawRef) -> Result<Option<Draw>, ChatError>;

    async fn rank(
        &self,
        sort: SortKey,
        order: RankOrder,
        limit: usize,
        kind: NumberKind,
    ) -> Result<Vec<NumberStats>, ChatError>;

    async fn compare(
        &self,
        first: u32,
        second: u32,
        kind: NumberKind,
    ) -> Result<Option<Comparison>, ChatError>;

    async fn category(
        &self,
        category: CategoryKind,
        kind: NumberKind,
    ) -> Result<Vec<NumberStats>, ChatError>;
}

/// Executes already-validated read-only queries.
#[async_trait]
pub trait QueryStore: Send + Sync {
    async fn run_readonly(&self, sql: &str, max_rows: usize) -> Result<QueryRows, ChatError>;
}

// =============================================================================
// SQLite adapters
// =============================================================================

async fn blocking<T, F>(f: F) -> Result<T, ChatError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, tirage_core::TirageError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ChatError::Storage(format!("blocking task failed: {}", e)))?
        .map_err(ChatError::from)
}

/// [`DrawStats`] backed by the SQLite [`StatsService`].
#[derive(Clone)]
pub struct StoreStats {
    inner: Arc<StatsService>,
}

impl StoreStats {
    pub fn new(inner: Arc<StatsService>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl DrawStats for StoreStats {
    async fn lookup_number(
        &self,
        number: u32,
        kind: NumberKind,
    ) -> Result<Option<NumberStats>, ChatError> {
        let inner = Arc::clone(&self.inner);
        blocking(move || inner.lookup_number(number, kind)).await
    }

    async fn lookup_draw(&self, draw: DrawRef) -> Result<Option<Draw>, ChatError> {
        let inner = Arc::clone(&self.inner);
        blocking(move || inner.lookup_draw(draw)).await
    }

    async fn rank(
        &self,
        sort: SortKey,
        order: RankOrder,
        limit: usize,
        kind: NumberKind,
    ) -> Result<Vec<NumberStats>, ChatError> {
        let inner = Arc::clone(&self.inner);
        blocking(move || inner.rank(sort, order, limit, kind)).await
    }

    async fn compare(
        &self,
        first: u32,
        second: u32,
        kind: NumberKind,
    ) -> Result<Option<Comparison>, ChatError> {
        let inner = Arc::clone(&self.inner);
        blocking(move || inner.compare(first, second, kind)).await
    }

    async fn category(
        &self,
        category: CategoryKind,
        kind: NumberKind,
    ) -> Result<Vec<NumberStats>, ChatError> {
        let inner = Arc::clone(&self.inner);
        blocking(move || inner.category(category, kind)).await
    }
}

/// [`QueryStore`] backed by [`ReadOnlyQueries`].
#[derive(Clone)]
pub struct StoreQueries {
    inner: ReadOnlyQueries,
}

impl StoreQueries {
    pub fn new(inner: ReadOnlyQueries) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl QueryStore for StoreQueries {
    async fn run_readonly(&self, sql: &str, max_rows: usize) -> Result<QueryRows, ChatError> {
        let inner = self.inner.clone();
        let sql = sql.to_string();
        blocking(move || inner.run(&sql, max_rows)).await
    }
}
