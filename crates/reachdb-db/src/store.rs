//! [`MetricsStore`] backed by the Postgres pool.
//!
//! Cancellation is checked before each statement is sent; a statement
//! already in flight runs to completion so no write is left half-applied.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reachdb_core::{
    ensure_active, AggregateMetrics, CollectContext, Comment, ContentItem, ItemMetrics,
    MetricsStore, Platform, RunOutcome, Show, StoreError,
};
use sqlx::PgPool;

use crate::{collection_runs, comments, items, metrics, shows, DbError};

/// Adapter from the free query functions to the collector's store contract.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn store_err(operation: &'static str) -> impl FnOnce(DbError) -> StoreError {
    move |e| StoreError::new(operation, e)
}

#[async_trait]
impl MetricsStore for PgStore {
    async fn upsert_show(&self, ctx: &CollectContext, show: &Show) -> Result<i64, StoreError> {
        ensure_active(ctx, "upsert_show")?;
        shows::upsert_show(&self.pool, show)
            .await
            .map_err(store_err("upsert_show"))
    }

    async fn upsert_item(
        &self,
        ctx: &CollectContext,
        show_id: i64,
        item: &ContentItem,
    ) -> Result<i64, StoreError> {
        ensure_active(ctx, "upsert_item")?;
        items::upsert_item(&self.pool, show_id, item)
            .await
            .map_err(store_err("upsert_item"))
    }

    async fn upsert_item_metrics(
        &self,
        ctx: &CollectContext,
        item_id: i64,
        snapshot: &ItemMetrics,
    ) -> Result<(), StoreError> {
        ensure_active(ctx, "upsert_item_metrics")?;
        metrics::upsert_item_metrics(&self.pool, item_id, snapshot)
            .await
            .map_err(store_err("upsert_item_metrics"))
    }

    async fn upsert_aggregate_metrics(
        &self,
        ctx: &CollectContext,
        show_id: i64,
        snapshot: &AggregateMetrics,
    ) -> Result<(), StoreError> {
        ensure_active(ctx, "upsert_aggregate_metrics")?;
        metrics::upsert_aggregate_metrics(&self.pool, show_id, snapshot)
            .await
            .map_err(store_err("upsert_aggregate_metrics"))
    }

    async fn insert_comment(
        &self,
        ctx: &CollectContext,
        item_id: i64,
        comment: &Comment,
    ) -> Result<bool, StoreError> {
        ensure_active(ctx, "insert_comment")?;
        comments::insert_comment(&self.pool, item_id, comment)
            .await
            .map_err(store_err("insert_comment"))
    }

    async fn record_run_start(
        &self,
        ctx: &CollectContext,
        platform: Platform,
        started_at: DateTime<Utc>,
    ) -> Result<i64, StoreError> {
        ensure_active(ctx, "record_run_start")?;
        collection_runs::start_collection_run(&self.pool, platform, started_at)
            .await
            .map(|row| row.id)
            .map_err(store_err("record_run_start"))
    }

    async fn record_run_end(
        &self,
        ctx: &CollectContext,
        run_id: i64,
        outcome: &RunOutcome,
    ) -> Result<(), StoreError> {
        ensure_active(ctx, "record_run_end")?;
        collection_runs::finish_collection_run(&self.pool, run_id, outcome)
            .await
            .map_err(store_err("record_run_end"))
    }
}
