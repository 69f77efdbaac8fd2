//! The persistence contract consumed by the collector.
//!
//! Every write is a single atomic statement against one entity; nothing
//! links an item write to the metrics written after it. Every operation
//! takes the pass's [`CollectContext`] and refuses to start once it is
//! cancelled.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{
    AggregateMetrics, CollectContext, Comment, ContentItem, ItemMetrics, Platform, RunOutcome, Show,
};

/// A failed storage operation, with enough context to log or record.
#[derive(Debug, Error)]
#[error("{operation} failed: {message}")]
pub struct StoreError {
    pub operation: &'static str,
    pub message: String,
    cancelled: bool,
}

impl StoreError {
    pub fn new(operation: &'static str, message: impl std::fmt::Display) -> Self {
        Self {
            operation,
            message: message.to_string(),
            cancelled: false,
        }
    }

    pub fn cancelled(operation: &'static str) -> Self {
        Self {
            cancelled: true,
            ..Self::new(operation, "cancelled before the write started")
        }
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }
}

/// Refuse to start `operation` once `ctx` has been cancelled.
///
/// # Errors
///
/// Returns [`StoreError::cancelled`] when `ctx` is cancelled.
pub fn ensure_active(ctx: &CollectContext, operation: &'static str) -> Result<(), StoreError> {
    if ctx.is_cancelled() {
        Err(StoreError::cancelled(operation))
    } else {
        Ok(())
    }
}

#[async_trait]
pub trait MetricsStore: Send + Sync {
    /// Insert or update by `(platform, platform_id)`; returns the stable id.
    async fn upsert_show(&self, ctx: &CollectContext, show: &Show) -> Result<i64, StoreError>;

    /// Insert or update by `(show_id, platform_item_id)`; returns the stable id.
    async fn upsert_item(
        &self,
        ctx: &CollectContext,
        show_id: i64,
        item: &ContentItem,
    ) -> Result<i64, StoreError>;

    /// Full overwrite keyed by `(item_id, metric_date)`.
    async fn upsert_item_metrics(
        &self,
        ctx: &CollectContext,
        item_id: i64,
        metrics: &ItemMetrics,
    ) -> Result<(), StoreError>;

    /// Full overwrite keyed by `(show_id, metric_date)`.
    async fn upsert_aggregate_metrics(
        &self,
        ctx: &CollectContext,
        show_id: i64,
        metrics: &AggregateMetrics,
    ) -> Result<(), StoreError>;

    /// Insert keyed by `(item_id, platform_comment_id)`; an existing row is
    /// left untouched. Returns `true` when a new row was written.
    async fn insert_comment(
        &self,
        ctx: &CollectContext,
        item_id: i64,
        comment: &Comment,
    ) -> Result<bool, StoreError>;

    /// Open a run in `running` state and return its id.
    async fn record_run_start(
        &self,
        ctx: &CollectContext,
        platform: Platform,
        started_at: DateTime<Utc>,
    ) -> Result<i64, StoreError>;

    /// Close a `running` run with its terminal outcome. Closing a run that
    /// is not `running` is an error. Callers closing a run after
    /// cancellation pass [`CollectContext::background`].
    async fn record_run_end(
        &self,
        ctx: &CollectContext,
        run_id: i64,
        outcome: &RunOutcome,
    ) -> Result<(), StoreError>;
}
