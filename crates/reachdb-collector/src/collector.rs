//! Per-source collection pass and its partial-failure policy.
//!
//! Sources run one after another in configuration order. Within a source,
//! failures are contained at the narrowest scope that still makes sense:
//! an owner or item-list failure fails the source's run; an item upsert
//! failure skips that item; metric, comment and aggregate failures skip only
//! the affected record. Every opened run is closed exactly once, including
//! when the pass panics.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use chrono::Utc;
use futures::FutureExt;
use reachdb_core::{
    CollectContext, ContentItem, DateRange, MetricsStore, Platform, PlatformSource, RunCounts,
    RunOutcome, RunStatus, Show, SourceError, StoreError,
};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::StartupGate;

/// One source to collect, with the show or account name to look up.
#[derive(Clone)]
pub struct SourceEntry {
    pub source: Arc<dyn PlatformSource>,
    pub show: String,
}

impl std::fmt::Debug for SourceEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceEntry")
            .field("platform", &self.source.platform())
            .field("show", &self.show)
            .finish()
    }
}

/// What happened to one source during a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceReport {
    pub platform: Platform,
    pub show: String,
    /// `None` when the run record could not be opened.
    pub run_id: Option<i64>,
    pub outcome: RunOutcome,
    /// Whether the terminal outcome reached the store.
    pub recorded: bool,
}

/// One report per source attempted, in processing order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassSummary {
    pub reports: Vec<SourceReport>,
    /// The pass stopped early because the context was cancelled.
    pub cancelled: bool,
}

impl PassSummary {
    #[must_use]
    pub fn completed(&self) -> usize {
        self.count_status(RunStatus::Completed)
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.count_status(RunStatus::Failed)
    }

    fn count_status(&self, status: RunStatus) -> usize {
        self.reports
            .iter()
            .filter(|r| r.outcome.status == status)
            .count()
    }
}

/// Why a source's pass ended as failed.
#[derive(Debug, Error)]
enum PassFailure {
    #[error("failed to fetch show: {0}")]
    FetchShow(#[source] SourceError),

    #[error("failed to store show: {0}")]
    StoreShow(#[source] StoreError),

    #[error("failed to fetch items: {0}")]
    FetchItems(#[source] SourceError),

    #[error("collection cancelled after {items} items")]
    Cancelled { items: i32 },
}

/// Drives every configured source through one collection pass.
pub struct Collector {
    store: Arc<dyn MetricsStore>,
    sources: Vec<SourceEntry>,
    lookback_days: u32,
    gate: Mutex<Option<StartupGate>>,
}

impl std::fmt::Debug for Collector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collector")
            .field("sources", &self.sources)
            .field("lookback_days", &self.lookback_days)
            .finish_non_exhaustive()
    }
}

impl Collector {
    #[must_use]
    pub fn new(store: Arc<dyn MetricsStore>, sources: Vec<SourceEntry>, lookback_days: u32) -> Self {
        Self {
            store,
            sources,
            lookback_days,
            gate: Mutex::new(None),
        }
    }

    /// Hold the first pass until `gate` is released.
    #[must_use]
    pub fn with_startup_gate(self, gate: StartupGate) -> Self {
        Self {
            gate: Mutex::new(Some(gate)),
            ..self
        }
    }

    #[must_use]
    pub fn sources(&self) -> &[SourceEntry] {
        &self.sources
    }

    /// The window for a pass starting now: the last `lookback_days` days
    /// including today, in UTC.
    #[must_use]
    pub fn window(&self) -> DateRange {
        DateRange::trailing_days(Utc::now().date_naive(), self.lookback_days)
    }

    /// One pass over every source using [`Collector::window`].
    pub async fn collect_all(&self, ctx: &CollectContext) -> PassSummary {
        self.collect_window(ctx, self.window()).await
    }

    /// One pass over every source for an explicit window.
    ///
    /// Never fails: every source's outcome is in the returned summary and in
    /// its run record. Cancellation is honoured before each source and
    /// between items.
    pub async fn collect_window(&self, ctx: &CollectContext, window: DateRange) -> PassSummary {
        let mut summary = PassSummary::default();

        if !self.await_startup_gate(ctx).await {
            tracing::info!("collection cancelled before startup completed");
            summary.cancelled = true;
            return summary;
        }

        tracing::info!(sources = self.sources.len(), %window, "collection pass starting");

        for entry in &self.sources {
            if ctx.is_cancelled() {
                tracing::info!("collection cancelled; remaining sources skipped");
                summary.cancelled = true;
                break;
            }
            summary
                .reports
                .push(self.collect_source(ctx, entry, window).await);
        }
        if ctx.is_cancelled() {
            summary.cancelled = true;
        }

        tracing::info!(
            completed = summary.completed(),
            failed = summary.failed(),
            cancelled = summary.cancelled,
            "collection pass finished"
        );
        summary
    }

    async fn await_startup_gate(&self, ctx: &CollectContext) -> bool {
        let gate = self.gate.lock().await.take();
        match gate {
            Some(gate) => gate.wait(ctx).await,
            None => true,
        }
    }

    async fn collect_source(
        &self,
        ctx: &CollectContext,
        entry: &SourceEntry,
        window: DateRange,
    ) -> SourceReport {
        let platform = entry.source.platform();
        let show = entry.show.as_str();

        let run_id = match self.store.record_run_start(ctx, platform, Utc::now()).await {
            Ok(id) => id,
            Err(e) => {
                tracing::error!(%platform, show, error = %e, "could not open run; skipping source");
                return SourceReport {
                    platform,
                    show: entry.show.clone(),
                    run_id: None,
                    outcome: RunOutcome::failed(
                        RunCounts::default(),
                        format!("could not open run: {e}"),
                    ),
                    recorded: false,
                };
            }
        };

        tracing::info!(%platform, show, run_id, "source collection starting");

        let mut counts = RunCounts::default();
        let result = AssertUnwindSafe(self.run_pass(ctx, entry, window, &mut counts))
            .catch_unwind()
            .await;

        let outcome = match result {
            Ok(Ok(())) => {
                tracing::info!(
                    %platform,
                    show,
                    run_id,
                    items = counts.items_processed,
                    metrics = counts.metrics_collected,
                    "source collection completed"
                );
                RunOutcome::completed(counts)
            }
            Ok(Err(failure)) => {
                tracing::error!(
                    %platform,
                    show,
                    run_id,
                    items = counts.items_processed,
                    metrics = counts.metrics_collected,
                    error = %failure,
                    "source collection failed"
                );
                RunOutcome::failed(counts, failure.to_string())
            }
            Err(panic) => {
                let message = format!("collection panicked: {}", panic_message(&*panic));
                tracing::error!(%platform, show, run_id, error = %message, "source collection aborted");
                RunOutcome::failed(counts, message)
            }
        };

        // The run is closed even when the pass was cancelled.
        let recorded = match self
            .store
            .record_run_end(&CollectContext::background(), run_id, &outcome)
            .await
        {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(%platform, show, run_id, error = %e, "failed to close run");
                false
            }
        };

        SourceReport {
            platform,
            show: entry.show.clone(),
            run_id: Some(run_id),
            outcome,
            recorded,
        }
    }

    async fn run_pass(
        &self,
        ctx: &CollectContext,
        entry: &SourceEntry,
        window: DateRange,
        counts: &mut RunCounts,
    ) -> Result<(), PassFailure> {
        let source = entry.source.as_ref();
        let platform = source.platform();

        let show = source
            .fetch_show(ctx, &entry.show)
            .await
            .map_err(PassFailure::FetchShow)?;
        let show_id = self
            .store
            .upsert_show(ctx, &show)
            .await
            .map_err(PassFailure::StoreShow)?;

        let items = source
            .fetch_items(ctx, &show)
            .await
            .map_err(PassFailure::FetchItems)?;
        tracing::info!(%platform, show = %show.name, show_id, items = items.len(), "items fetched");

        for item in &items {
            if ctx.is_cancelled() {
                return Err(PassFailure::Cancelled {
                    items: counts.items_processed,
                });
            }
            self.collect_item(ctx, source, show_id, item, window, counts)
                .await;
        }

        if ctx.is_cancelled() {
            return Err(PassFailure::Cancelled {
                items: counts.items_processed,
            });
        }
        self.collect_aggregates(ctx, source, &show, show_id, window)
            .await;

        Ok(())
    }

    async fn collect_item(
        &self,
        ctx: &CollectContext,
        source: &dyn PlatformSource,
        show_id: i64,
        item: &ContentItem,
        window: DateRange,
        counts: &mut RunCounts,
    ) {
        let platform = source.platform();
        let item_key = item.platform_item_id.as_str();

        let item_id = match self.store.upsert_item(ctx, show_id, item).await {
            Ok(id) => id,
            Err(e) => {
                tracing::warn!(%platform, item = item_key, error = %e, "failed to store item; skipping");
                return;
            }
        };

        match source.fetch_item_metrics(ctx, item, window).await {
            Ok(snapshots) => {
                for snapshot in &snapshots {
                    match self.store.upsert_item_metrics(ctx, item_id, snapshot).await {
                        Ok(()) => counts.metric_collected(),
                        Err(e) => tracing::warn!(
                            %platform,
                            item = item_key,
                            metric_date = %snapshot.metric_date,
                            error = %e,
                            "failed to store item metrics"
                        ),
                    }
                }
            }
            Err(e) => {
                tracing::warn!(%platform, item = item_key, error = %e, "failed to fetch item metrics");
            }
        }

        match source.fetch_comments(ctx, item).await {
            Ok(comments) => {
                let mut inserted = 0_usize;
                for comment in &comments {
                    match self.store.insert_comment(ctx, item_id, comment).await {
                        Ok(true) => inserted += 1,
                        Ok(false) => {}
                        Err(e) => tracing::warn!(
                            %platform,
                            item = item_key,
                            comment = %comment.platform_comment_id,
                            error = %e,
                            "failed to store comment"
                        ),
                    }
                }
                tracing::debug!(
                    %platform,
                    item = item_key,
                    fetched = comments.len(),
                    inserted,
                    "comments processed"
                );
            }
            Err(e) => {
                tracing::warn!(%platform, item = item_key, error = %e, "failed to fetch comments");
            }
        }

        counts.item_processed();
    }

    async fn collect_aggregates(
        &self,
        ctx: &CollectContext,
        source: &dyn PlatformSource,
        show: &Show,
        show_id: i64,
        window: DateRange,
    ) {
        let platform = source.platform();
        match source.fetch_aggregate_metrics(ctx, show, window).await {
            Ok(snapshots) => {
                for snapshot in &snapshots {
                    if let Err(e) = self
                        .store
                        .upsert_aggregate_metrics(ctx, show_id, snapshot)
                        .await
                    {
                        tracing::warn!(
                            %platform,
                            show_id,
                            metric_date = %snapshot.metric_date,
                            error = %e,
                            "failed to store aggregate metrics"
                        );
                    }
                }
            }
            Err(e) => {
                tracing::warn!(%platform, show_id, error = %e, "failed to fetch aggregate metrics");
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
#[path = "collector_test.rs"]
mod tests;
