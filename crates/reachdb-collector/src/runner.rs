//! Execution modes: a single pass, or passes on a fixed interval.

use std::time::Duration;

use reachdb_core::CollectContext;
use tokio::time::MissedTickBehavior;

use crate::{Collector, PassSummary};

/// Collect every source once.
pub async fn run_once(collector: &Collector, ctx: &CollectContext) -> PassSummary {
    collector.collect_all(ctx).await
}

/// Collect immediately, then once per `every` until `ctx` is cancelled.
///
/// A pass that overruns the interval delays the next one rather than
/// triggering a burst of catch-up passes. Returns the number of passes run.
pub async fn run_scheduled(collector: &Collector, every: Duration, ctx: &CollectContext) -> u64 {
    let every = every.max(Duration::from_secs(1));
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::info!(interval_secs = every.as_secs(), "scheduled collection started");

    let mut passes: u64 = 0;
    loop {
        tokio::select! {
            biased;
            () = ctx.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let summary = collector.collect_all(ctx).await;
        passes += 1;
        if summary.cancelled {
            break;
        }
        tracing::debug!(passes, "waiting for next scheduled pass");
    }

    tracing::info!(passes, "scheduled collection stopped");
    passes
}
