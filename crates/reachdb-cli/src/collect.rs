//! The `collect` command: wire config, sources and storage into a collector.

use std::sync::Arc;
use std::time::Duration;

use reachdb_collector::{
    run_once, run_scheduled, Collector, PassSummary, SourceEntry, StartupGate,
};
use reachdb_core::{AppConfig, CollectContext};
use reachdb_platforms::TwitchSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum RunMode {
    Once,
    Scheduled,
}

/// Collect from every configured source in the requested mode.
///
/// Per-source failures are recorded in their runs and do not make this
/// return an error.
///
/// # Errors
///
/// Returns an error if the sources file cannot be loaded or no source
/// resolves to a credentialed platform client.
pub(crate) async fn run_collect(
    pool: sqlx::PgPool,
    config: &AppConfig,
    mode: RunMode,
) -> anyhow::Result<()> {
    let file = reachdb_core::load_sources(&config.sources_path)?;
    let set = reachdb_platforms::build_sources(config, &file)?;

    let (cancel, ctx) = CollectContext::new();
    tokio::spawn(async move {
        crate::shutdown_signal().await;
        cancel.cancel();
    });

    let gate = match set.twitch_pending_auth {
        Some(twitch) => spawn_twitch_token_exchange(twitch, ctx.clone()),
        None => StartupGate::ready(),
    };

    let entries = set
        .sources
        .into_iter()
        .map(|s| SourceEntry {
            source: s.source,
            show: s.show,
        })
        .collect();
    let store = Arc::new(reachdb_db::PgStore::new(pool));
    let collector =
        Collector::new(store, entries, config.lookback_days).with_startup_gate(gate);

    match mode {
        RunMode::Once => {
            let summary = run_once(&collector, &ctx).await;
            for line in summary_lines(&summary) {
                println!("{line}");
            }
        }
        RunMode::Scheduled => {
            let interval = Duration::from_secs(config.schedule_interval_secs);
            let passes = run_scheduled(&collector, interval, &ctx).await;
            println!("scheduled collection stopped after {passes} passes");
        }
    }

    Ok(())
}

/// Exchange Twitch client credentials in the background; collection waits
/// on the returned gate until the exchange finishes either way.
fn spawn_twitch_token_exchange(twitch: Arc<TwitchSource>, ctx: CollectContext) -> StartupGate {
    let (opener, gate) = StartupGate::new();
    tokio::spawn(async move {
        match twitch.authenticate(&ctx).await {
            Ok(()) => tracing::info!("twitch token obtained"),
            Err(e) => tracing::warn!(
                error = %e,
                "twitch token exchange failed; twitch sources will record failed runs"
            ),
        }
        opener.open();
    });
    gate
}

/// One header line plus one line per source report.
pub(crate) fn summary_lines(summary: &PassSummary) -> Vec<String> {
    if summary.reports.is_empty() {
        return vec![if summary.cancelled {
            "collection cancelled before any source ran".to_string()
        } else {
            "no sources collected".to_string()
        }];
    }

    let mut lines = vec![format!(
        "{:<10}{:<28}{:<11}{:>7}{:>9}  ERROR",
        "PLATFORM", "SHOW", "STATUS", "ITEMS", "METRICS"
    )];
    for report in &summary.reports {
        let status = if report.recorded {
            report.outcome.status.as_str().to_string()
        } else {
            format!("{}*", report.outcome.status)
        };
        lines.push(format!(
            "{:<10}{:<28}{:<11}{:>7}{:>9}  {}",
            report.platform.as_str(),
            truncate(&report.show, 26),
            status,
            report.outcome.counts.items_processed,
            report.outcome.counts.metrics_collected,
            report.outcome.error_message.as_deref().unwrap_or("")
        ));
    }

    lines.push(format!(
        "{} sources: {} completed, {} failed{}",
        summary.reports.len(),
        summary.completed(),
        summary.failed(),
        if summary.cancelled { " (cancelled)" } else { "" }
    ));
    if summary.reports.iter().any(|r| !r.recorded) {
        lines.push("* outcome could not be written to collection_runs".to_string());
    }
    lines
}

pub(crate) fn truncate(value: &str, max_chars: usize) -> String {
    if value.chars().count() > max_chars {
        format!("{}...", value.chars().take(max_chars).collect::<String>())
    } else {
        value.to_string()
    }
}
