//! Read-only commands over the `collection_runs` provenance table.

use chrono::{DateTime, Utc};
use clap::Subcommand;
use reachdb_core::Platform;
use reachdb_db::CollectionRunRow;
use uuid::Uuid;

use crate::collect::truncate;

/// Sub-commands available under `runs`.
#[derive(Debug, Subcommand)]
pub enum RunsCommands {
    /// List recent collection runs, newest first
    List {
        /// Only runs for this platform (youtube, twitch)
        #[arg(long)]
        platform: Option<Platform>,
        /// Maximum number of runs to show
        #[arg(long, default_value = "20")]
        limit: i64,
    },
    /// Show one collection run by numeric id or public UUID
    Show { id: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RunRef {
    Id(i64),
    Public(Uuid),
}

pub(crate) fn parse_run_ref(raw: &str) -> anyhow::Result<RunRef> {
    let raw = raw.trim();
    if let Ok(id) = raw.parse::<i64>() {
        return Ok(RunRef::Id(id));
    }
    Uuid::parse_str(raw)
        .map(RunRef::Public)
        .map_err(|_| anyhow::anyhow!("'{raw}' is neither a run id nor a run UUID"))
}

fn fmt_time(at: Option<DateTime<Utc>>) -> String {
    at.map_or_else(|| "-".to_string(), |t| t.format("%Y-%m-%d %H:%M:%S").to_string())
}

pub(crate) fn fmt_elapsed(run: &CollectionRunRow) -> String {
    match run.completed_at {
        Some(done) => {
            let secs = (done - run.started_at).num_seconds().max(0);
            format!("{}m{:02}s", secs / 60, secs % 60)
        }
        None => "running".to_string(),
    }
}

/// Print the most recent runs as a table.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub(crate) async fn run_runs_list(
    pool: &sqlx::PgPool,
    platform: Option<Platform>,
    limit: i64,
) -> anyhow::Result<()> {
    let runs = reachdb_db::list_collection_runs(pool, platform, limit.max(1)).await?;

    if runs.is_empty() {
        println!(
            "no collection runs found{}; run `collect` first",
            platform
                .map(|p| format!(" for platform {p}"))
                .unwrap_or_default()
        );
        return Ok(());
    }

    println!(
        "{:<8}{:<10}{:<11}{:<21}{:<10}{:>7}{:>9}  ERROR",
        "ID", "PLATFORM", "STATUS", "STARTED", "ELAPSED", "ITEMS", "METRICS"
    );
    for run in &runs {
        println!(
            "{:<8}{:<10}{:<11}{:<21}{:<10}{:>7}{:>9}  {}",
            run.id,
            run.platform,
            run.status,
            fmt_time(Some(run.started_at)),
            fmt_elapsed(run),
            run.items_processed,
            run.metrics_collected,
            run.error_message
                .as_deref()
                .map(|m| truncate(m, 60))
                .unwrap_or_default()
        );
    }

    Ok(())
}

/// Print every field of one run.
///
/// # Errors
///
/// Returns an error if `id` cannot be parsed, no run matches, or the query fails.
pub(crate) async fn run_runs_show(pool: &sqlx::PgPool, id: &str) -> anyhow::Result<()> {
    let run = match parse_run_ref(id)? {
        RunRef::Id(id) => reachdb_db::get_collection_run(pool, id).await,
        RunRef::Public(public_id) => {
            reachdb_db::get_collection_run_by_public_id(pool, public_id).await
        }
    }
    .map_err(|e| match e {
        reachdb_db::DbError::NotFound => anyhow::anyhow!("collection run '{id}' not found"),
        other => other.into(),
    })?;

    println!("Run:       {} ({})", run.id, run.public_id);
    println!("Platform:  {}", run.platform);
    println!("Status:    {}", run.run_status()?);
    println!("Started:   {}", fmt_time(Some(run.started_at)));
    println!("Completed: {}", fmt_time(run.completed_at));
    println!("Elapsed:   {}", fmt_elapsed(&run));
    println!("Items:     {}", run.items_processed);
    println!("Metrics:   {}", run.metrics_collected);
    if let Some(message) = &run.error_message {
        println!("Error:     {message}");
    }

    Ok(())
}
