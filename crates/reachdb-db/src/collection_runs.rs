//! Database operations for `collection_runs`.
//!
//! A run is inserted as `running` and closed exactly once. The close is a
//! status-guarded `UPDATE`, so a second close affects no rows and surfaces as
//! [`DbError::InvalidCollectionRunTransition`].

use chrono::{DateTime, Utc};
use reachdb_core::{Platform, RunOutcome, RunStatus};
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

/// A row from the `collection_runs` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CollectionRunRow {
    pub id: i64,
    pub public_id: Uuid,
    pub platform: String,
    pub status: String,
    pub started_at: DateTime<Utc>,
    /// `NULL` exactly while `status = 'running'`.
    pub completed_at: Option<DateTime<Utc>>,
    pub items_processed: i32,
    pub metrics_collected: i32,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl CollectionRunRow {
    /// Parse the stored status tag.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::InvalidColumn`] if the column holds an unknown tag.
    pub fn run_status(&self) -> Result<RunStatus, DbError> {
        self.status
            .parse::<RunStatus>()
            .map_err(|e| DbError::InvalidColumn {
                column: "collection_runs.status",
                reason: e.to_string(),
            })
    }
}

const RUN_COLUMNS: &str = "id, public_id, platform, status, started_at, completed_at, \
                           items_processed, metrics_collected, error_message, created_at";

/// Opens a run for `platform` in `running` status.
///
/// Generates a UUID in Rust and binds it to `public_id`. Returns the full
/// newly-created row.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn start_collection_run(
    pool: &PgPool,
    platform: Platform,
    started_at: DateTime<Utc>,
) -> Result<CollectionRunRow, DbError> {
    let public_id = Uuid::new_v4();

    let row = sqlx::query_as::<_, CollectionRunRow>(&format!(
        "INSERT INTO collection_runs (public_id, platform, status, started_at) \
         VALUES ($1, $2, 'running', $3) \
         RETURNING {RUN_COLUMNS}"
    ))
    .bind(public_id)
    .bind(platform.as_str())
    .bind(started_at)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Closes a `running` run with its terminal outcome and sets `completed_at = NOW()`.
///
/// # Errors
///
/// Returns [`DbError::NonTerminalOutcome`] if `outcome.status` is `running`,
/// [`DbError::InvalidCollectionRunTransition`] if the run does not exist or
/// is already closed, or [`DbError::Sqlx`] if the update fails.
pub async fn finish_collection_run(
    pool: &PgPool,
    id: i64,
    outcome: &RunOutcome,
) -> Result<(), DbError> {
    if !outcome.status.is_terminal() {
        return Err(DbError::NonTerminalOutcome {
            id,
            status: outcome.status.as_str(),
        });
    }

    let result = sqlx::query(
        "UPDATE collection_runs \
         SET status = $1, completed_at = NOW(), items_processed = $2, \
             metrics_collected = $3, error_message = $4 \
         WHERE id = $5 AND status = 'running'",
    )
    .bind(outcome.status.as_str())
    .bind(outcome.counts.items_processed)
    .bind(outcome.counts.metrics_collected)
    .bind(&outcome.error_message)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidCollectionRunTransition {
            id,
            expected_status: "running",
        });
    }

    Ok(())
}

/// Fetches a single run by its internal `id`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists with the given `id`, or
/// [`DbError::Sqlx`] if the query fails.
pub async fn get_collection_run(pool: &PgPool, id: i64) -> Result<CollectionRunRow, DbError> {
    sqlx::query_as::<_, CollectionRunRow>(&format!(
        "SELECT {RUN_COLUMNS} FROM collection_runs WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)
}

/// Fetches a single run by its `public_id`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row matches, or [`DbError::Sqlx`] if the query fails.
pub async fn get_collection_run_by_public_id(
    pool: &PgPool,
    public_id: Uuid,
) -> Result<CollectionRunRow, DbError> {
    sqlx::query_as::<_, CollectionRunRow>(&format!(
        "SELECT {RUN_COLUMNS} FROM collection_runs WHERE public_id = $1"
    ))
    .bind(public_id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)
}

/// Returns the most recent `limit` runs, newest first, optionally for one platform.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_collection_runs(
    pool: &PgPool,
    platform: Option<Platform>,
    limit: i64,
) -> Result<Vec<CollectionRunRow>, DbError> {
    let rows = sqlx::query_as::<_, CollectionRunRow>(&format!(
        "SELECT {RUN_COLUMNS} FROM collection_runs \
         WHERE ($1::text IS NULL OR platform = $1) \
         ORDER BY started_at DESC, id DESC \
         LIMIT $2"
    ))
    .bind(platform.map(Platform::as_str))
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
