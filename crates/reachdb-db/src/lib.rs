use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;
use thiserror::Error;

const DEFAULT_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_MIN_CONNECTIONS: u32 = 1;
const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 10;

// Path relative to crates/reachdb-db/Cargo.toml; resolves to <workspace-root>/migrations/
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations");

#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            min_connections: DEFAULT_MIN_CONNECTIONS,
            acquire_timeout_secs: DEFAULT_ACQUIRE_TIMEOUT_SECS,
        }
    }
}

impl PoolConfig {
    #[must_use]
    pub fn from_app_config(config: &reachdb_core::AppConfig) -> Self {
        Self {
            max_connections: config.db_max_connections,
            min_connections: config.db_min_connections,
            acquire_timeout_secs: config.db_acquire_timeout_secs,
        }
    }
}

#[derive(Debug, Error)]
pub enum DbError {
    #[error("record not found")]
    NotFound,
    #[error("collection run {id} is not in '{expected_status}' state")]
    InvalidCollectionRunTransition {
        id: i64,
        expected_status: &'static str,
    },
    #[error("cannot close collection run {id} with non-terminal status '{status}'")]
    NonTerminalOutcome { id: i64, status: &'static str },
    #[error("invalid value in column {column}: {reason}")]
    InvalidColumn {
        column: &'static str,
        reason: String,
    },
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Connect to a Postgres pool using explicit URL and config.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if the connection cannot be established.
pub async fn connect_pool(database_url: &str, config: PoolConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .connect(database_url)
        .await
}

/// Run all pending migrations against the pool.
///
/// Returns the number of migrations that were applied.
///
/// # Errors
///
/// Returns [`sqlx::migrate::MigrateError`] if any migration fails or the
/// migration bookkeeping table cannot be read.
pub async fn run_migrations(pool: &PgPool) -> Result<usize, sqlx::migrate::MigrateError> {
    let applied_before = applied_migration_count(pool).await?;

    MIGRATOR.run(pool).await?;

    let applied_after = applied_migration_count(pool).await?;
    let delta = (applied_after - applied_before).max(0);
    Ok(usize::try_from(delta).unwrap_or(0))
}

async fn applied_migration_count(pool: &PgPool) -> Result<i64, sqlx::Error> {
    let counted =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = true")
            .fetch_one(pool)
            .await;
    match counted {
        Ok(count) => Ok(count),
        // A fresh database has no _sqlx_migrations table yet.
        Err(e) if is_undefined_table(&e) => Ok(0),
        Err(e) => Err(e),
    }
}

/// SQLSTATE `42P01`, `undefined_table`.
fn is_undefined_table(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some("42P01"))
}

/// Send a `SELECT 1` to verify the pool has a live connection.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if the query fails.
pub async fn ping(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(pool)
        .await?;
    Ok(())
}

/// Ping the pool and return a typed error on failure.
///
/// # Errors
///
/// Returns [`DbError`] if the ping fails.
pub async fn health_check(pool: &PgPool) -> Result<(), DbError> {
    ping(pool).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_config_has_sane_defaults() {
        let config = PoolConfig::default();

        assert_eq!(config.max_connections, DEFAULT_MAX_CONNECTIONS);
        assert_eq!(config.min_connections, DEFAULT_MIN_CONNECTIONS);
        assert_eq!(config.acquire_timeout_secs, DEFAULT_ACQUIRE_TIMEOUT_SECS);
    }

    #[test]
    fn only_database_errors_can_be_a_missing_table() {
        assert!(!is_undefined_table(&sqlx::Error::RowNotFound));
        assert!(!is_undefined_table(&sqlx::Error::PoolTimedOut));
    }

    #[test]
    fn transition_error_names_expected_status() {
        let err = DbError::InvalidCollectionRunTransition {
            id: 7,
            expected_status: "running",
        };
        assert_eq!(
            err.to_string(),
            "collection run 7 is not in 'running' state"
        );
    }
}

pub mod collection_runs;
pub mod comments;
pub mod items;
pub mod metrics;
pub mod shows;
pub mod store;

pub use collection_runs::{
    finish_collection_run, get_collection_run, get_collection_run_by_public_id,
    list_collection_runs, start_collection_run, CollectionRunRow,
};
pub use comments::{insert_comment, list_comments_for_item, CommentRow};
pub use items::{get_item, list_items_for_show, upsert_item, ContentItemRow};
pub use metrics::{
    list_aggregate_metrics, list_item_metrics, upsert_aggregate_metrics, upsert_item_metrics,
    AggregateMetricsRow, ItemMetricsRow,
};
pub use shows::{get_show, get_show_by_platform_id, upsert_show, ShowRow};
pub use store::PgStore;
