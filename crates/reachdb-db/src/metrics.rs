//! Database operations for `item_metrics` and `aggregate_metrics`.
//!
//! Both tables hold one snapshot per entity per day. Re-collecting a date
//! overwrites every column, including ones the new snapshot leaves `NULL`.

use chrono::{DateTime, NaiveDate, Utc};
use reachdb_core::{AggregateMetrics, ItemMetrics};
use sqlx::PgPool;

use crate::shows::json_or_empty_object;
use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ItemMetricsRow {
    pub id: i64,
    pub item_id: i64,
    pub metric_date: NaiveDate,
    pub views: Option<i64>,
    pub plays: Option<i64>,
    pub listeners: Option<i64>,
    pub downloads: Option<i64>,
    pub likes: Option<i64>,
    pub dislikes: Option<i64>,
    pub comments: Option<i64>,
    pub shares: Option<i64>,
    pub watch_time_minutes: Option<i64>,
    pub average_view_duration_seconds: Option<i32>,
    pub completion_rate: Option<f64>,
    pub subscribers_gained: Option<i32>,
    pub subscribers_lost: Option<i32>,
    pub followers_gained: Option<i32>,
    pub followers_lost: Option<i32>,
    pub extra: serde_json::Value,
    pub collected_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AggregateMetricsRow {
    pub id: i64,
    pub show_id: i64,
    pub metric_date: NaiveDate,
    pub followers_total: Option<i64>,
    pub followers_gained: Option<i32>,
    pub followers_lost: Option<i32>,
    pub subscribers_total: Option<i64>,
    pub subscribers_gained: Option<i32>,
    pub subscribers_lost: Option<i32>,
    pub total_views: Option<i64>,
    pub total_plays: Option<i64>,
    pub total_likes: Option<i64>,
    pub total_comments: Option<i64>,
    pub total_shares: Option<i64>,
    pub total_watch_time_minutes: Option<i64>,
    pub average_completion_rate: Option<f64>,
    pub extra: serde_json::Value,
    pub collected_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// item_metrics operations
// ---------------------------------------------------------------------------

/// Writes the snapshot for `(item_id, metrics.metric_date)`, replacing any
/// previous snapshot for that day.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_item_metrics(
    pool: &PgPool,
    item_id: i64,
    metrics: &ItemMetrics,
) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO item_metrics \
             (item_id, metric_date, views, plays, listeners, downloads, likes, dislikes, \
              comments, shares, watch_time_minutes, average_view_duration_seconds, \
              completion_rate, subscribers_gained, subscribers_lost, followers_gained, \
              followers_lost, extra) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18) \
         ON CONFLICT (item_id, metric_date) DO UPDATE SET \
             views                         = EXCLUDED.views, \
             plays                         = EXCLUDED.plays, \
             listeners                     = EXCLUDED.listeners, \
             downloads                     = EXCLUDED.downloads, \
             likes                         = EXCLUDED.likes, \
             dislikes                      = EXCLUDED.dislikes, \
             comments                      = EXCLUDED.comments, \
             shares                        = EXCLUDED.shares, \
             watch_time_minutes            = EXCLUDED.watch_time_minutes, \
             average_view_duration_seconds = EXCLUDED.average_view_duration_seconds, \
             completion_rate               = EXCLUDED.completion_rate, \
             subscribers_gained            = EXCLUDED.subscribers_gained, \
             subscribers_lost              = EXCLUDED.subscribers_lost, \
             followers_gained              = EXCLUDED.followers_gained, \
             followers_lost                = EXCLUDED.followers_lost, \
             extra                         = EXCLUDED.extra, \
             collected_at                  = NOW()",
    )
    .bind(item_id)
    .bind(metrics.metric_date)
    .bind(metrics.views)
    .bind(metrics.plays)
    .bind(metrics.listeners)
    .bind(metrics.downloads)
    .bind(metrics.likes)
    .bind(metrics.dislikes)
    .bind(metrics.comments)
    .bind(metrics.shares)
    .bind(metrics.watch_time_minutes)
    .bind(metrics.average_view_duration_seconds)
    .bind(metrics.completion_rate)
    .bind(metrics.subscribers_gained)
    .bind(metrics.subscribers_lost)
    .bind(metrics.followers_gained)
    .bind(metrics.followers_lost)
    .bind(json_or_empty_object(&metrics.extra))
    .execute(pool)
    .await?;

    Ok(())
}

/// Lists an item's daily snapshots in date order.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_item_metrics(
    pool: &PgPool,
    item_id: i64,
) -> Result<Vec<ItemMetricsRow>, DbError> {
    let rows = sqlx::query_as::<_, ItemMetricsRow>(
        "SELECT id, item_id, metric_date, views, plays, listeners, downloads, likes, dislikes, \
                comments, shares, watch_time_minutes, average_view_duration_seconds, \
                completion_rate, subscribers_gained, subscribers_lost, followers_gained, \
                followers_lost, extra, collected_at \
         FROM item_metrics \
         WHERE item_id = $1 \
         ORDER BY metric_date",
    )
    .bind(item_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

// ---------------------------------------------------------------------------
// aggregate_metrics operations
// ---------------------------------------------------------------------------

/// Writes the show-wide snapshot for `(show_id, metrics.metric_date)`,
/// replacing any previous snapshot for that day.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_aggregate_metrics(
    pool: &PgPool,
    show_id: i64,
    metrics: &AggregateMetrics,
) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO aggregate_metrics \
             (show_id, metric_date, followers_total, followers_gained, followers_lost, \
              subscribers_total, subscribers_gained, subscribers_lost, total_views, \
              total_plays, total_likes, total_comments, total_shares, \
              total_watch_time_minutes, average_completion_rate, extra) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16) \
         ON CONFLICT (show_id, metric_date) DO UPDATE SET \
             followers_total          = EXCLUDED.followers_total, \
             followers_gained         = EXCLUDED.followers_gained, \
             followers_lost           = EXCLUDED.followers_lost, \
             subscribers_total        = EXCLUDED.subscribers_total, \
             subscribers_gained       = EXCLUDED.subscribers_gained, \
             subscribers_lost         = EXCLUDED.subscribers_lost, \
             total_views              = EXCLUDED.total_views, \
             total_plays              = EXCLUDED.total_plays, \
             total_likes              = EXCLUDED.total_likes, \
             total_comments           = EXCLUDED.total_comments, \
             total_shares             = EXCLUDED.total_shares, \
             total_watch_time_minutes = EXCLUDED.total_watch_time_minutes, \
             average_completion_rate  = EXCLUDED.average_completion_rate, \
             extra                    = EXCLUDED.extra, \
             collected_at             = NOW()",
    )
    .bind(show_id)
    .bind(metrics.metric_date)
    .bind(metrics.followers_total)
    .bind(metrics.followers_gained)
    .bind(metrics.followers_lost)
    .bind(metrics.subscribers_total)
    .bind(metrics.subscribers_gained)
    .bind(metrics.subscribers_lost)
    .bind(metrics.total_views)
    .bind(metrics.total_plays)
    .bind(metrics.total_likes)
    .bind(metrics.total_comments)
    .bind(metrics.total_shares)
    .bind(metrics.total_watch_time_minutes)
    .bind(metrics.average_completion_rate)
    .bind(json_or_empty_object(&metrics.extra))
    .execute(pool)
    .await?;

    Ok(())
}

/// Lists a show's daily aggregate snapshots in date order.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_aggregate_metrics(
    pool: &PgPool,
    show_id: i64,
) -> Result<Vec<AggregateMetricsRow>, DbError> {
    let rows = sqlx::query_as::<_, AggregateMetricsRow>(
        "SELECT id, show_id, metric_date, followers_total, followers_gained, followers_lost, \
                subscribers_total, subscribers_gained, subscribers_lost, total_views, \
                total_plays, total_likes, total_comments, total_shares, \
                total_watch_time_minutes, average_completion_rate, extra, collected_at \
         FROM aggregate_metrics \
         WHERE show_id = $1 \
         ORDER BY metric_date",
    )
    .bind(show_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
