//! Database operations for `content_items`.

use chrono::{DateTime, Utc};
use reachdb_core::ContentItem;
use sqlx::PgPool;

use crate::shows::json_or_empty_object;
use crate::DbError;

/// A row from the `content_items` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ContentItemRow {
    pub id: i64,
    pub show_id: i64,
    pub platform_item_id: String,
    pub title: String,
    pub description: Option<String>,
    pub content_type: Option<String>,
    pub url: Option<String>,
    pub duration_seconds: Option<i32>,
    pub published_at: Option<DateTime<Utc>>,
    pub season_number: Option<i32>,
    pub episode_number: Option<i32>,
    pub raw_data: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const ITEM_COLUMNS: &str = "id, show_id, platform_item_id, title, description, content_type, \
                            url, duration_seconds, published_at, season_number, episode_number, \
                            raw_data, created_at, updated_at";

/// Upserts a content item under `show_id`.
///
/// Conflicts on `(show_id, platform_item_id)` overwrite the descriptive
/// columns in place. Returns the internal `id`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails, including when `show_id`
/// does not reference an existing show.
pub async fn upsert_item(pool: &PgPool, show_id: i64, item: &ContentItem) -> Result<i64, DbError> {
    let id: i64 = sqlx::query_scalar::<_, i64>(
        "INSERT INTO content_items \
             (show_id, platform_item_id, title, description, content_type, url, \
              duration_seconds, published_at, season_number, episode_number, raw_data) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
         ON CONFLICT (show_id, platform_item_id) DO UPDATE SET \
             title            = EXCLUDED.title, \
             description      = EXCLUDED.description, \
             content_type     = EXCLUDED.content_type, \
             url              = EXCLUDED.url, \
             duration_seconds = EXCLUDED.duration_seconds, \
             published_at     = EXCLUDED.published_at, \
             season_number    = EXCLUDED.season_number, \
             episode_number   = EXCLUDED.episode_number, \
             raw_data         = EXCLUDED.raw_data, \
             updated_at       = NOW() \
         RETURNING id",
    )
    .bind(show_id)
    .bind(&item.platform_item_id)
    .bind(&item.title)
    .bind(&item.description)
    .bind(&item.content_type)
    .bind(&item.url)
    .bind(item.duration_seconds)
    .bind(item.published_at)
    .bind(item.season_number)
    .bind(item.episode_number)
    .bind(json_or_empty_object(&item.raw_data))
    .fetch_one(pool)
    .await?;

    Ok(id)
}

/// Fetches a content item by internal `id`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists, or [`DbError::Sqlx`] on query failure.
pub async fn get_item(pool: &PgPool, id: i64) -> Result<ContentItemRow, DbError> {
    sqlx::query_as::<_, ContentItemRow>(&format!(
        "SELECT {ITEM_COLUMNS} FROM content_items WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)
}

/// Lists a show's items, newest first. Items without a publish time sort last.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_items_for_show(
    pool: &PgPool,
    show_id: i64,
) -> Result<Vec<ContentItemRow>, DbError> {
    let rows = sqlx::query_as::<_, ContentItemRow>(&format!(
        "SELECT {ITEM_COLUMNS} FROM content_items \
         WHERE show_id = $1 \
         ORDER BY published_at DESC NULLS LAST, id DESC"
    ))
    .bind(show_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
