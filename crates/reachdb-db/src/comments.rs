//! Database operations for `comments`.

use chrono::{DateTime, Utc};
use reachdb_core::Comment;
use sqlx::PgPool;

use crate::DbError;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CommentRow {
    pub id: i64,
    pub item_id: i64,
    pub platform_comment_id: String,
    pub author_name: Option<String>,
    pub author_id: Option<String>,
    pub body: String,
    pub likes_count: Option<i32>,
    pub reply_count: Option<i32>,
    pub parent_platform_comment_id: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Inserts a comment unless `(item_id, platform_comment_id)` already exists.
///
/// An existing row is never touched, even if the platform now reports a
/// different body or like count. Returns `true` when a new row was written.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn insert_comment(pool: &PgPool, item_id: i64, comment: &Comment) -> Result<bool, DbError> {
    let result = sqlx::query(
        "INSERT INTO comments \
             (item_id, platform_comment_id, author_name, author_id, body, likes_count, \
              reply_count, parent_platform_comment_id, published_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
         ON CONFLICT (item_id, platform_comment_id) DO NOTHING",
    )
    .bind(item_id)
    .bind(&comment.platform_comment_id)
    .bind(&comment.author_name)
    .bind(&comment.author_id)
    .bind(&comment.body)
    .bind(comment.likes_count)
    .bind(comment.reply_count)
    .bind(&comment.parent_platform_comment_id)
    .bind(comment.published_at)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Lists an item's stored comments, oldest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_comments_for_item(
    pool: &PgPool,
    item_id: i64,
) -> Result<Vec<CommentRow>, DbError> {
    let rows = sqlx::query_as::<_, CommentRow>(
        "SELECT id, item_id, platform_comment_id, author_name, author_id, body, likes_count, \
                reply_count, parent_platform_comment_id, published_at, created_at \
         FROM comments \
         WHERE item_id = $1 \
         ORDER BY published_at NULLS LAST, id",
    )
    .bind(item_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
