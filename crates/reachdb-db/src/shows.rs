//! Database operations for `shows`.

use chrono::{DateTime, Utc};
use reachdb_core::{Platform, Show};
use sqlx::PgPool;

use crate::DbError;

/// A row from the `shows` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ShowRow {
    pub id: i64,
    pub platform: String,
    pub platform_id: String,
    pub name: String,
    pub description: Option<String>,
    pub author: Option<String>,
    pub categories: Vec<String>,
    pub language: Option<String>,
    pub raw_data: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const SHOW_COLUMNS: &str = "id, platform, platform_id, name, description, author, categories, \
                            language, raw_data, created_at, updated_at";

/// Upserts a show row.
///
/// Conflicts on `(platform, platform_id)` overwrite every descriptive column
/// and bump `updated_at`. Returns the internal `id`, which stays stable
/// across repeated upserts of the same show.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_show(pool: &PgPool, show: &Show) -> Result<i64, DbError> {
    let id: i64 = sqlx::query_scalar::<_, i64>(
        "INSERT INTO shows \
             (platform, platform_id, name, description, author, categories, language, raw_data) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
         ON CONFLICT (platform, platform_id) DO UPDATE SET \
             name        = EXCLUDED.name, \
             description = EXCLUDED.description, \
             author      = EXCLUDED.author, \
             categories  = EXCLUDED.categories, \
             language    = EXCLUDED.language, \
             raw_data    = EXCLUDED.raw_data, \
             updated_at  = NOW() \
         RETURNING id",
    )
    .bind(show.platform.as_str())
    .bind(&show.platform_id)
    .bind(&show.name)
    .bind(&show.description)
    .bind(&show.author)
    .bind(&show.categories)
    .bind(&show.language)
    .bind(json_or_empty_object(&show.raw_data))
    .fetch_one(pool)
    .await?;

    Ok(id)
}

/// Fetches a show by internal `id`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists, or [`DbError::Sqlx`] on query failure.
pub async fn get_show(pool: &PgPool, id: i64) -> Result<ShowRow, DbError> {
    sqlx::query_as::<_, ShowRow>(&format!("SELECT {SHOW_COLUMNS} FROM shows WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(DbError::NotFound)
}

/// Fetches a show by its natural key.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_show_by_platform_id(
    pool: &PgPool,
    platform: Platform,
    platform_id: &str,
) -> Result<Option<ShowRow>, DbError> {
    let row = sqlx::query_as::<_, ShowRow>(&format!(
        "SELECT {SHOW_COLUMNS} FROM shows WHERE platform = $1 AND platform_id = $2"
    ))
    .bind(platform.as_str())
    .bind(platform_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// JSONB columns are `NOT NULL`; a `Value::Null` payload is stored as `{}`.
pub(crate) fn json_or_empty_object(value: &serde_json::Value) -> serde_json::Value {
    if value.is_null() {
        serde_json::Value::Object(serde_json::Map::new())
    } else {
        value.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn null_payload_becomes_empty_object() {
        assert_eq!(json_or_empty_object(&serde_json::Value::Null), json!({}));
        assert_eq!(json_or_empty_object(&json!({"a": 1})), json!({"a": 1}));
    }
}
