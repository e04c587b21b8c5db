//! Database operations for `channel_keywords`.
//!
//! Keywords are unique per channel after trimming and lowercasing, matching
//! how the filter compares them.

use chrono::{DateTime, Utc};
use ftrack_core::keywords::normalize_keyword;
use sqlx::{PgExecutor, PgPool};

use crate::DbError;

/// A row from the `channel_keywords` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct KeywordRow {
    pub id: i64,
    pub channel_id: i64,
    pub keyword: String,
    pub is_active: bool,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
}

/// Active keywords for a channel, oldest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_active_keywords<'e, E>(
    executor: E,
    channel_id: i64,
) -> Result<Vec<KeywordRow>, DbError>
where
    E: PgExecutor<'e>,
{
    let rows = sqlx::query_as::<_, KeywordRow>(
        "SELECT id, channel_id, keyword, is_active, is_default, created_at \
         FROM channel_keywords \
         WHERE channel_id = $1 AND is_active = true \
         ORDER BY id",
    )
    .bind(channel_id)
    .fetch_all(executor)
    .await?;

    Ok(rows)
}

/// All keywords for a channel, including inactive ones.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_keywords(pool: &PgPool, channel_id: i64) -> Result<Vec<KeywordRow>, DbError> {
    let rows = sqlx::query_as::<_, KeywordRow>(
        "SELECT id, channel_id, keyword, is_active, is_default, created_at \
         FROM channel_keywords \
         WHERE channel_id = $1 \
         ORDER BY id",
    )
    .bind(channel_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Adds a keyword to a channel. Re-adding an existing keyword (in any case)
/// reactivates it and returns the existing row.
///
/// # Errors
///
/// Returns [`DbError::BlankKeyword`] for blank input or [`DbError::Sqlx`] if
/// the upsert fails.
pub async fn add_keyword<'e, E>(
    executor: E,
    channel_id: i64,
    keyword: &str,
    is_default: bool,
) -> Result<KeywordRow, DbError>
where
    E: PgExecutor<'e>,
{
    let keyword = normalize_keyword(keyword).ok_or(DbError::BlankKeyword)?;

    let row = sqlx::query_as::<_, KeywordRow>(
        "INSERT INTO channel_keywords (channel_id, keyword, is_default) \
         VALUES ($1, $2, $3) \
         ON CONFLICT (channel_id, (lower(btrim(keyword)))) DO UPDATE \
           SET is_active = true, \
               is_default = channel_keywords.is_default OR EXCLUDED.is_default \
         RETURNING id, channel_id, keyword, is_active, is_default, created_at",
    )
    .bind(channel_id)
    .bind(&keyword)
    .bind(is_default)
    .fetch_one(executor)
    .await?;

    Ok(row)
}

/// Removes a keyword from a channel. Returns `false` if the channel had no
/// such keyword.
///
/// # Errors
///
/// Returns [`DbError::DefaultKeyword`] when the keyword is the channel's
/// default, or [`DbError::Sqlx`] if the delete fails.
pub async fn remove_keyword(pool: &PgPool, channel_id: i64, keyword: &str) -> Result<bool, DbError> {
    let Some(normalized) = normalize_keyword(keyword) else {
        return Ok(false);
    };

    let existing = sqlx::query_as::<_, KeywordRow>(
        "SELECT id, channel_id, keyword, is_active, is_default, created_at \
         FROM channel_keywords \
         WHERE channel_id = $1 AND lower(btrim(keyword)) = lower($2)",
    )
    .bind(channel_id)
    .bind(&normalized)
    .fetch_optional(pool)
    .await?;

    let Some(row) = existing else {
        return Ok(false);
    };

    if row.is_default {
        return Err(DbError::DefaultKeyword {
            channel_id,
            keyword: row.keyword,
        });
    }

    sqlx::query("DELETE FROM channel_keywords WHERE id = $1")
        .bind(row.id)
        .execute(pool)
        .await?;

    Ok(true)
}
