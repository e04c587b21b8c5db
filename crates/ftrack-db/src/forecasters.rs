//! Database operations for `forecasters`.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

/// A row from the `forecasters` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ForecasterRow {
    pub id: i64,
    pub public_id: Uuid,
    pub name: String,
    pub slug: String,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Inserts a forecaster or updates name and verification for an existing
/// slug. Returns the forecaster id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_forecaster(
    pool: &PgPool,
    name: &str,
    slug: &str,
    is_verified: bool,
) -> Result<i64, DbError> {
    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO forecasters (public_id, name, slug, is_verified) \
         VALUES ($1, $2, $3, $4) \
         ON CONFLICT (slug) DO UPDATE \
           SET name = EXCLUDED.name, is_verified = EXCLUDED.is_verified, updated_at = NOW() \
         RETURNING id",
    )
    .bind(Uuid::new_v4())
    .bind(name)
    .bind(slug)
    .bind(is_verified)
    .fetch_one(pool)
    .await?;

    Ok(id)
}

/// Looks up a forecaster by slug.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_forecaster_by_slug(
    pool: &PgPool,
    slug: &str,
) -> Result<Option<ForecasterRow>, DbError> {
    let row = sqlx::query_as::<_, ForecasterRow>(
        "SELECT id, public_id, name, slug, is_verified, created_at, updated_at \
         FROM forecasters WHERE slug = $1",
    )
    .bind(slug)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}
