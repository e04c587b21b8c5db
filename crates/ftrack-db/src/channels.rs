//! Database operations for `channels`.

use chrono::{DateTime, Utc};
use ftrack_core::{Channel, CollectionSettings, Platform};
use sqlx::{PgConnection, PgExecutor, PgPool};
use uuid::Uuid;

use crate::keywords::{add_keyword, list_active_keywords, KeywordRow};
use crate::{unique_violation, DbError};

const PRIMARY_PER_PLATFORM_INDEX: &str = "channels_one_primary_per_platform";
const CHANNEL_IDENTITY_KEY: &str = "channels_platform_external_forecaster_key";

const CHANNEL_SELECT: &str = "SELECT c.id, c.public_id, c.forecaster_id, \
            f.name AS forecaster_name, f.is_verified AS forecaster_verified, \
            c.platform, c.external_id, c.display_name, c.url, c.is_primary, c.is_active, \
            c.check_interval_secs, c.last_checked_at, c.collection_enabled, \
            c.created_at, c.updated_at \
     FROM channels c \
     JOIN forecasters f ON f.id = c.forecaster_id";

/// A row from `channels` joined with its owning forecaster.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ChannelRow {
    pub id: i64,
    pub public_id: Uuid,
    pub forecaster_id: i64,
    pub forecaster_name: String,
    pub forecaster_verified: bool,
    pub platform: String,
    pub external_id: String,
    pub display_name: String,
    pub url: Option<String>,
    pub is_primary: bool,
    pub is_active: bool,
    pub check_interval_secs: i64,
    pub last_checked_at: Option<DateTime<Utc>>,
    pub collection_enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<ChannelRow> for Channel {
    type Error = DbError;

    fn try_from(row: ChannelRow) -> Result<Self, Self::Error> {
        Ok(Channel {
            id: row.id,
            forecaster_id: row.forecaster_id,
            forecaster_name: row.forecaster_name,
            platform: row.platform.parse::<Platform>()?,
            external_id: row.external_id,
            display_name: row.display_name,
            url: row.url,
            is_primary: row.is_primary,
            is_active: row.is_active,
            settings: CollectionSettings {
                check_interval_secs: row.check_interval_secs,
                last_checked_at: row.last_checked_at,
                enabled: row.collection_enabled,
            },
        })
    }
}

/// Fields needed to register a channel.
#[derive(Debug, Clone)]
pub struct NewChannel<'a> {
    pub forecaster_id: i64,
    pub platform: Platform,
    pub external_id: &'a str,
    pub display_name: &'a str,
    pub url: Option<&'a str>,
    pub is_primary: bool,
    pub check_interval_secs: i64,
    pub collection_enabled: bool,
}

/// Returns every channel eligible for scheduled collection: active,
/// collection enabled, and owned by a verified forecaster.
///
/// Due filtering happens in the scheduler so that the ordering and the
/// batch cap stay in one place.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_collectable_channels(pool: &PgPool) -> Result<Vec<ChannelRow>, DbError> {
    let rows = sqlx::query_as::<_, ChannelRow>(&format!(
        "{CHANNEL_SELECT} \
         WHERE c.is_active = true AND c.collection_enabled = true AND f.is_verified = true \
         ORDER BY c.id"
    ))
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Fetches one channel by id, regardless of its active or enabled flags.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_channel<'e, E>(executor: E, id: i64) -> Result<Option<ChannelRow>, DbError>
where
    E: PgExecutor<'e>,
{
    let row = sqlx::query_as::<_, ChannelRow>(&format!("{CHANNEL_SELECT} WHERE c.id = $1"))
        .bind(id)
        .fetch_optional(executor)
        .await?;

    Ok(row)
}

/// Inserts a channel and returns it joined with its forecaster.
///
/// # Errors
///
/// Returns [`DbError::PrimaryChannelExists`] when the forecaster already has
/// a primary channel on that platform, [`DbError::ChannelExists`] when the
/// channel is already registered, or [`DbError::Sqlx`] otherwise.
pub async fn insert_channel(pool: &PgPool, new: &NewChannel<'_>) -> Result<ChannelRow, DbError> {
    let mut conn = pool.acquire().await?;
    insert_channel_on(&mut conn, new).await
}

/// Inserts a channel and its keywords in one transaction, returning the
/// channel and its active keywords. `default_keyword` is stored as a
/// default keyword that cannot be removed later.
///
/// # Errors
///
/// Returns the same errors as [`insert_channel`], plus
/// [`DbError::BlankKeyword`] for a blank keyword. Nothing is written on error.
pub async fn register_channel(
    pool: &PgPool,
    new: &NewChannel<'_>,
    default_keyword: Option<&str>,
    keywords: &[String],
) -> Result<(ChannelRow, Vec<KeywordRow>), DbError> {
    let mut tx = pool.begin().await?;

    let channel = insert_channel_on(&mut tx, new).await?;
    if let Some(keyword) = default_keyword {
        add_keyword(&mut *tx, channel.id, keyword, true).await?;
    }
    for keyword in keywords {
        add_keyword(&mut *tx, channel.id, keyword, false).await?;
    }
    let active = list_active_keywords(&mut *tx, channel.id).await?;

    tx.commit().await?;
    Ok((channel, active))
}

async fn insert_channel_on(
    conn: &mut PgConnection,
    new: &NewChannel<'_>,
) -> Result<ChannelRow, DbError> {
    let public_id = Uuid::new_v4();

    let inserted = sqlx::query_scalar::<_, i64>(
        "INSERT INTO channels \
             (public_id, forecaster_id, platform, external_id, display_name, url, \
              is_primary, check_interval_secs, collection_enabled) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
         RETURNING id",
    )
    .bind(public_id)
    .bind(new.forecaster_id)
    .bind(new.platform.as_str())
    .bind(new.external_id)
    .bind(new.display_name)
    .bind(new.url)
    .bind(new.is_primary)
    .bind(new.check_interval_secs)
    .bind(new.collection_enabled)
    .fetch_one(&mut *conn)
    .await;

    let id = match inserted {
        Ok(id) => id,
        Err(err) => {
            return Err(match unique_violation(&err) {
                Some(PRIMARY_PER_PLATFORM_INDEX) => DbError::PrimaryChannelExists {
                    forecaster_id: new.forecaster_id,
                    platform: new.platform.to_string(),
                },
                Some(CHANNEL_IDENTITY_KEY) => DbError::ChannelExists {
                    platform: new.platform.to_string(),
                    external_id: new.external_id.to_string(),
                },
                _ => err.into(),
            })
        }
    };

    get_channel(&mut *conn, id).await?.ok_or(DbError::NotFound)
}

/// Records the start time of the latest collection attempt.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the channel does not exist.
pub async fn touch_channel_last_checked(
    pool: &PgPool,
    id: i64,
    checked_at: DateTime<Utc>,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE channels SET last_checked_at = $2, updated_at = NOW() WHERE id = $1",
    )
    .bind(id)
    .bind(checked_at)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}

/// Deactivates a channel. Its jobs and collected items are kept.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the channel does not exist.
pub async fn deactivate_channel(pool: &PgPool, id: i64) -> Result<(), DbError> {
    let result =
        sqlx::query("UPDATE channels SET is_active = false, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}
