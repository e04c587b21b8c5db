use ftrack_core::channel_url::parse_channel_url;
use ftrack_core::channels_file::ChannelsFile;
use ftrack_core::keywords::normalize_keyword;
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

/// Counts of rows touched by a seed run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub forecasters: usize,
    pub channels: usize,
    pub keywords: usize,
}

/// Upsert forecasters, channels and keywords from a validated channels file.
///
/// All upserts run inside a single transaction; if any operation fails the
/// whole seed is rolled back. Existing primary flags for a seeded forecaster
/// are cleared first so a file that moves the primary role between channels
/// does not trip the one-primary-per-platform index mid-transaction.
///
/// Non-primary channels always get the forecaster name as a default keyword.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any database operation fails, or
/// [`DbError::Decode`] if a channel URL cannot be parsed.
pub async fn seed_channels(pool: &PgPool, file: &ChannelsFile) -> Result<SeedSummary, DbError> {
    let mut tx = pool.begin().await?;
    let mut summary = SeedSummary::default();

    for forecaster in &file.forecasters {
        let forecaster_id: i64 = sqlx::query_scalar(
            "INSERT INTO forecasters (public_id, name, slug, is_verified) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (slug) DO UPDATE SET \
                 name = EXCLUDED.name, \
                 is_verified = EXCLUDED.is_verified, \
                 updated_at = NOW() \
             RETURNING id",
        )
        .bind(Uuid::new_v4())
        .bind(forecaster.name.trim())
        .bind(forecaster.slug())
        .bind(forecaster.verified)
        .fetch_one(&mut *tx)
        .await?;
        summary.forecasters += 1;

        sqlx::query(
            "UPDATE channels SET is_primary = false, updated_at = NOW() \
             WHERE forecaster_id = $1 AND is_primary",
        )
        .bind(forecaster_id)
        .execute(&mut *tx)
        .await?;

        for channel in &forecaster.channels {
            let parsed = parse_channel_url(&channel.url)?;
            let display_name = channel
                .display_name
                .as_deref()
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .unwrap_or(parsed.external_id.as_str());

            let channel_id: i64 = sqlx::query_scalar(
                "INSERT INTO channels \
                     (public_id, forecaster_id, platform, external_id, display_name, url, \
                      is_primary, check_interval_secs, collection_enabled, is_active) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, true) \
                 ON CONFLICT ON CONSTRAINT channels_platform_external_forecaster_key DO UPDATE SET \
                     display_name = EXCLUDED.display_name, \
                     url = EXCLUDED.url, \
                     is_primary = EXCLUDED.is_primary, \
                     check_interval_secs = EXCLUDED.check_interval_secs, \
                     collection_enabled = EXCLUDED.collection_enabled, \
                     is_active = true, \
                     updated_at = NOW() \
                 RETURNING id",
            )
            .bind(Uuid::new_v4())
            .bind(forecaster_id)
            .bind(parsed.platform.as_str())
            .bind(&parsed.external_id)
            .bind(display_name)
            .bind(&parsed.canonical_url)
            .bind(channel.primary)
            .bind(channel.check_interval_secs)
            .bind(channel.enabled)
            .fetch_one(&mut *tx)
            .await?;
            summary.channels += 1;

            let mut keywords: Vec<(String, bool)> = Vec::new();
            if !channel.primary {
                if let Some(default) = normalize_keyword(&forecaster.name) {
                    keywords.push((default, true));
                }
            }
            keywords.extend(
                channel
                    .keywords
                    .iter()
                    .filter_map(|k| normalize_keyword(k))
                    .map(|k| (k, false)),
            );

            for (keyword, is_default) in keywords {
                sqlx::query(
                    "INSERT INTO channel_keywords (channel_id, keyword, is_default) \
                     VALUES ($1, $2, $3) \
                     ON CONFLICT (channel_id, (lower(btrim(keyword)))) DO UPDATE SET \
                         is_active = true, \
                         is_default = channel_keywords.is_default OR EXCLUDED.is_default",
                )
                .bind(channel_id)
                .bind(&keyword)
                .bind(is_default)
                .execute(&mut *tx)
                .await?;
                summary.keywords += 1;
            }
        }
    }

    tx.commit().await?;
    Ok(summary)
}
