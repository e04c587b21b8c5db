//! `keywords` sub-commands. Keywords only gate non-primary channels.

use clap::Subcommand;

/// Sub-commands available under `keywords`.
#[derive(Debug, Subcommand)]
pub enum KeywordsCommands {
    /// Show a channel's keywords
    List { channel_id: i64 },
    /// Add a keyword (re-adding an existing one reactivates it)
    Add { channel_id: i64, keyword: String },
    /// Remove a keyword; the forecaster-name default cannot be removed
    Remove { channel_id: i64, keyword: String },
}

pub(crate) async fn run(pool: &sqlx::PgPool, command: KeywordsCommands) -> anyhow::Result<()> {
    match command {
        KeywordsCommands::List { channel_id } => {
            ensure_channel(pool, channel_id).await?;
            let rows = ftrack_db::list_keywords(pool, channel_id).await?;
            if rows.is_empty() {
                println!("channel {channel_id} has no keywords; every item passes the filter");
            }
            for row in &rows {
                let mut flags = Vec::new();
                if row.is_default {
                    flags.push("default");
                }
                if !row.is_active {
                    flags.push("inactive");
                }
                println!("{:<32}{}", row.keyword, flags.join(","));
            }
        }
        KeywordsCommands::Add {
            channel_id,
            keyword,
        } => {
            let channel = ensure_channel(pool, channel_id).await?;
            if channel.is_primary {
                println!("note: channel {channel_id} is primary; keywords are not applied to it");
            }
            let row = ftrack_db::add_keyword(pool, channel_id, &keyword, false).await?;
            println!("keyword '{}' active on channel {channel_id}", row.keyword);
        }
        KeywordsCommands::Remove {
            channel_id,
            keyword,
        } => {
            ensure_channel(pool, channel_id).await?;
            if ftrack_db::remove_keyword(pool, channel_id, &keyword).await? {
                println!("keyword '{}' removed from channel {channel_id}", keyword.trim());
            } else {
                println!("channel {channel_id} has no keyword '{}'", keyword.trim());
            }
        }
    }
    Ok(())
}

async fn ensure_channel(pool: &sqlx::PgPool, channel_id: i64) -> anyhow::Result<ftrack_db::ChannelRow> {
    ftrack_db::get_channel(pool, channel_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("channel {channel_id} not found"))
}
