//! `channels` sub-commands.

use chrono::Utc;
use clap::Subcommand;
use ftrack_collector::{find_due_channels, PgStore};
use ftrack_core::Channel;

use crate::fmt_time;

/// Sub-commands available under `channels`.
#[derive(Debug, Subcommand)]
pub enum ChannelsCommands {
    /// List every channel eligible for scheduled collection
    List,
    /// Show the channels the next batch would collect, in batch order
    Due,
}

pub(crate) async fn run(
    pool: &sqlx::PgPool,
    config: &ftrack_core::AppConfig,
    command: ChannelsCommands,
) -> anyhow::Result<()> {
    let channels = match command {
        ChannelsCommands::List => ftrack_db::list_collectable_channels(pool)
            .await?
            .into_iter()
            .map(Channel::try_from)
            .collect::<Result<Vec<_>, _>>()?,
        ChannelsCommands::Due => {
            let store = PgStore::new(pool.clone());
            find_due_channels(&store, Utc::now(), config.batch_size).await?
        }
    };

    if channels.is_empty() {
        println!("no channels found; run `db seed` to load the channels file");
        return Ok(());
    }

    println!("{}", channel_header());
    for channel in &channels {
        println!("{}", channel_line(channel));
    }
    Ok(())
}

pub(crate) fn channel_header() -> String {
    format!(
        "{:<6}{:<9}{:<8}{:<24}{:<18}FORECASTER",
        "ID", "PLATFORM", "ROLE", "EXTERNAL ID", "LAST CHECKED"
    )
}

pub(crate) fn channel_line(channel: &Channel) -> String {
    let role = if channel.is_primary { "primary" } else { "other" };
    format!(
        "{:<6}{:<9}{:<8}{:<24}{:<18}{}",
        channel.id,
        channel.platform.as_str(),
        role,
        channel.external_id,
        fmt_time(channel.settings.last_checked_at),
        channel.forecaster_name
    )
}
