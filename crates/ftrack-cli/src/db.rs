//! `db` sub-commands: connectivity, migrations, and seeding from the channels
//! file.

use clap::Subcommand;

/// Sub-commands available under `db`.
#[derive(Debug, Subcommand)]
pub enum DbCommands {
    /// Check that the database is reachable
    Ping,
    /// Apply pending migrations
    Migrate,
    /// Upsert forecasters, channels, and keywords from the channels file
    Seed,
}

pub(crate) async fn run(
    pool: &sqlx::PgPool,
    config: &ftrack_core::AppConfig,
    command: DbCommands,
) -> anyhow::Result<()> {
    match command {
        DbCommands::Ping => {
            ftrack_db::ping(pool).await?;
            println!("database reachable");
        }
        DbCommands::Migrate => {
            let applied = ftrack_db::run_migrations(pool).await?;
            println!("applied {applied} migration(s)");
        }
        DbCommands::Seed => run_seed(pool, config).await?,
    }
    Ok(())
}

/// Load `FTRACK_CHANNELS_PATH` and upsert its contents in one transaction.
///
/// # Errors
///
/// Returns an error if the file cannot be read or validated, or if any
/// upsert fails (nothing is written in that case).
async fn run_seed(pool: &sqlx::PgPool, config: &ftrack_core::AppConfig) -> anyhow::Result<()> {
    let file = ftrack_core::channels_file::load_channels_file(&config.channels_path)?;
    let summary = ftrack_db::seed_channels(pool, &file).await?;
    tracing::info!(
        path = %config.channels_path.display(),
        forecasters = summary.forecasters,
        channels = summary.channels,
        keywords = summary.keywords,
        "seed complete"
    );
    println!(
        "seeded {} forecaster(s), {} channel(s), {} keyword(s) from {}",
        summary.forecasters,
        summary.channels,
        summary.keywords,
        config.channels_path.display()
    );
    Ok(())
}
