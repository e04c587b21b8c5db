mod channels;
mod collect;
mod db;
mod jobs;
mod keywords;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::channels::ChannelsCommands;
use crate::collect::CollectCommands;
use crate::db::DbCommands;
use crate::keywords::KeywordsCommands;

#[derive(Debug, Parser)]
#[command(name = "ftrack-cli")]
#[command(about = "Forecaster channel collection command line interface")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Database connectivity, migrations, and seeding
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
    /// Inspect tracked channels
    Channels {
        #[command(subcommand)]
        command: ChannelsCommands,
    },
    /// Run collection jobs
    Collect {
        #[command(subcommand)]
        command: CollectCommands,
    },
    /// List recent collection jobs
    Jobs {
        /// Only show jobs for this channel id
        #[arg(long)]
        channel: Option<i64>,
        /// Maximum number of jobs to show
        #[arg(long, default_value = "20")]
        limit: i64,
    },
    /// Manage keyword filters on non-primary channels
    Keywords {
        #[command(subcommand)]
        command: KeywordsCommands,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        println!("ftrack-cli: no command given; run with --help for usage");
        return Ok(());
    };

    let config = ftrack_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool_config = ftrack_db::PoolConfig::from_app_config(&config);
    let pool = ftrack_db::connect_pool(&config.database_url, pool_config).await?;

    match command {
        Commands::Db { command } => db::run(&pool, &config, command).await,
        Commands::Channels { command } => channels::run(&pool, &config, command).await,
        Commands::Collect { command } => collect::run(pool, &config, command).await,
        Commands::Jobs { channel, limit } => jobs::run_jobs(&pool, channel, limit).await,
        Commands::Keywords { command } => keywords::run(&pool, command).await,
    }
}

/// Format an optional timestamp for display; `None` renders as a dash.
fn fmt_time(at: Option<chrono::DateTime<chrono::Utc>>) -> String {
    at.map_or_else(
        || "\u{2014}".to_string(),
        |t| t.format("%Y-%m-%d %H:%M").to_string(),
    )
}
