mod api;
mod middleware;
mod scheduler;

use std::sync::Arc;

use ftrack_collector::Collector;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use crate::api::{build_app, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = ftrack_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool_config = ftrack_db::PoolConfig::from_app_config(&config);
    let pool = ftrack_db::connect_pool(&config.database_url, pool_config).await?;
    let applied = ftrack_db::run_migrations(&pool).await?;
    tracing::info!(applied, "migrations up to date");

    let collector = Arc::new(Collector::from_app_config(pool.clone(), &config)?);
    let cancel = CancellationToken::new();
    let mut scheduler = scheduler::build_scheduler(
        Arc::clone(&collector),
        &config.collect_cron,
        cancel.clone(),
    )
    .await?;

    let app = build_app(AppState {
        pool,
        collector: Arc::clone(&collector),
    });

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "ftrack-server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel.clone()))
        .await?;

    cancel.cancel();
    scheduler.shutdown().await?;
    collector.wait_idle().await;
    tracing::info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl-c");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, cancelling collection and draining requests");
    cancel.cancel();
}
