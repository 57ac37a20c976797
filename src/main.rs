use anyhow::Context;
use axion::cli::{Cli, Commands, run_policy, run_school};
use axion::logging::init_tracing;
use axion::metrics::init_metrics;
use axion::router::init_router;
use axion::state::{AppConfig, init_app_state};
use clap::Parser;
use dotenvy::dotenv;
use std::net::SocketAddr;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let cli = Cli::parse();

    init_tracing();
    let config = AppConfig::from_env()?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config).await,
        Commands::Policy(command) => run_policy(command, &config).await,
        Commands::School(command) => run_school(command, &config).await,
    }
}

async fn serve(config: AppConfig) -> anyhow::Result<()> {
    let metrics = init_metrics().context("Failed to install metrics recorder")?;
    let state = init_app_state(&config).await?.with_metrics(metrics);
    let app = init_router(state);

    let address = config.server.address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;
    info!(address = %address, "Server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
