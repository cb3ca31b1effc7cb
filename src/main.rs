mod config;
mod modules;
mod publication;
mod web;

pub use web::AppState;

use anyhow::{Context, Result};
use clap::Parser;
use dotenvy::dotenv;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::config::{Cli, ServerConfig};

#[tokio::main]
async fn main() {
    dotenv().ok();
    let cli = Cli::parse();
    init_tracing();

    if let Err(err) = app_main(cli).await {
        error!(?err, "application error");
        std::process::exit(1);
    }
}

async fn app_main(cli: Cli) -> Result<()> {
    let config = ServerConfig::from_env(&cli)?;
    web::ensure_directory(&config.upload_dir).await?;

    let addr = config.socket_addr();
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind listener on {addr}"))?;

    info!("Server started at {}", config.public_base_url());
    info!(%addr, upload_dir = %config.upload_dir.display(), "listening");
    info!("Press Ctrl+C to stop the server");

    let app = web::router::build_router(AppState::new(config));
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(?err, "failed to listen for interrupt signal");
        std::future::pending::<()>().await;
    }
    info!("Shutting down server...");
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}
