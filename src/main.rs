//! Kartvy backend - proxies tiles, POIs, chat and statistics for the map client

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use log::info;

mod api;
mod cache;
mod chat;
mod client;
mod config;
mod employment;
mod error;
mod pois;

use config::Config;
use error::Result;

/// Kartvy backend server
#[derive(Parser, Debug)]
#[command(name = "kartvy")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Address to listen on (overrides the config file)
    #[arg(long, env = "KARTVY_LISTEN", hide_env = true)]
    listen: Option<String>,

    /// Override config file location
    #[arg(long, env = "KARTVY_CONFIG", hide_env = true)]
    config: Option<PathBuf>,

    /// Directory with the built frontend assets
    #[arg(long, env = "KARTVY_STATIC_DIR", hide_env = true)]
    static_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, env = "KARTVY_DEBUG", hide_env = true)]
    debug: bool,
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("Error: {}", err);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.debug { "kartvy=debug" } else { "kartvy=info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let mut config = match cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    config.apply_env_overrides();
    if let Some(listen) = cli.listen {
        config.listen = listen;
    }
    if let Some(static_dir) = cli.static_dir {
        config.static_dir = static_dir;
    }

    let listen = config.listen.clone();
    let state = Arc::new(api::AppState::build(config)?);
    let app = api::router(state);

    let listener = tokio::net::TcpListener::bind(&listen).await?;
    info!("kartvy {} listening on {}", env!("CARGO_PKG_VERSION"), listen);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
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
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received");
}
