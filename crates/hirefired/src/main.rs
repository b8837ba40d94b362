//! hirefired: a minimal host process for the HireFire agent.
//!
//! Serves a placeholder application with the HireFire middleware in front of
//! it. Web dynos get request queue time reporting; worker dynos declared in
//! the config file are served on the HireFire info endpoint.
//!
//! # Usage
//!
//! ```text
//! HIREFIRE_TOKEN=... hirefired serve --port 3000 --config hirefire.toml
//! ```

mod config;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use clap::{Parser, Subcommand};
use tracing::{error, info};

use hirefire_core::Settings;
use hirefire_middleware::{HireFire, hirefire_middleware};

use crate::config::AgentConfig;

#[derive(Parser)]
#[command(name = "hirefired", about = "HireFire agent host", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the application with the HireFire middleware mounted.
    Serve {
        /// Port to listen on.
        #[arg(long, default_value = "3000")]
        port: u16,

        /// Dyno configuration. Without it only the web dyno is reported.
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,hirefired=debug")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve { port, config } => serve(port, config).await,
    }
}

async fn serve(port: u16, config: Option<PathBuf>) -> anyhow::Result<()> {
    let config = match config {
        Some(path) => {
            let config = AgentConfig::from_file(&path)?;
            info!(path = ?path, workers = config.workers.len(), web = config.web, "config loaded");
            config
        }
        None => AgentConfig {
            web: true,
            ..AgentConfig::default()
        },
    };

    let settings = Settings::from_process_env();
    if settings.token().is_none() {
        info!("HIREFIRE_TOKEN is not set; queue time and info endpoint are disabled");
    }

    let hirefire = Arc::new(config.build(settings)?);
    let web = hirefire.web().cloned();

    let router = app(hirefire);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "hirefired listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "failed to listen for ctrl-c");
            }
            info!("shutdown signal received");
        })
        .await?;

    if let Some(web) = web {
        web.stop_dispatcher().await;
    }

    info!("hirefired stopped");
    Ok(())
}

fn app(hirefire: Arc<HireFire>) -> Router {
    Router::new()
        .route("/", get(|| async { "ok" }))
        .layer(axum::middleware::from_fn_with_state(hirefire, hirefire_middleware))
}
