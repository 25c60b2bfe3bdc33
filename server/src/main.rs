use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use ytdlp_server::{build_app, config::ServerConfig, AppState};

/// HTTP API that drives yt-dlp through uvx and manages the downloaded files
#[derive(Debug, Parser)]
#[command(name = "ytdlp-server", version)]
struct Args {
    /// Path to the TOML config file
    #[arg(short, long, env = "YTDLP_CONFIG", default_value = "config.toml")]
    config: PathBuf,

    /// Bind address, overrides `bind` from the config file
    #[arg(long)]
    bind: Option<String>,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let default_filter = if args.debug {
        "ytdlp_server=debug,joblib=debug,info"
    } else {
        "info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut config = ServerConfig::load(&args.config)
        .with_context(|| format!("load config {}", args.config.display()))?;
    if let Some(bind) = args.bind {
        config.bind = bind;
    }
    config.ensure_download_dir()?;

    let state = AppState::new(config);
    match &state.uvx {
        Some(uvx) => info!(uvx = %uvx.display(), "using uvx"),
        None => warn!(
            "could not locate uvx; install it or set {}",
            ytdlp_server::config::UVX_PATH_ENV
        ),
    }
    let bind = state.config.bind.clone();
    let app = build_app(Arc::new(state));

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("bind {}", bind))?;
    info!(%bind, "ytdlp-server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serve")
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}
