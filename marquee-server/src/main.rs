//! # Marquee Server
//!
//! Serves curated hero pools for a media homepage banner.
//!
//! Configuration comes from `marquee.toml`, the environment (with `.env`
//! support) and CLI flags, in increasing precedence. Without a database URL
//! the server runs on an empty in-memory catalog.

use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use anyhow::Context;
use clap::Parser;
use marquee_server::{
    AppState, create_app,
    infra::{
        config::{ConfigLoad, ConfigLoader, ConfigLoaderOptions},
        startup,
    },
};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// CLI entry point
#[derive(Parser, Debug)]
#[command(name = "marquee-server")]
#[command(about = "Curated hero pools for media homepages")]
struct Cli {
    /// Path to marquee.toml
    #[arg(long, env = "MARQUEE_CONFIG_PATH")]
    config: Option<PathBuf>,

    /// Alternate .env file
    #[arg(long)]
    env_file: Option<PathBuf>,

    /// Server port (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Server host (overrides config)
    #[arg(long)]
    host: Option<String>,

    /// Hero policy JSON file (overrides config)
    #[arg(long)]
    policy: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let loader = ConfigLoader::with_options(ConfigLoaderOptions {
        config_path: cli.config.clone(),
        env_file: cli.env_file.clone(),
    });
    let ConfigLoad {
        mut config,
        warnings,
    } = loader.load().context("failed to load configuration")?;

    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(host) = cli.host.clone() {
        config.server.host = host;
    }
    if let Some(policy) = cli.policy.clone() {
        config.policy.path = Some(policy);
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| {
                    "info,marquee_core=info,tower_http=warn".into()
                }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if config.metadata.env_file_loaded {
        info!("loaded .env file");
    }
    if let Some(path) = &config.metadata.config_path {
        info!(path = %path.display(), "configuration file loaded");
    }
    for warning in &warnings.items {
        match &warning.hint {
            Some(hint) => {
                warn!(message = %warning.message, hint = %hint, "configuration warning")
            }
            None => warn!(message = %warning.message, "configuration warning"),
        }
    }

    let hero = Arc::new(
        startup::build_hero_service(&config)
            .await
            .context("failed to initialise hero pool service")?,
    );

    let config = Arc::new(config);
    let state = AppState::new(hero, config.clone());

    #[cfg(unix)]
    spawn_provider_reload(loader, state.clone());

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .with_context(|| {
            format!(
                "invalid listen address {}:{}",
                config.server.host, config.server.port
            )
        })?;

    let app = create_app(state);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Starting Marquee server on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server stopped");
    Ok(())
}

/// Re-read the configuration on SIGHUP and rebind the metadata provider.
///
/// Builds already in flight keep the provider they started with.
#[cfg(unix)]
fn spawn_provider_reload(loader: ConfigLoader, state: AppState) {
    use tokio::signal::unix::{SignalKind, signal};

    tokio::spawn(async move {
        let mut hangup = match signal(SignalKind::hangup()) {
            Ok(stream) => stream,
            Err(err) => {
                warn!(error = %err, "SIGHUP handler unavailable; provider reload disabled");
                return;
            }
        };

        while hangup.recv().await.is_some() {
            match reload_provider(&loader, &state) {
                Ok(()) => info!("metadata provider reloaded"),
                Err(err) => {
                    warn!(error = %err, "provider reload failed; keeping current provider")
                }
            }
        }
    });
}

#[cfg(unix)]
fn reload_provider(loader: &ConfigLoader, state: &AppState) -> anyhow::Result<()> {
    let ConfigLoad { config, .. } = loader.load()?;
    let provider = startup::build_provider(&config.tmdb)?;
    state.hero.rebind_provider(provider);
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(
            tokio::signal::unix::SignalKind::terminate(),
        ) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received");
}
