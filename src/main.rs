use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use milyst_api::config::{self, Environment};
use milyst_api::frontend::DevServer;
use milyst_api::{app, connect_store, AppState};

#[derive(Parser, Debug)]
#[command(name = "milyst-api", about = "Multi-tenant API with tenant-scoped records")]
struct Args {
    /// Port to listen on (overrides API_PORT)
    #[arg(long)]
    port: Option<u16>,

    /// Runtime environment: development, staging or production
    #[arg(long, env = "APP_ENV")]
    env: Option<Environment>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, APP_ENV, etc.
    let _ = dotenvy::dotenv();

    let args = Args::parse();
    if let Some(env) = args.env {
        std::env::set_var("APP_ENV", env.as_str());
    }

    // Initialize configuration (this loads the config singleton)
    let config = config::config().clone();

    let default_filter = if config.is_development() {
        "info,milyst_api=debug,tower_http=debug"
    } else {
        "info"
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting MiLyst API in {:?} mode", config.environment);

    let storage = connect_store(&config).await?;

    let dev_server = if config.is_development() && config.frontend.spawn_dev_server {
        DevServer::ensure_running(&config.frontend).await
    } else {
        None
    };

    let port = args.port.unwrap_or(config.api.port);
    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|e| anyhow::anyhow!("failed to bind {}: {}", bind_addr, e))?;

    tracing::info!("MiLyst API listening on http://{}", bind_addr);

    axum::serve(listener, app(AppState::new(config, storage.store.clone())))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(dev_server) = dev_server {
        dev_server.stop().await;
    }
    storage.close().await;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, shutting down");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down");
        }
    }
}
