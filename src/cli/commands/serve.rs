use anyhow::Context;
use clap::Args;
use tracing::info;

use crate::app::{app, AppState};
use crate::config::{config, AppConfig, DatabaseBackend};

#[derive(Debug, Args)]
pub struct ServeArgs {
    #[arg(long, help = "Bind address (overrides TASK_API_HOST)")]
    pub host: Option<String>,

    #[arg(long, short, help = "Port (overrides TASK_API_PORT / PORT)")]
    pub port: Option<u16>,

    #[arg(long, help = "Procedure backend: memory or postgres")]
    pub backend: Option<DatabaseBackend>,
}

impl ServeArgs {
    fn apply(&self, mut config: AppConfig) -> AppConfig {
        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(backend) = self.backend {
            config.database.backend = backend;
        }
        config
    }
}

pub async fn handle(args: ServeArgs) -> anyhow::Result<()> {
    let config = args.apply(config().clone());
    info!(
        "Starting Task API in {:?} mode ({:?} backend, {:?} credentials)",
        config.environment, config.database.backend, config.security.credential_mode
    );

    let state = AppState::from_config(&config)
        .await
        .context("failed to initialise application state")?;
    let router = app(state, &config);

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;
    info!("Task API listening on http://{}", bind_addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("Task API stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
