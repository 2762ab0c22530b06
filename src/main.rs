use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::info;

use gemini_relay::cli::Cli;
use gemini_relay::logging::{init_logging, LoggingConfig};
use gemini_relay::{build_router, ConfigBuilder, Container, ContainerConfig};

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is normal in deployed environments.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let builder = ConfigBuilder::from_env();
    let _log_guard = init_logging(&LoggingConfig {
        verbose: cli.verbose,
        log_dir: builder.log_dir(),
    });

    let mut app = builder.build();
    if let Some(host) = cli.host {
        app.server.host = host;
    }
    if let Some(port) = cli.port {
        app.server.port = port;
    }
    let address = app.server.bind_address();
    info!("Starting Gemini relay in {} mode", app.mode.as_str());

    let container = Container::new(ContainerConfig {
        app,
        mock_provider: cli.mock_provider,
    })
    .await?;
    let router = build_router(Arc::new(container));

    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {address}"))?;
    info!("Listening on http://{address}");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {e}");
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

    info!("Shutdown signal received");
}
