//! CATDOG bootnode daemon.

use std::time::Duration;

use anyhow::Result;
use catdog_node::cli::Cli;
use catdog_node::{NodeConfig, NodeService};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// How long the service gets to close the engines and stop the API.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
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
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}

fn load_config(cli: &Cli) -> Result<NodeConfig> {
    let mut config = match cli.config_path() {
        Some(path) => NodeConfig::load_or_create(&path)?,
        None => NodeConfig::from_env()?,
    };
    cli.apply(&mut config);
    config.validate()?;
    Ok(config)
}

fn init_logging(config: &NodeConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.log.level)?,
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(config.log.color)
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    init_logging(&config)?;

    info!("Starting CATDOG bootnode...");
    if let Some(path) = cli.config_path() {
        info!("Using config from: {}", path.display());
    }

    let service = match NodeService::new(config).await {
        Ok(s) => {
            info!("Node service initialized successfully");
            s
        }
        Err(e) => {
            error!("Failed to create node service: {:#}", e);
            return Err(e);
        }
    };

    let shutdown_trigger = service.shutdown_trigger();
    let mut run_handle = tokio::spawn(async move { service.run().await });

    tokio::select! {
        result = &mut run_handle => {
            match result {
                Ok(Ok(())) => {
                    info!("Node stopped gracefully");
                    Ok(())
                }
                Ok(Err(e)) => {
                    error!("Service error: {:#}", e);
                    Err(e)
                }
                Err(e) => {
                    error!("Service task panicked: {}", e);
                    Err(e.into())
                }
            }
        }
        _ = shutdown_signal() => {
            info!("Initiating graceful shutdown...");
            let _ = shutdown_trigger.send(true);

            match tokio::time::timeout(SHUTDOWN_TIMEOUT, run_handle).await {
                Ok(Ok(Ok(()))) => {
                    info!("Node stopped gracefully");
                    Ok(())
                }
                Ok(Ok(Err(e))) => {
                    error!("Service error during shutdown: {:#}", e);
                    Err(e)
                }
                Ok(Err(e)) => {
                    error!("Service task panicked: {}", e);
                    Err(e.into())
                }
                Err(_) => {
                    error!("Shutdown timeout, forcing exit");
                    Err(anyhow::anyhow!("Shutdown timeout"))
                }
            }
        }
    }
}
