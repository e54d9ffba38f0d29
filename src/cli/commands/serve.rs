//! Serve command implementation
//!
//! This module implements the `serve` command, which runs the HTTP trigger
//! endpoint until SIGINT/SIGTERM.

use crate::config::load_config;
use crate::core::run::RunOrchestrator;
use crate::server;
use clap::Args;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;

/// Arguments for the serve command
#[derive(Args, Debug, Default)]
pub struct ServeArgs {
    /// Override the bind address
    #[arg(long)]
    pub bind: Option<String>,

    /// Override the port
    #[arg(short, long)]
    pub port: Option<u16>,
}

impl ServeArgs {
    /// Execute the serve command
    pub async fn execute(
        &self,
        config_path: &str,
        shutdown_signal: watch::Receiver<bool>,
    ) -> anyhow::Result<i32> {
        let mut config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                tracing::error!(error = %e, "Failed to load configuration");
                eprintln!("Failed to load configuration: {e}");
                return Ok(2);
            }
        };

        if let Some(bind) = &self.bind {
            config.server.bind_address = bind.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }

        let addr: SocketAddr =
            match format!("{}:{}", config.server.bind_address, config.server.port).parse() {
                Ok(addr) => addr,
                Err(e) => {
                    eprintln!("Invalid server address: {e}");
                    return Ok(2);
                }
            };

        let orchestrator = match RunOrchestrator::from_config(&config).await {
            Ok(o) => Arc::new(o),
            Err(e) => {
                tracing::error!(error = %e, "Failed to create run orchestrator");
                eprintln!("Failed to initialize: {e}");
                return Ok(4);
            }
        };

        println!("Listening on http://{addr} (POST /api/refresh to start a run)");

        server::serve(orchestrator, addr, wait_for_shutdown(shutdown_signal)).await?;
        Ok(0)
    }
}

async fn wait_for_shutdown(mut shutdown_signal: watch::Receiver<bool>) {
    while !*shutdown_signal.borrow() {
        if shutdown_signal.changed().await.is_err() {
            break;
        }
    }
    tracing::info!("Shutdown signal received, stopping trigger endpoint");
}
