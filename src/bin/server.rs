use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use tinykv::config::ServerConfig;
use tinykv::server::Server;
use tinykv::store::Store;
use tinykv::Error;

#[derive(Parser, Debug)]
struct Args {
    /// Path to a TOML configuration file
    #[arg(short, long, env = "TINYKV_CONFIG")]
    config: Option<PathBuf>,

    /// The address to listen on (overrides config)
    #[arg(short, long, env = "TINYKV_ADDRESS")]
    address: Option<String>,

    /// Seconds a connection may stay idle before it is closed (overrides config)
    #[arg(long, env = "TINYKV_IDLE_TIMEOUT")]
    idle_timeout: Option<u64>,

    /// Maximum number of connections served at once (overrides config)
    #[arg(long, env = "TINYKV_MAX_CONNECTIONS")]
    max_connections: Option<usize>,

    /// Log filter used when RUST_LOG is not set (overrides config)
    #[arg(long, env = "TINYKV_LOG_LEVEL")]
    log_level: Option<String>,
}

impl Args {
    fn into_config(self) -> Result<ServerConfig, Error> {
        let mut config = match self.config {
            Some(path) => ServerConfig::from_file(&path)?,
            None => ServerConfig::default(),
        };

        if let Some(address) = self.address {
            config.network.address = address;
        }
        if let Some(secs) = self.idle_timeout {
            config.network.idle_timeout = Duration::from_secs(secs);
        }
        if let Some(max_connections) = self.max_connections {
            config.network.max_connections = max_connections;
        }
        if let Some(level) = self.log_level {
            config.logging.level = level;
        }

        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let config = Args::parse().into_config()?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|e| debug!("Failed to initialize global tracing: {}", e));

    let server = Server::bind(&config, Arc::new(Store::new())).await?;

    server
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for shutdown signal: {}", e);
            }
        })
        .await;

    Ok(())
}
