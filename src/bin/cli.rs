use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader};

use tinykv::client::Client;
use tinykv::config::ClientConfig;
use tinykv::Error;

#[derive(Parser, Debug)]
struct Args {
    /// Path to a TOML configuration file
    #[arg(short, long, env = "TINYKV_CONFIG")]
    config: Option<PathBuf>,

    /// The server address (overrides config)
    #[arg(short, long, env = "TINYKV_ADDRESS")]
    address: Option<String>,

    /// Seconds to wait on each request and response (overrides config)
    #[arg(long, env = "TINYKV_IDLE_TIMEOUT")]
    idle_timeout: Option<u64>,
}

impl Args {
    fn into_config(self) -> Result<ClientConfig, Error> {
        let mut config = match self.config {
            Some(path) => ClientConfig::from_file(&path)?,
            None => ClientConfig::default(),
        };

        if let Some(address) = self.address {
            config.network.address = address;
        }
        if let Some(secs) = self.idle_timeout {
            config.network.idle_timeout = Duration::from_secs(secs);
        }

        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let _ = tracing_subscriber::fmt().with_writer(std::io::stderr).try_init();

    let config = Args::parse().into_config()?;
    let mut client = Client::connect(&config).await?;

    let mut stdout = io::stdout();
    stdout
        .write_all(
            format!(
                "Connected to {}\nAvailable commands:\n  SET key value\n  GET key\n  DEL key\nType 'exit' to quit\n\n",
                client.address()
            )
            .as_bytes(),
        )
        .await?;

    let mut lines = BufReader::new(io::stdin()).lines();
    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        let input = line.trim();
        if input == "exit" {
            break;
        }
        if input.is_empty() {
            continue;
        }

        let response = client.send(format!("{}\n", input).as_bytes()).await?;
        stdout.write_all(&response).await?;
    }

    client.close().await?;
    Ok(())
}
