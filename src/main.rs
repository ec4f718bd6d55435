//! Demo HTTP/1.1 server.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client ──TCP──▶ net::listener ──▶ http::server (task per connection)
//!                                            │
//!                                            ▼
//!                                   http::request (parse)
//!                                            │
//!                                            ▼
//!                                   handlers::DemoHandler
//!                                            │
//!     Client ◀──TCP── http::response ◀───────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use raw_http::config::validation::validate_config;
use raw_http::config::{load_config, ConfigError, ServerConfig};
use raw_http::handlers::DemoHandler;
use raw_http::http::ServerBuilder;
use raw_http::lifecycle::signals::wait_for_signal;
use raw_http::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "httpserver")]
#[command(about = "HTTP/1.1 server built on raw TCP streams", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on (overrides the config file).
    #[arg(short, long)]
    port: Option<u16>,

    /// Log level (overrides the config file; RUST_LOG still wins).
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ServerConfig::default(),
    };
    if let Some(port) = cli.port {
        config.listener.port = port;
    }
    if let Some(level) = cli.log_level {
        config.observability.log_level = level;
    }
    validate_config(&config).map_err(ConfigError::Validation)?;

    logging::init(&config.observability.log_level);
    tracing::info!("httpserver v{} starting", env!("CARGO_PKG_VERSION"));

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let server = ServerBuilder::from_config(&config)
        .handler(DemoHandler::new(config.demo.clone()))
        .serve()
        .await?;

    tracing::info!(port = server.local_addr().port(), "Waiting for shutdown signal");

    wait_for_signal().await?;
    server.close();

    tracing::info!("Server gracefully stopped");
    Ok(())
}
