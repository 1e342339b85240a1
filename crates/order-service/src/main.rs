//! Main entry point for the order desk service.
//!
//! Loads the configuration, opens the configured storage backend and serves
//! the order API until interrupted.

use clap::Parser;
use order_config::Config;
use order_service::{build_collection, start_server, AppState};
use std::path::PathBuf;

/// Command-line arguments for the order desk service.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, default_value = "config/orders.toml")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,

	/// Port to listen on, overriding `api.port`
	#[arg(long, env = "PORT")]
	port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	use tracing_subscriber::{fmt, EnvFilter};

	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

	fmt()
		.with_env_filter(env_filter)
		.with_thread_ids(true)
		.with_target(true)
		.init();

	tracing::info!("Started order desk");

	let config_path = args
		.config
		.to_str()
		.ok_or("configuration path is not valid UTF-8")?;
	let mut config = Config::from_file(config_path).await?;
	if let Some(port) = args.port {
		config.api.port = port;
	}
	tracing::info!("Loaded configuration [{}]", config.service.id);

	let collection = build_collection(&config.storage)?;
	let state = AppState::new(config, collection);

	start_server(state, shutdown_signal()).await?;

	tracing::info!("Stopped order desk");
	Ok(())
}

/// Resolves when the process receives Ctrl-C.
async fn shutdown_signal() {
	match tokio::signal::ctrl_c().await {
		Ok(()) => tracing::info!("Shutdown signal received"),
		Err(e) => {
			tracing::error!("Failed to listen for shutdown signal: {}", e);
			std::future::pending::<()>().await
		},
	}
}
