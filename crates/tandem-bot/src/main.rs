//! Tandem scalper entry point.

use anyhow::Result;
use clap::Parser;
use tracing::info;

/// Dual-account zero-spread tandem scalper
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via TANDEM_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tandem_telemetry::init_logging()?;

    info!("Starting tandem bot v{}", env!("CARGO_PKG_VERSION"));

    // Config path: CLI arg > TANDEM_CONFIG env var > default
    let config_path = args
        .config
        .or_else(|| std::env::var("TANDEM_CONFIG").ok())
        .unwrap_or_else(|| "config/default.toml".to_string());

    info!(config_path = %config_path, "Loading configuration");
    let config = tandem_bot::AppConfig::load_or_default(&config_path)?;
    info!(
        instrument = %config.instrument.symbol,
        groups = config.groups.len(),
        cycle_cap = config.engine.cycle_cap,
        "Configuration loaded"
    );

    let app = tandem_bot::Application::new(config)?;
    app.run().await?;

    Ok(())
}
